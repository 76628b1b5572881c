//! INVITE-initiated dialog establishment (spec §4.3 "Creation").
//!
//! An `InviteOption` collects everything needed to build an outgoing
//! INVITE and its early/confirmed dialog; the transaction and transport
//! send are driven by the coordinator (see `crate::coordinator`).

use crate::dialog::dialog::DialogInner;
use crate::dialog::state::DialogState;
use crate::error::Error;
use crate::message::{Address, HeaderName, HeadersExt, Method, Request, Response, Uri};
use crate::transaction::TransactionRole;

/// Parameters for an outbound INVITE (spec §4.3).
pub struct InviteOption {
    pub caller: Address,
    pub callee: Address,
    pub contact: Uri,
    pub content_type: Option<String>,
    pub offer: Option<Vec<u8>>,
    pub headers: Vec<(HeaderName, String)>,
}

impl InviteOption {
    pub fn new(caller: Address, callee: Address, contact: Uri) -> Self {
        InviteOption {
            caller,
            callee,
            contact,
            content_type: None,
            offer: None,
            headers: Vec::new(),
        }
    }
}

/// Builds the initial INVITE request and the dialog it establishes
/// (still `Init`/early — confirmed only once a 2xx arrives). `starting_cseq`
/// becomes both the INVITE's own CSeq and the dialog's `establishing_cseq`
/// (spec §4.3 — ACK/CANCEL reuse it); the dialog's own next-allocatable
/// local CSeq starts one past it.
pub fn build_invite(
    opt: &InviteOption,
    local_tag: impl Into<String>,
    call_id: impl Into<String>,
    starting_cseq: u32,
) -> (Request, DialogInner) {
    let local_tag = local_tag.into();
    let call_id = call_id.into();

    let from = opt.caller.clone().with_tag(local_tag.clone());
    let to = opt.callee.clone();
    let callee_uri = to.uri().cloned().unwrap_or_else(|| opt.contact.clone());

    let mut request = Request::new(Method::Invite, callee_uri.clone());
    request.headers_mut().push(HeaderName::From, from.to_string());
    request.headers_mut().push(HeaderName::To, to.to_string());
    request.headers_mut().push(HeaderName::CallId, call_id.clone());
    request
        .headers_mut()
        .push(HeaderName::CSeq, format!("{} INVITE", starting_cseq));
    request.headers_mut().push(HeaderName::MaxForwards, "70");
    request
        .headers_mut()
        .push(HeaderName::Contact, Address::new(opt.contact.clone()).to_string());
    request.headers_mut().push(
        HeaderName::ContentType,
        opt.content_type.clone().unwrap_or_else(|| "application/sdp".to_string()),
    );
    for (name, value) in &opt.headers {
        request.headers_mut().push(name.clone(), value.clone());
    }
    if let Some(offer) = &opt.offer {
        request.set_body(offer.clone());
    }

    let secure = matches!(callee_uri.scheme, crate::message::Scheme::Sips);
    let dialog = DialogInner::new(
        TransactionRole::Client,
        call_id,
        local_tag,
        opt.caller.clone(),
        opt.callee.clone(),
        callee_uri,
        secure,
        starting_cseq,
        starting_cseq + 1,
    );

    (request, dialog)
}

/// UAS side: builds the early dialog from an inbound INVITE, to be
/// confirmed once the application's 2xx is sent.
pub fn dialog_from_invite(request: &Request, local_tag: impl Into<String>) -> Result<DialogInner, Error> {
    let remote_uri = request.from_address()?;
    let local_uri = request.to_address()?;
    let call_id = request.call_id()?.to_string();
    let remote_target = request
        .contact_address()
        .ok()
        .and_then(|c| c.uri().cloned())
        .unwrap_or_else(|| request.uri.clone());
    let secure = matches!(request.uri.scheme, crate::message::Scheme::Sips);
    let establishing_cseq = request.cseq()?.seq;

    let dialog = DialogInner::new(
        TransactionRole::Server,
        call_id,
        local_tag,
        local_uri,
        remote_uri,
        remote_target,
        secure,
        establishing_cseq,
        1,
    );
    dialog.on_dialog_establishing_request(request)?;
    Ok(dialog)
}

/// Builds a BYE for a confirmed dialog and marks it `Terminating` (spec
/// §4.3 "Dialog termination").
pub fn build_bye(dialog: &DialogInner) -> Request {
    dialog.begin_terminating();
    dialog.build_request(Method::Bye, None)
}

/// Applies a response observed on the INVITE transaction to the dialog,
/// per spec §4.3 creation rules (UAC side).
pub fn apply_invite_response(dialog: &DialogInner, response: &Response) -> Result<(), Error> {
    if !response.status_code.is_provisional() && !response.status_code.is_success() {
        // 3xx-6xx: terminate any early dialog created for this INVITE.
        dialog.terminate();
        return Ok(());
    }
    dialog.on_dialog_establishing_response(response)
}

pub fn is_confirmed(dialog: &DialogInner) -> bool {
    dialog.state() == DialogState::Confirmed
}
