//! End-to-end scenarios spanning codec, transaction, and dialog layers.

use std::net::SocketAddr;
use std::sync::Arc;

use sipstack::dialog::{build_invite, dialog_from_invite, InviteOption};
use sipstack::message::{Address, HeaderName, HeadersExt, Method, Request, Response, StatusCode, Uri};
use sipstack::transaction::{Observers, Timer, TimerBase, TimerName, TransactionKind};
use sipstack::transport::mock::MockTransport;
use sipstack::transport::{SipAddr, Transport};

fn addr(port: u16) -> SipAddr {
    SipAddr::new(format!("127.0.0.1:{}", port).parse::<SocketAddr>().unwrap(), "UDP")
}

fn invite_with_seed() -> Request {
    let mut req = Request::new(Method::Invite, Uri::parse("sip:bob@biloxi.com").unwrap());
    req.headers_mut().push(
        HeaderName::Via,
        "SIP/2.0/UDP pc33.atlanta.com;branch=z9hG4bK776asdhds",
    );
    req.headers_mut()
        .push(HeaderName::From, "Alice <sip:alice@atlanta.com>;tag=1928301774");
    req.headers_mut().push(HeaderName::To, "Bob <sip:bob@biloxi.com>");
    req.headers_mut()
        .push(HeaderName::CallId, "a84b4c76e66710@pc33.atlanta.com");
    req.headers_mut().push(HeaderName::CSeq, "314159 INVITE");
    req.headers_mut().push(HeaderName::MaxForwards, "70");
    req
}

/// Scenario 1: basic call setup (UAC happy path).
#[tokio::test]
async fn basic_call_setup_confirms_dialog_and_acks() {
    let transport: Arc<dyn Transport> = Arc::new(MockTransport::new(addr(6000), false));
    let timers = Arc::new(Timer::new());
    let request = invite_with_seed();

    let opt = InviteOption::new(
        request.from_address().unwrap(),
        request.to_address().unwrap(),
        Uri::parse("sip:alice@pc33.atlanta.com").unwrap(),
    );
    let (_built_request, dialog) = build_invite(&opt, "1928301774", "a84b4c76e66710@pc33.atlanta.com", 314159);

    let key = sipstack::transaction::TransactionKey::for_client_request(&request, "z9hG4bK776asdhds");
    let txn = sipstack::transaction::Transaction::new(
        key,
        TransactionKind::ClientInvite,
        request,
        transport,
        addr(6001),
        timers,
        TimerBase::default(),
        Observers::default(),
    );
    txn.start_client().await.unwrap();

    let mut trying = Response::new(StatusCode::TRYING);
    trying.headers_mut().push(HeaderName::To, "Bob <sip:bob@biloxi.com>");
    txn.on_response(trying).await.unwrap();

    let mut ringing = Response::new(StatusCode::RINGING);
    ringing
        .headers_mut()
        .push(HeaderName::To, "Bob <sip:bob@biloxi.com>;tag=a6c85cf");
    txn.on_response(ringing.clone()).await.unwrap();
    sipstack::dialog::apply_invite_response(&dialog, &ringing).unwrap();

    let mut ok = Response::new(StatusCode::OK);
    ok.headers_mut()
        .push(HeaderName::To, "Bob <sip:bob@biloxi.com>;tag=a6c85cf");
    ok.headers_mut().push(HeaderName::Contact, "<sip:bob@192.0.2.4>");
    txn.on_response(ok.clone()).await.unwrap();
    sipstack::dialog::apply_invite_response(&dialog, &ok).unwrap();

    assert_eq!(dialog.id().call_id, "a84b4c76e66710@pc33.atlanta.com");
    assert_eq!(dialog.id().local_tag, "1928301774");
    assert_eq!(dialog.id().remote_tag, "a6c85cf");
    assert!(sipstack::dialog::is_confirmed(&dialog));
    assert_eq!(dialog.remote_target().to_string(), "sip:bob@192.0.2.4");

    // The transaction itself never emits an ACK for a 2xx; the
    // application does, via a standalone request (spec §4.2.2). The ACK
    // must reuse the establishing INVITE's CSeq (314159) even without the
    // caller passing it explicitly.
    let ack = dialog.build_request(Method::Ack, None);
    assert_eq!(ack.cseq().unwrap().seq, 314159);
    assert_eq!(ack.cseq().unwrap().method, Method::Ack);
    assert_eq!(ack.uri.to_string(), "sip:bob@192.0.2.4");
}

/// Scenario 3: CANCEL during ringing. The CANCEL is driven as its own NICT
/// through the coordinator (spec §4.2.2), not a bare fire-and-forget send.
#[tokio::test]
async fn cancel_during_ringing_then_487_acked() {
    let transport = Arc::new(MockTransport::new(addr(6002), false));
    let timers = Arc::new(Timer::new());
    let request = invite_with_seed();
    let key = sipstack::transaction::TransactionKey::for_client_request(&request, "z9hG4bK776asdhds");
    let txn = Arc::new(sipstack::transaction::Transaction::new(
        key,
        TransactionKind::ClientInvite,
        request,
        transport.clone(),
        addr(6003),
        timers,
        TimerBase::default(),
        Observers::default(),
    ));
    txn.start_client().await.unwrap();

    let mut ringing = Response::new(StatusCode::RINGING);
    ringing
        .headers_mut()
        .push(HeaderName::To, "Bob <sip:bob@biloxi.com>;tag=a6c85cf");
    txn.on_response(ringing).await.unwrap();

    let coordinator = sipstack::coordinator::Coordinator::new(
        sipstack::coordinator::endpoint::Endpoint::builder().build(),
        transport.clone(),
    );
    let cancel_txn = coordinator.send_cancel(&txn).await.unwrap();
    assert_eq!(cancel_txn.request.method, Method::Cancel);
    assert_eq!(cancel_txn.request.cseq().unwrap().seq, 314159);
    assert_eq!(
        cancel_txn.request.top_via().unwrap().branch(),
        Some("z9hG4bK776asdhds")
    );
    assert_eq!(cancel_txn.request.uri.to_string(), "sip:bob@biloxi.com");
    // Driven as its own NICT: armed and awaiting its own final response,
    // distinct from the INVITE transaction it shares a branch with.
    assert_eq!(
        cancel_txn.state().await,
        sipstack::transaction::TransactionState::Trying
    );
    assert!(coordinator.send_cancel(&txn).await.is_err());

    let mut terminated = Response::new(StatusCode::REQUEST_TERMINATED);
    terminated
        .headers_mut()
        .push(HeaderName::To, "Bob <sip:bob@biloxi.com>;tag=a6c85cf");
    txn.on_response(terminated).await.unwrap();

    let acks = transport
        .sent_messages()
        .into_iter()
        .filter(|(m, _)| m.as_request().map(|r| r.method == Method::Ack).unwrap_or(false))
        .count();
    assert_eq!(acks, 1);
    assert_eq!(txn.state().await, sipstack::transaction::TransactionState::Completed);
}

/// Scenario 4: out-of-order in-dialog CSeq.
#[test]
fn stale_cseq_is_rejected_and_counter_unchanged() {
    let opt = InviteOption::new(
        Address::parse("sip:alice@atlanta.com").unwrap(),
        Address::parse("sip:bob@biloxi.com").unwrap(),
        Uri::parse("sip:alice@pc33.atlanta.com").unwrap(),
    );
    let (_req, dialog) = build_invite(&opt, "1928301774", "call-id-1", 1);
    dialog.accept_remote_cseq(&Method::Invite, 7).unwrap();
    dialog.accept_remote_cseq(&Method::Invite, 9).unwrap();
    assert_eq!(dialog.current_local_cseq(), 2);

    let result = dialog.accept_remote_cseq(&Method::Invite, 8);
    assert!(result.is_err());
}

/// Scenario 5: Record-Route reversal on the UAS.
#[test]
fn uas_reverses_record_route_order() {
    let mut invite = invite_with_seed();
    invite
        .headers_mut()
        .push(HeaderName::RecordRoute, "<sip:p1.example.com;lr>");
    invite
        .headers_mut()
        .push(HeaderName::RecordRoute, "<sip:p2.example.com;lr>");
    invite
        .headers_mut()
        .push(HeaderName::RecordRoute, "<sip:p3.example.com;lr>");
    invite.headers_mut().push(HeaderName::Contact, "<sip:alice@pc33.atlanta.com>");

    let dialog = dialog_from_invite(&invite, "a6c85cf").unwrap();
    let route_set = dialog.route_set();
    let hosts: Vec<String> = route_set
        .iter()
        .map(|a| a.uri().unwrap().host.to_string())
        .collect();
    assert_eq!(hosts, vec!["p3.example.com", "p2.example.com", "p1.example.com"]);
}

/// Scenario 6: REFER-initiated transfer.
#[test]
fn refer_subscription_tracks_sipfrag_progress() {
    use sipstack::dialog::refer::ReferSubscription;

    let mut accepted = Response::new(StatusCode::ACCEPTED);
    accepted.headers_mut().push(HeaderName::Event, "refer");
    let subscription = ReferSubscription::new(&accepted).unwrap();
    assert!(subscription.is_active());

    let mut notify_trying = Request::new(Method::Notify, Uri::parse("sip:alice@atlanta.com").unwrap());
    notify_trying
        .headers_mut()
        .push(HeaderName::SubscriptionState, "active;expires=60");
    notify_trying.set_body(b"SIP/2.0 100 Trying".to_vec());
    subscription.on_notify(&notify_trying);
    assert!(subscription.is_active());

    let mut notify_done = Request::new(Method::Notify, Uri::parse("sip:alice@atlanta.com").unwrap());
    notify_done
        .headers_mut()
        .push(HeaderName::SubscriptionState, "terminated;reason=noresource");
    notify_done.set_body(b"SIP/2.0 200 OK".to_vec());
    subscription.on_notify(&notify_done);
    assert_eq!(
        subscription.state(),
        sipstack::dialog::ReferSubscriptionState::Terminated
    );
}

/// Scenario 2 (abbreviated): a NICT on an unreliable transport times out
/// via Timer F with exactly one terminal transition, driven by hand
/// rather than real wall-clock waits.
#[tokio::test]
async fn nict_times_out_on_timer_f() {
    let transport: Arc<dyn Transport> = Arc::new(MockTransport::new(addr(6004), false));
    let timers = Arc::new(Timer::new());
    let mut req = Request::new(Method::Options, Uri::parse("sip:bob@biloxi.com").unwrap());
    req.headers_mut()
        .push(HeaderName::Via, "SIP/2.0/UDP pc33.atlanta.com;branch=z9hG4bKoptions1");
    req.headers_mut().push(HeaderName::From, "Alice <sip:alice@atlanta.com>;tag=1");
    req.headers_mut().push(HeaderName::To, "Bob <sip:bob@biloxi.com>");
    req.headers_mut().push(HeaderName::CallId, "options-call@atlanta.com");
    req.headers_mut().push(HeaderName::CSeq, "1 OPTIONS");
    req.headers_mut().push(HeaderName::MaxForwards, "70");

    let key = sipstack::transaction::TransactionKey::for_client_request(&req, "z9hG4bKoptions1");
    let txn = sipstack::transaction::Transaction::new(
        key,
        TransactionKind::ClientNonInvite,
        req,
        transport,
        addr(6005),
        timers,
        TimerBase::default(),
        Observers::default(),
    );
    txn.start_client().await.unwrap();
    txn.on_timer(TimerName::F).await.unwrap();
    assert_eq!(txn.state().await, sipstack::transaction::TransactionState::Terminated);
}
