//! The dialog engine (spec §4.3): dialog identity, state, route-set/CSeq
//! discipline, INVITE-initiated establishment, REGISTER helpers, and
//! REFER-created subscriptions.

pub mod dialog;
pub mod id;
pub mod invitation;
pub mod refer;
pub mod registration;
pub mod state;

pub use dialog::DialogInner;
pub use id::{DialogId, DialogKey};
pub use invitation::{apply_invite_response, build_bye, build_invite, dialog_from_invite, is_confirmed, InviteOption};
pub use refer::{ReferSubscription, ReferSubscriptionState};
pub use registration::{Credential, Registration};
pub use state::DialogState;
