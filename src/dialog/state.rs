/// Dialog lifecycle states (spec §3.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    Init,
    Trying,
    Ringing,
    Early,
    Confirmed,
    Terminating,
    Terminated,
}

impl DialogState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DialogState::Terminated)
    }
}
