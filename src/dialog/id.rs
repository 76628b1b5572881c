use std::fmt;

/// `(Call-ID, local-tag, remote-tag)` (spec §3.5). An early dialog has an
/// empty `remote_tag` until the first tagged response/request arrives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DialogKey {
    pub call_id: String,
    pub local_tag: String,
    pub remote_tag: String,
}

impl DialogKey {
    pub fn new(call_id: impl Into<String>, local_tag: impl Into<String>, remote_tag: impl Into<String>) -> Self {
        DialogKey {
            call_id: call_id.into(),
            local_tag: local_tag.into(),
            remote_tag: remote_tag.into(),
        }
    }

    /// The early-dialog form of this key, before a remote tag is known.
    pub fn early(call_id: impl Into<String>, local_tag: impl Into<String>) -> Self {
        DialogKey::new(call_id, local_tag, "")
    }

    pub fn is_early(&self) -> bool {
        self.remote_tag.is_empty()
    }

    /// The confirmed key once a remote tag becomes known.
    pub fn with_remote_tag(&self, remote_tag: impl Into<String>) -> Self {
        DialogKey::new(self.call_id.clone(), self.local_tag.clone(), remote_tag)
    }
}

impl fmt::Display for DialogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.call_id, self.local_tag, self.remote_tag)
    }
}

pub type DialogId = DialogKey;
