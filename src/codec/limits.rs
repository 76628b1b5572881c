/// Parser limits (spec §4.1). All three are enforced while scanning,
/// not after the fact, so a hostile peer can't force an unbounded buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_message_size: usize,
    pub max_header_size: usize,
    pub max_header_count: usize,
}

impl Limits {
    pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;
    pub const DEFAULT_MAX_HEADER_SIZE: usize = 8 * 1024;
    pub const DEFAULT_MAX_HEADER_COUNT: usize = 128;
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_message_size: Self::DEFAULT_MAX_MESSAGE_SIZE,
            max_header_size: Self::DEFAULT_MAX_HEADER_SIZE,
            max_header_count: Self::DEFAULT_MAX_HEADER_COUNT,
        }
    }
}

/// Whether the parser enforces the mandatory-header checks of spec §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Strict,
    Lenient,
}

/// Whether the underlying transport is a byte stream (no datagram framing)
/// or a message-per-datagram transport, which changes how a missing
/// Content-Length is handled (spec §4.1 "Body handling").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingKind {
    Datagram,
    Stream,
}
