//! Error types for the RTP media core.

use std::fmt;

/// Errors that can occur while building, parsing or packetizing media.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Wire**: [`Parse`](Self::Parse): malformed inbound RTP.
/// - **Buffer**: [`OutOfBounds`](Self::OutOfBounds): checked offset access
///   outside the written region of a [`ByteBuffer`](crate::buffer::ByteBuffer).
/// - **Packet build**: [`InvalidExtension`](Self::InvalidExtension),
///   [`ExtensionSpace`](Self::ExtensionSpace),
///   [`HeaderLocked`](Self::HeaderLocked),
///   [`PacketTooLarge`](Self::PacketTooLarge).
/// - **Packetizer**: [`Packetization`](Self::Packetization).
/// - **Audio**: [`Codec`](Self::Codec).
/// - **Registry**: [`SsrcExhausted`](Self::SsrcExhausted).
/// - **Transport**: [`Io`](Self::Io).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse an RTP packet (RFC 3550 §5.1).
    #[error("RTP parse error: {kind}")]
    Parse { kind: ParseErrorKind },

    /// A read or write touched bytes outside the buffer.
    #[error("access of {len} bytes at offset {offset} exceeds buffer size {size}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },

    /// Extension id/length pair that no header format (RFC 8285) can carry.
    #[error("invalid header extension id={id} length={length}")]
    InvalidExtension { id: u8, length: usize },

    /// The extension block would not fit in the packet capacity.
    #[error("no room for header extension")]
    ExtensionSpace,

    /// CSRCs or extensions were modified after later sections were written.
    #[error("RTP header can no longer be modified")]
    HeaderLocked,

    /// The 4-bit CC field holds at most 15 contributing sources.
    #[error("too many CSRCs: {0}")]
    TooManyCsrcs(usize),

    /// Payload would grow the packet past its capacity.
    #[error("packet of {size} bytes exceeds capacity {capacity}")]
    PacketTooLarge { size: usize, capacity: usize },

    /// An access unit could not be split within the configured size limits.
    #[error("packetization failed: {0}")]
    Packetization(String),

    /// An audio encoder or decoder rejected its input.
    #[error("audio codec error: {0}")]
    Codec(String),

    /// Every attempt to draw an unused SSRC collided.
    #[error("could not allocate a unique SSRC")]
    SsrcExhausted,
}

impl Error {
    pub(crate) fn parse(kind: ParseErrorKind) -> Self {
        Self::Parse { kind }
    }
}

/// Specific kind of RTP parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Fewer than 12 bytes.
    TooShort,
    /// Version field is not 2.
    BadVersion,
    /// CSRC list runs past the end of the buffer.
    CsrcOverrun,
    /// Extension block header or body runs past the end of the buffer.
    ExtensionOverrun,
    /// Padding bit set but the trailing padding-length byte is zero.
    ZeroPadding,
    /// Header plus padding is longer than the packet.
    PaddingOverrun,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort => write!(f, "packet shorter than fixed header"),
            Self::BadVersion => write!(f, "unsupported RTP version"),
            Self::CsrcOverrun => write!(f, "CSRC list overruns packet"),
            Self::ExtensionOverrun => write!(f, "header extension overruns packet"),
            Self::ZeroPadding => write!(f, "zero padding length"),
            Self::PaddingOverrun => write!(f, "padding overruns payload"),
        }
    }
}

/// Convenience alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
