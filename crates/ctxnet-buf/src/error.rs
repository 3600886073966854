/// Errors that can occur while encoding to or decoding from a [`NetBuf`](crate::NetBuf).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufError {
    /// A read needed more bytes than the buffer holds.
    #[error("unexpected end of buffer (needed {needed} bytes, {remaining} remaining)")]
    UnexpectedEof { needed: usize, remaining: usize },

    /// A varint kept setting its continuation bit past the maximum width.
    #[error("varint longer than {max_bytes} bytes")]
    VarIntTooLong { max_bytes: usize },

    /// A varint decoded to a magnitude that does not fit the target width.
    #[error("varint magnitude overflows target width")]
    VarIntOverflow,

    /// A fixed-bit read or write was asked for a length outside `1..=32`.
    #[error("invalid bit length {0} (expected 1..=32)")]
    InvalidBitLength(u32),

    /// An enum with no variants was written or read.
    #[error("enum {type_name} has no variants")]
    EmptyEnum { type_name: &'static str },

    /// A decoded enum ordinal has no matching variant.
    #[error("ordinal {ordinal} out of range for {type_name} ({variants} variants)")]
    InvalidOrdinal {
        type_name: &'static str,
        ordinal: u32,
        variants: u32,
    },

    /// A string payload was not valid UTF-8.
    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    /// A string exceeded the configured maximum length.
    #[error("string too long ({len} bytes, max {max})")]
    StringTooLong { len: usize, max: usize },

    /// A byte array is too long for its var-uint length prefix.
    #[error("byte array too long ({len} bytes)")]
    ArrayTooLong { len: usize },

    /// An identifier failed validation.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A palette lookup used a key that was never assigned.
    #[error("palette key {0} was never assigned")]
    UnknownPaletteKey(i32),

    /// A payload codec rejected otherwise well-formed bytes.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl BufError {
    /// Construct an [`BufError::InvalidData`] from any message.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData(message.into())
    }

    /// True for errors caused by API misuse rather than malformed input.
    pub fn is_argument_error(&self) -> bool {
        matches!(self, Self::InvalidBitLength(_) | Self::EmptyEnum { .. } | Self::ArrayTooLong { .. })
    }
}

pub type Result<T> = std::result::Result<T, BufError>;
