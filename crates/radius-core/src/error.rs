use thiserror::Error;

/// Protocol-level errors.
///
/// Wire-level failures are always reported as values; malformed input from
/// the network must never panic.
#[derive(Error, Debug)]
pub enum RadiusError {
    /// Header length mismatch, attribute TLV overrun, or bad declared length.
    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    /// Response or accounting authenticator did not match the expected hash.
    #[error("authenticator invalid: {0}")]
    AuthenticatorInvalid(String),

    /// Dictionary lookup failed during programmatic attribute construction.
    #[error("unknown attribute name: {0}")]
    UnknownAttributeName(String),

    /// Auth mechanism is recognized but its crypto is not implemented.
    #[error("unsupported auth mechanism: {0}")]
    UnsupportedAuth(&'static str),

    /// Value could not be parsed or rendered for the attribute data type.
    #[error("invalid attribute value: {0}")]
    InvalidAttributeValue(String),
}

/// Errors raised while loading a dictionary.
#[derive(Error, Debug)]
pub enum DictionaryError {
    #[error("{resource}:{line}: {reason}")]
    Parse {
        resource: String,
        line: usize,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DictionaryError {
    pub(crate) fn parse(resource: &str, line: usize, reason: impl Into<String>) -> Self {
        DictionaryError::Parse {
            resource: resource.to_string(),
            line,
            reason: reason.into(),
        }
    }
}
