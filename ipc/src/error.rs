use codec::CodecError;
use thiserror::Error;

/// Errors decoding a message from the wire
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("Not a request or response")]
    UnknownKind,

    #[error("Missing <{0}> section")]
    MissingSection(&'static str),

    #[error("Malformed <{section}> section: {source}")]
    Malformed {
        section: &'static str,
        #[source]
        source: CodecError,
    },
}
