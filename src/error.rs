use std::io;
use std::net::SocketAddr;

use nom::error::ErrorKind;
use thiserror::Error;

/// Errors raised while decoding DNS messages or resolving a query.
#[derive(Debug, Error)]
pub enum DnsError {
    #[error("message truncated at offset {offset}")]
    Truncated { offset: usize },

    #[error("invalid compression pointer at offset {offset}")]
    BadPointer { offset: usize },

    #[error("reserved label type at offset {offset}")]
    BadLabel { offset: usize },

    #[error("domain name longer than 255 bytes at offset {offset}")]
    NameTooLong { offset: usize },

    #[error("label `{0}` is longer than 63 bytes")]
    LabelTooLong(String),

    #[error("name `{0}` is longer than 255 bytes")]
    NameLengthExceeded(String),

    #[error("empty label in `{0}`")]
    EmptyLabel(String),

    #[error("message carries no question")]
    NoQuestion,

    #[error("upstream {addr} unreachable")]
    Upstream {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

impl DnsError {
    /// Maps a nom failure on `msg` to the offset where parsing stopped.
    pub fn from_nom(msg: &[u8], err: nom::Err<nom::error::Error<&[u8]>>) -> Self {
        match err {
            nom::Err::Incomplete(_) => DnsError::Truncated { offset: msg.len() },
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                let offset = msg.len().saturating_sub(e.input.len());
                match e.code {
                    ErrorKind::Verify => DnsError::BadPointer { offset },
                    ErrorKind::LengthValue => DnsError::BadLabel { offset },
                    ErrorKind::TooLarge => DnsError::NameTooLong { offset },
                    _ => DnsError::Truncated { offset },
                }
            }
        }
    }

    /// True for failures caused by the bytes of a message rather than the network.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, DnsError::Upstream { .. })
    }
}
