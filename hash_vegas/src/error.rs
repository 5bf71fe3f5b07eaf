use std::{io, time::Duration};

use crate::{family::Family, runner::RunReport};

/// Local failures of the padding / state / extension engine
#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    #[error("processed length {0} does not fit the padding length suffix")]
    InvalidLength(u64),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("{family} digest has {actual} bytes, state import needs {required}")]
    TruncatedDigest {
        family: Family,
        actual: usize,
        required: usize,
    },

    /// The padding calculator and the primitive disagree, any forged digest would be wrong
    #[error("padding for {family} at length {length} disagrees with the primitive")]
    PaddingMismatch { family: Family, length: u64 },
}

impl ForgeError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::PaddingMismatch { .. })
    }
}

/// Errors while decoding or transporting frames
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Not enough buffered bytes yet, more have to be read
    #[error("incomplete frame")]
    Incomplete,

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("unknown message type {0:#04x}")]
    UnknownMessage(u8),

    #[error("unknown hash family tag {0}")]
    UnknownFamily(u8),

    #[error("field of {0} bytes exceeds the frame limit")]
    Oversized(usize),

    #[error("field is not valid utf8")]
    Utf8,

    #[error("connection closed with a partial frame buffered")]
    ConnectionReset,
}

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("failed to connect: {0}")]
    Connect(#[source] io::Error),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("round trip timed out after {0:?}")]
    Timeout(Duration),

    #[error("oracle closed the connection")]
    Closed,

    #[error("unexpected response: {0}")]
    Protocol(String),

    #[error("oracle reported an error: {0}")]
    Remote(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Forge(#[from] ForgeError),

    #[error("no extendable voucher after {issued} issuances")]
    NoExploitableVoucher { issued: usize },

    #[error("all {attempts} secret length guesses were rejected")]
    ForgeryExhausted { attempts: usize },

    #[error("session cancelled")]
    Cancelled,
}

impl SessionError {
    /// Recoverable failures are retried by opening a fresh session
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Forge(err) => !err.is_fatal(),
            _ => true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("secret length range {min}..={max} is empty")]
    EmptyGuessRange { min: usize, max: usize },

    #[error("{0} must be at least 1")]
    Zero(&'static str),

    #[error("no target algorithms configured")]
    NoTargets,

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("unrecoverable forgery failure: {0}")]
    Fatal(SessionError),

    #[error("no voucher redeemed\n{0}")]
    Exhausted(Box<RunReport>),
}

#[test]
fn test_only_padding_mismatch_is_fatal() {
    let mismatch = ForgeError::PaddingMismatch {
        family: Family::Sha256,
        length: 64,
    };
    assert!(mismatch.is_fatal());
    for err in [
        ForgeError::InvalidLength(u64::MAX),
        ForgeError::UnsupportedAlgorithm("sha3-256".into()),
        ForgeError::TruncatedDigest {
            family: Family::Sha224,
            actual: 28,
            required: 32,
        },
    ] {
        assert!(!err.is_fatal(), "{err}");
    }
}

#[test]
fn test_session_errors_are_recoverable_unless_forge_is_fatal() {
    let recoverable = [
        SessionError::Oracle(OracleError::Timeout(Duration::from_millis(5))),
        SessionError::Oracle(OracleError::Closed),
        SessionError::Oracle(OracleError::Frame(FrameError::ConnectionReset)),
        SessionError::Oracle(OracleError::Remote("busy".into())),
        SessionError::Forge(ForgeError::InvalidLength(1 << 61)),
        SessionError::Forge(ForgeError::TruncatedDigest {
            family: Family::Sha1,
            actual: 16,
            required: 20,
        }),
        SessionError::NoExploitableVoucher { issued: 16 },
        SessionError::ForgeryExhausted { attempts: 65 },
        SessionError::Cancelled,
    ];
    for err in recoverable {
        assert!(err.is_recoverable(), "{err}");
    }

    let fatal = SessionError::from(ForgeError::PaddingMismatch {
        family: Family::Md4,
        length: 11,
    });
    assert!(!fatal.is_recoverable());
}
