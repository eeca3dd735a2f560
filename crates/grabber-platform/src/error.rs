use thiserror::Error;

use crate::protocol::ErrorRecord;
use crate::window::WindowHandle;

#[derive(Debug, Clone, Error)]
pub enum GrabError {
    /// The link to the display server could not be established or was lost
    #[error("display connection error: {0}")]
    Connection(String),

    /// The server rejected a request; the grabber stays usable
    #[error("protocol error in {call}: {record}")]
    Protocol {
        call: &'static str,
        record: ErrorRecord,
    },

    #[error("no window matching '{0}'")]
    NotFound(String),

    #[error("window {0} no longer exists")]
    Lookup(WindowHandle),

    #[error("capture failed: {0}")]
    Capture(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GrabErrorClass {
    /// The instance cannot be used anymore
    Fatal,
    Recoverable,
    /// Bad input from the caller, nothing was sent to the server
    CallerBug,
}

impl GrabError {
    pub fn class(&self) -> GrabErrorClass {
        match self {
            Self::Connection(_) => GrabErrorClass::Fatal,
            Self::Protocol { .. } | Self::NotFound(_) | Self::Lookup(_) | Self::Capture(_) => {
                GrabErrorClass::Recoverable
            }
            Self::InvalidArgument(_) => GrabErrorClass::CallerBug,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self.class(), GrabErrorClass::Recoverable)
    }

    /// Server-side error details, when the server reported one
    pub fn record(&self) -> Option<&ErrorRecord> {
        match self {
            Self::Protocol { record, .. } => Some(record),
            _ => None,
        }
    }
}

pub type GrabResult<T> = Result<T, GrabError>;
