//! Native protocol binding surface.
//!
//! A backend exposes the fixed set of display-server operations below. Server
//! errors are never returned from these calls: the backend hands them to the
//! installed [`ErrorHook`] and returns a sentinel (`WindowHandle::NONE`,
//! `None`, an empty list). Only a broken link to the server is reported
//! in-band as a [`LinkError`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pixel::PixelFormat;
use crate::window::{Region, WindowHandle};

// Core protocol error codes that mean the target resource went away or no
// longer matches the request.
pub const BAD_WINDOW: u8 = 3;
pub const BAD_MATCH: u8 = 8;
pub const BAD_DRAWABLE: u8 = 9;

/// Details of one server-reported error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Response type of the error packet (always 0 for core errors)
    pub kind: u8,
    /// Sequence number of the failed request
    pub serial: u64,
    pub error_code: u8,
    /// Major opcode of the failed request
    pub request_code: u8,
    pub minor_code: u16,
    /// Offending resource id or value, if any
    pub resource_id: u32,
}

impl ErrorRecord {
    /// True when the error says the window/drawable is gone or unusable
    pub fn is_stale_window(&self) -> bool {
        matches!(self.error_code, BAD_WINDOW | BAD_DRAWABLE | BAD_MATCH)
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type={} serial={} error_code={} request_code={} minor_code={} resource=0x{:x}",
            self.kind, self.serial, self.error_code, self.request_code, self.minor_code, self.resource_id
        )
    }
}

/// Process-wide error callback. The return value is handed back to the
/// protocol library and must not request termination (always `0`).
pub type ErrorHook = fn(&ErrorRecord) -> i32;

/// The connection to the display server is unusable
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct LinkError(pub String);

/// Pixel buffer produced by a capture call.
///
/// Ownership belongs to the backend until it is handed back through
/// [`Protocol::release_image`]; the type is deliberately not `Clone`.
#[derive(Debug)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    /// Bytes per row, including padding
    pub stride: usize,
    pub bits_per_pixel: u8,
    /// Rows of packed [`PixelFormat::Bgra`] pixels
    pub data: Vec<u8>,
}

impl RawImage {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            stride: width as usize * PixelFormat::Bgra.channels(),
            bits_per_pixel: 32,
            data,
        }
    }

    /// A valid 0x0 capture (e.g. a region clipped away entirely)
    pub fn empty() -> Self {
        Self::new(0, 0, Vec::new())
    }
}

/// One `_NET_CLIENT_LIST` entry with its undecoded title bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientWindow {
    pub handle: WindowHandle,
    pub name: Option<Vec<u8>>,
}

pub trait Protocol: Send {
    type Connection: Send;

    /// Route all subsequent server errors to `hook` instead of terminating.
    /// Must be called before any other operation.
    fn install_error_hook(&self, hook: ErrorHook);

    /// Connect to `display`, or to the environment's default display
    fn open_connection(&self, display: Option<&str>) -> Result<Self::Connection, LinkError>;

    fn close_connection(&self, conn: Self::Connection);

    /// Best title match scoring strictly above `threshold`, or `WindowHandle::NONE`
    fn resolve_window_by_title(
        &self,
        conn: &Self::Connection,
        title: &str,
        threshold: f32,
    ) -> Result<WindowHandle, LinkError>;

    fn resolve_desktop(&self, conn: &Self::Connection) -> Result<WindowHandle, LinkError>;

    /// Raw title bytes, `None` when the window has no title or the lookup failed
    fn get_window_title(
        &self,
        conn: &Self::Connection,
        handle: WindowHandle,
    ) -> Result<Option<Vec<u8>>, LinkError>;

    /// Whole-window capture, `None` when the server produced no image
    fn capture_window(
        &self,
        conn: &Self::Connection,
        handle: WindowHandle,
    ) -> Result<Option<RawImage>, LinkError>;

    /// Sub-region capture, clipped to the window bounds
    fn capture_region(
        &self,
        conn: &Self::Connection,
        handle: WindowHandle,
        region: Region,
    ) -> Result<Option<RawImage>, LinkError>;

    fn release_image(&self, image: RawImage);

    /// `(width, height)`, `None` when the lookup failed
    fn get_window_geometry(
        &self,
        conn: &Self::Connection,
        handle: WindowHandle,
    ) -> Result<Option<(u32, u32)>, LinkError>;

    fn list_client_windows(&self, conn: &Self::Connection) -> Result<Vec<ClientWindow>, LinkError>;
}
