pub mod capture;
pub mod config;
pub mod connection;
pub mod convert;
pub mod error_channel;
pub mod grabber;
pub mod rate;
pub mod resolver;

#[cfg(test)]
pub(crate) mod fake;

pub use grabber::{open, open_with_config, Grabber};
pub use grabber_platform::error::{GrabError, GrabErrorClass, GrabResult};
pub use grabber_platform::grabber::WindowGrabber;
pub use grabber_platform::pixel::{ColorFormat, Image, PixelArray, PixelFormat, ResultShape};
pub use grabber_platform::window::{Region, WindowHandle, WindowInfo};
