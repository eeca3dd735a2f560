use crate::error::GrabResult;
use crate::pixel::Image;
use crate::window::{Region, WindowHandle, WindowInfo};

/// Capability set every grabbing backend offers.
///
/// Each operation yields `Ok(None)` instead of an error when the grabber was
/// opened with `prevent_exceptions`.
pub trait WindowGrabber: Send {
    /// Window whose title best matches `title`; the desktop for `""`
    fn find(&mut self, title: &str) -> GrabResult<Option<WindowHandle>>;

    /// Snapshot of all top-level client windows, in server order
    fn list_windows(&mut self) -> GrabResult<Option<Vec<WindowInfo>>>;

    /// Current `(width, height)` of a window
    fn size(&mut self, handle: WindowHandle) -> GrabResult<Option<(u32, u32)>>;

    fn title(&mut self, handle: WindowHandle) -> GrabResult<Option<String>>;

    /// Capture a window or one of its regions.
    ///
    /// `format` is one of `rgb`, `bgr`, `gray`; `shape` is `array` or `image`.
    /// A `bgr` image result carries BGR bytes in an `ImageRgb8`, so red and
    /// blue appear swapped to anything that treats it as RGB.
    fn capture(
        &mut self,
        handle: WindowHandle,
        region: Option<Region>,
        format: &str,
        shape: &str,
    ) -> GrabResult<Option<Image>>;

    /// Capture using the grabber's configured default format and shape
    fn capture_default(
        &mut self,
        handle: WindowHandle,
        region: Option<Region>,
    ) -> GrabResult<Option<Image>>;

    /// Rate computed at the most recent capture
    fn fps(&self) -> f64;

    /// Release the display connection. Calling it twice is harmless.
    fn stop(&mut self);
}
