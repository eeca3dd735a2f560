//! Caller-facing grabber and backend selection.

use grabber_platform::error::GrabResult;
use grabber_platform::grabber::WindowGrabber;
use grabber_platform::pixel::{ColorFormat, Image, ResultShape};
use grabber_platform::protocol::Protocol;
use grabber_platform::window::{Region, WindowHandle, WindowInfo};
use tracing::{info, warn};

use crate::capture;
use crate::config::GrabberConfig;
use crate::connection::ConnectionManager;
use crate::rate::{Clock, RateTracker, SystemClock};
use crate::resolver::WindowResolver;

/// Window grabber over one display connection.
///
/// All operations are blocking round-trips to the server. The connection is
/// released by [`Grabber::stop`] or when the grabber is dropped.
pub struct Grabber<P: Protocol> {
    connection: ConnectionManager<P>,
    resolver: WindowResolver,
    rate: RateTracker,
    clock: Box<dyn Clock>,
    prevent_exceptions: bool,
    default_format: ColorFormat,
    default_shape: ResultShape,
}

impl<P: Protocol> Grabber<P> {
    pub fn with_protocol(protocol: P, config: &GrabberConfig) -> GrabResult<Self> {
        let connection = ConnectionManager::open(protocol, config.display.as_deref())?;
        Ok(Self {
            connection,
            resolver: WindowResolver::new(config.match_threshold),
            rate: RateTracker::new(),
            clock: Box::new(SystemClock),
            prevent_exceptions: config.prevent_exceptions,
            default_format: config.default_format,
            default_shape: config.default_shape,
        })
    }

    /// Replace the timestamp source used for fps
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn prevent_exceptions(&self) -> bool {
        self.prevent_exceptions
    }

    pub fn is_stopped(&self) -> bool {
        !self.connection.is_open()
    }

    /// Error policy shared by every public operation
    fn settle<T>(&self, op: &str, result: GrabResult<T>) -> GrabResult<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if self.prevent_exceptions => {
                warn!("{} failed: {}", op, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn find(&mut self, title: &str) -> GrabResult<Option<WindowHandle>> {
        let result = self.resolver.find_by_title(&self.connection, title);
        self.settle("find", result)
    }

    pub fn list_windows(&mut self) -> GrabResult<Option<Vec<WindowInfo>>> {
        let result = self.resolver.list_windows(&self.connection);
        self.settle("list_windows", result)
    }

    pub fn size(&mut self, handle: WindowHandle) -> GrabResult<Option<(u32, u32)>> {
        let result = self.resolver.size(&self.connection, handle);
        self.settle("size", result)
    }

    pub fn title(&mut self, handle: WindowHandle) -> GrabResult<Option<String>> {
        let result = self.resolver.title(&self.connection, handle);
        self.settle("title", result)
    }

    /// Capture with string arguments (`rgb`/`bgr`/`gray`, `array`/`image`).
    /// Unknown values fail before anything is sent to the server.
    ///
    /// A `bgr` capture in `image` shape is an `ImageRgb8` holding BGR bytes;
    /// anything that reads it as RGB (such as `save`) swaps red and blue.
    pub fn capture(
        &mut self,
        handle: WindowHandle,
        region: Option<Region>,
        format: &str,
        shape: &str,
    ) -> GrabResult<Option<Image>> {
        let result = parse_capture_args(format, shape)
            .and_then(|(format, shape)| self.capture_inner(handle, region, format, shape));
        self.settle("capture", result)
    }

    pub fn capture_as(
        &mut self,
        handle: WindowHandle,
        region: Option<Region>,
        format: ColorFormat,
        shape: ResultShape,
    ) -> GrabResult<Option<Image>> {
        let result = self.capture_inner(handle, region, format, shape);
        self.settle("capture", result)
    }

    /// Capture in the configured default format and shape
    pub fn capture_default(
        &mut self,
        handle: WindowHandle,
        region: Option<Region>,
    ) -> GrabResult<Option<Image>> {
        let result = self.capture_inner(handle, region, self.default_format, self.default_shape);
        self.settle("capture", result)
    }

    fn capture_inner(
        &mut self,
        handle: WindowHandle,
        region: Option<Region>,
        format: ColorFormat,
        shape: ResultShape,
    ) -> GrabResult<Image> {
        self.rate.tick(self.clock.as_ref());
        capture::capture(&self.connection, handle, region, format, shape)
    }

    /// Rate computed at the most recent capture
    pub fn fps(&self) -> f64 {
        self.rate.fps()
    }

    pub fn stop(&mut self) {
        self.connection.close();
    }
}

fn parse_capture_args(format: &str, shape: &str) -> GrabResult<(ColorFormat, ResultShape)> {
    Ok((format.parse()?, shape.parse()?))
}

impl<P: Protocol> WindowGrabber for Grabber<P> {
    fn find(&mut self, title: &str) -> GrabResult<Option<WindowHandle>> {
        Grabber::find(self, title)
    }

    fn list_windows(&mut self) -> GrabResult<Option<Vec<WindowInfo>>> {
        Grabber::list_windows(self)
    }

    fn size(&mut self, handle: WindowHandle) -> GrabResult<Option<(u32, u32)>> {
        Grabber::size(self, handle)
    }

    fn title(&mut self, handle: WindowHandle) -> GrabResult<Option<String>> {
        Grabber::title(self, handle)
    }

    fn capture(
        &mut self,
        handle: WindowHandle,
        region: Option<Region>,
        format: &str,
        shape: &str,
    ) -> GrabResult<Option<Image>> {
        Grabber::capture(self, handle, region, format, shape)
    }

    fn capture_default(
        &mut self,
        handle: WindowHandle,
        region: Option<Region>,
    ) -> GrabResult<Option<Image>> {
        Grabber::capture_default(self, handle, region)
    }

    fn fps(&self) -> f64 {
        Grabber::fps(self)
    }

    fn stop(&mut self) {
        Grabber::stop(self)
    }
}

/// Open a grabber for the current platform with default settings.
pub fn open(prevent_exceptions: bool) -> GrabResult<Box<dyn WindowGrabber>> {
    let config = GrabberConfig {
        prevent_exceptions,
        ..GrabberConfig::default()
    };
    open_with_config(&config)
}

#[cfg(target_os = "linux")]
pub fn open_with_config(config: &GrabberConfig) -> GrabResult<Box<dyn WindowGrabber>> {
    info!("using X11 window grabber");
    Ok(Box::new(open_x11(config)?))
}

#[cfg(not(target_os = "linux"))]
pub fn open_with_config(_config: &GrabberConfig) -> GrabResult<Box<dyn WindowGrabber>> {
    Err(grabber_platform::error::GrabError::Connection(format!(
        "unsupported platform: {}",
        std::env::consts::OS
    )))
}

/// Typed X11 grabber, for callers that want [`Grabber::capture_as`]
#[cfg(target_os = "linux")]
pub fn open_x11(config: &GrabberConfig) -> GrabResult<Grabber<grabber_linux::x11::X11Protocol>> {
    Grabber::with_protocol(grabber_linux::x11::X11Protocol::new(), config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeProtocol, DESKTOP};
    use grabber_platform::error::GrabError;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    const TERMINAL: WindowHandle = WindowHandle::from_raw(0x0400_0001);

    /// Hands out scripted timestamps
    struct ScriptedClock(Mutex<VecDeque<f64>>);

    impl ScriptedClock {
        fn new(times: &[f64]) -> Self {
            Self(Mutex::new(times.iter().copied().collect()))
        }
    }

    impl Clock for ScriptedClock {
        fn now(&self) -> f64 {
            self.0.lock().pop_front().unwrap_or(0.0)
        }
    }

    fn grabber(prevent_exceptions: bool) -> Grabber<FakeProtocol> {
        let config = GrabberConfig {
            prevent_exceptions,
            ..GrabberConfig::default()
        };
        Grabber::with_protocol(FakeProtocol::new(), &config).unwrap()
    }

    #[test]
    fn test_find_empty_title_is_desktop() {
        assert_eq!(grabber(true).find("").unwrap(), Some(DESKTOP));
    }

    #[test]
    fn test_find_missing_in_lenient_mode_is_none() {
        assert_eq!(grabber(true).find("no such window").unwrap(), None);
    }

    #[test]
    fn test_find_missing_in_strict_mode_is_error() {
        let err = grabber(false).find("no such window").unwrap_err();
        assert!(matches!(err, GrabError::NotFound(_)));
    }

    #[test]
    fn test_policy_applies_to_every_operation() {
        let gone = WindowHandle::from_raw(0xdead);

        let mut lenient = grabber(true);
        assert_eq!(lenient.size(gone).unwrap(), None);
        assert_eq!(lenient.title(gone).unwrap(), None);
        assert!(lenient.capture(gone, None, "rgb", "array").unwrap().is_none());
        assert!(lenient.capture(TERMINAL, None, "hsv", "array").unwrap().is_none());

        let mut strict = grabber(false);
        assert!(matches!(strict.size(gone), Err(GrabError::Lookup(_))));
        assert!(matches!(strict.title(gone), Err(GrabError::Lookup(_))));
        assert!(matches!(
            strict.capture(gone, None, "rgb", "array"),
            Err(GrabError::Capture(_))
        ));
    }

    #[test]
    fn test_unknown_format_never_reaches_protocol() {
        let fake = FakeProtocol::new();
        let state = fake.state();
        let config = GrabberConfig {
            prevent_exceptions: false,
            ..GrabberConfig::default()
        };
        let mut grabber = Grabber::with_protocol(fake, &config).unwrap();
        state.lock().calls.clear();

        let err = grabber.capture(TERMINAL, None, "cmyk", "array").unwrap_err();
        assert!(matches!(err, GrabError::InvalidArgument(_)));
        let err = grabber.capture(TERMINAL, None, "rgb", "tensor").unwrap_err();
        assert!(matches!(err, GrabError::InvalidArgument(_)));

        assert!(state.lock().calls.is_empty());
        assert_eq!(grabber.fps(), 0.0);
    }

    #[test]
    fn test_capture_dimensions() {
        let mut grabber = grabber(false);
        let image = grabber.capture(TERMINAL, None, "gray", "array").unwrap().unwrap();
        assert_eq!(image.as_array().unwrap().shape(), (6, 8, 1));

        let image = grabber
            .capture_as(TERMINAL, Some(Region::new(1, 1, 2, 3)), ColorFormat::Bgr, ResultShape::Image)
            .unwrap()
            .unwrap();
        assert_eq!((image.height(), image.width(), image.channels()), (3, 2, 3));
    }

    #[test]
    fn test_capture_default_follows_config() {
        let mut grabber = grabber(false);
        let image = grabber.capture_default(TERMINAL, None).unwrap().unwrap();
        assert_eq!(image.channels(), 3);
        assert!(image.as_array().is_some());

        let config = GrabberConfig {
            prevent_exceptions: false,
            default_format: ColorFormat::Gray,
            default_shape: ResultShape::Image,
            ..GrabberConfig::default()
        };
        let mut grabber = Grabber::with_protocol(FakeProtocol::new(), &config).unwrap();
        let image = grabber.capture_default(TERMINAL, None).unwrap().unwrap();
        assert_eq!(image.channels(), 1);
        assert!(image.as_image().is_some());
        assert_eq!((image.width(), image.height()), (8, 6));
    }

    #[test]
    fn test_fps_from_capture_timestamps() {
        let mut grabber = grabber(false).with_clock(ScriptedClock::new(&[0.0, 0.5, 0.5]));

        grabber.capture(TERMINAL, None, "rgb", "array").unwrap();
        grabber.capture(TERMINAL, None, "rgb", "array").unwrap();
        assert!((grabber.fps() - 2.0).abs() < 1e-9);

        grabber.capture(TERMINAL, None, "rgb", "array").unwrap();
        assert!(grabber.fps().is_infinite());
    }

    #[test]
    fn test_protocol_error_does_not_leak_between_calls() {
        let fake = FakeProtocol::new();
        let state = fake.state();
        let config = GrabberConfig {
            prevent_exceptions: false,
            ..GrabberConfig::default()
        };
        let mut grabber = Grabber::with_protocol(fake, &config).unwrap();

        // BadAtom, not window related
        let mut record = crate::fake::stale(5, TERMINAL);
        record.serial = 77;
        state.lock().scheduled.push_back(("list_client_windows", record));

        match grabber.list_windows() {
            Err(GrabError::Protocol { call, record }) => {
                assert_eq!(call, "list_client_windows");
                assert_eq!(record.serial, 77);
            }
            other => panic!("expected protocol error, got {other:?}"),
        }
        assert_eq!(grabber.list_windows().unwrap().unwrap().len(), 2);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let fake = FakeProtocol::new();
        let state = fake.state();
        let mut grabber = Grabber::with_protocol(fake, &GrabberConfig::default()).unwrap();

        grabber.stop();
        grabber.stop();
        assert!(grabber.is_stopped());
        assert_eq!(grabber.find("").unwrap(), None);
        drop(grabber);

        assert_eq!(state.lock().closes, 1);
    }

    #[test]
    fn test_trait_object_dispatch() {
        let mut boxed: Box<dyn WindowGrabber> = Box::new(grabber(true));
        assert_eq!(boxed.find("").unwrap(), Some(DESKTOP));
        assert_eq!(boxed.list_windows().unwrap().map(|w| w.len()), Some(2));
        boxed.stop();
    }
}
