//! Instrumented in-memory protocol binding for tests.

use std::collections::VecDeque;
use std::sync::Arc;

use grabber_platform::matching;
use grabber_platform::protocol::{
    ClientWindow, ErrorHook, ErrorRecord, LinkError, Protocol, RawImage, BAD_DRAWABLE, BAD_WINDOW,
};
use grabber_platform::window::{Region, WindowHandle};
use parking_lot::Mutex;

pub const DESKTOP: WindowHandle = WindowHandle::from_raw(0x100);

#[derive(Debug, Clone)]
pub struct FakeWindow {
    pub handle: WindowHandle,
    pub name: Option<Vec<u8>>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Default)]
pub struct FakeState {
    /// Every protocol operation that reached the binding, in order
    pub calls: Vec<&'static str>,
    pub allocated: usize,
    pub released: usize,
    pub closes: usize,
    pub windows: Vec<FakeWindow>,
    pub hook: Option<ErrorHook>,
    /// Errors delivered through the hook the next time the named call runs
    pub scheduled: VecDeque<(&'static str, ErrorRecord)>,
    /// Still in the client list but closed before anything else is read
    pub vanished: Vec<WindowHandle>,
    pub unreachable: bool,
    pub link_broken: bool,
    /// Return no image even for live windows
    pub withhold_images: bool,
    /// Bits per pixel reported for produced images
    pub bits_per_pixel: Option<u8>,
    /// Extra padding bytes appended to every row
    pub row_padding: usize,
}

/// Pixel of a fake window at (x, y): blue = x, green = y, red = x + y
pub fn fake_pixel(x: u32, y: u32) -> [u8; 4] {
    [x as u8, y as u8, (x + y) as u8, 0xff]
}

pub struct FakeProtocol {
    state: Arc<Mutex<FakeState>>,
}

pub struct FakeConnection;

impl FakeProtocol {
    pub fn new() -> Self {
        let state = FakeState {
            windows: vec![
                FakeWindow {
                    handle: WindowHandle::from_raw(0x0400_0001),
                    name: Some(b"Terminal - bash".to_vec()),
                    width: 8,
                    height: 6,
                },
                FakeWindow {
                    handle: WindowHandle::from_raw(0x0400_0002),
                    name: Some(b"Mozilla Firefox".to_vec()),
                    width: 16,
                    height: 10,
                },
            ],
            ..FakeState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn with_windows(windows: Vec<FakeWindow>) -> Self {
        let fake = Self::new();
        fake.state.lock().windows = windows;
        fake
    }

    pub fn state(&self) -> Arc<Mutex<FakeState>> {
        Arc::clone(&self.state)
    }

    /// Record `call`, fire any error scheduled for it, check the link.
    fn enter(&self, state: &mut FakeState, call: &'static str) -> Result<(), LinkError> {
        state.calls.push(call);
        if let Some(pos) = state.scheduled.iter().position(|(name, _)| *name == call) {
            if let Some((_, record)) = state.scheduled.remove(pos) {
                raise(state, &record);
            }
        }
        if state.link_broken {
            return Err(LinkError("broken pipe".into()));
        }
        Ok(())
    }

    fn grab(&self, state: &mut FakeState, handle: WindowHandle, region: Option<Region>) -> Option<RawImage> {
        let Some(window) = state.live(handle).cloned() else {
            raise(state, &stale(BAD_DRAWABLE, handle));
            return None;
        };
        if state.withhold_images {
            return None;
        }

        let region = region
            .unwrap_or(Region::new(0, 0, window.width, window.height))
            .clip_to(window.width, window.height);

        let stride = region.width as usize * 4 + state.row_padding;
        let mut data = Vec::with_capacity(stride * region.height as usize);
        for y in 0..region.height {
            for x in 0..region.width {
                data.extend_from_slice(&fake_pixel(region.x as u32 + x, region.y as u32 + y));
            }
            data.extend(std::iter::repeat(0u8).take(state.row_padding));
        }

        state.allocated += 1;
        Some(RawImage {
            width: region.width,
            height: region.height,
            stride,
            bits_per_pixel: state.bits_per_pixel.unwrap_or(32),
            data,
        })
    }
}

impl FakeState {
    fn live(&self, handle: WindowHandle) -> Option<&FakeWindow> {
        if self.vanished.contains(&handle) {
            return None;
        }
        self.windows.iter().find(|w| w.handle == handle)
    }

    /// Title as read while listing; vanished windows read as untitled
    fn listed_name(&self, window: &FakeWindow) -> Option<Vec<u8>> {
        if self.vanished.contains(&window.handle) {
            None
        } else {
            window.name.clone()
        }
    }
}

fn raise(state: &FakeState, record: &ErrorRecord) {
    if let Some(hook) = state.hook {
        hook(record);
    }
}

pub fn stale(error_code: u8, handle: WindowHandle) -> ErrorRecord {
    ErrorRecord {
        kind: 0,
        serial: 1,
        error_code,
        request_code: 14,
        minor_code: 0,
        resource_id: handle.raw(),
    }
}

impl Protocol for FakeProtocol {
    type Connection = FakeConnection;

    fn install_error_hook(&self, hook: ErrorHook) {
        let mut state = self.state.lock();
        state.calls.push("install_error_hook");
        state.hook = Some(hook);
    }

    fn open_connection(&self, display: Option<&str>) -> Result<FakeConnection, LinkError> {
        let mut state = self.state.lock();
        state.calls.push("open_connection");
        if state.unreachable {
            return Err(LinkError(format!(
                "cannot reach display {}",
                display.unwrap_or(":0")
            )));
        }
        Ok(FakeConnection)
    }

    fn close_connection(&self, _conn: FakeConnection) {
        let mut state = self.state.lock();
        state.calls.push("close_connection");
        state.closes += 1;
    }

    fn resolve_window_by_title(
        &self,
        _conn: &FakeConnection,
        title: &str,
        threshold: f32,
    ) -> Result<WindowHandle, LinkError> {
        let mut state = self.state.lock();
        self.enter(&mut state, "resolve_window_by_title")?;
        let names: Vec<Option<String>> = state
            .windows
            .iter()
            .map(|w| state.listed_name(w).map(|n| String::from_utf8_lossy(&n).into_owned()))
            .collect();
        let best = matching::best_match(title, names.iter().map(|n| n.as_deref()), threshold);
        Ok(best.map_or(WindowHandle::NONE, |i| state.windows[i].handle))
    }

    fn resolve_desktop(&self, _conn: &FakeConnection) -> Result<WindowHandle, LinkError> {
        let mut state = self.state.lock();
        self.enter(&mut state, "resolve_desktop")?;
        Ok(DESKTOP)
    }

    fn get_window_title(
        &self,
        _conn: &FakeConnection,
        handle: WindowHandle,
    ) -> Result<Option<Vec<u8>>, LinkError> {
        let mut state = self.state.lock();
        self.enter(&mut state, "get_window_title")?;
        match state.live(handle) {
            Some(window) => Ok(window.name.clone()),
            None => {
                raise(&state, &stale(BAD_WINDOW, handle));
                Ok(None)
            }
        }
    }

    fn capture_window(
        &self,
        _conn: &FakeConnection,
        handle: WindowHandle,
    ) -> Result<Option<RawImage>, LinkError> {
        let mut state = self.state.lock();
        self.enter(&mut state, "capture_window")?;
        Ok(self.grab(&mut state, handle, None))
    }

    fn capture_region(
        &self,
        _conn: &FakeConnection,
        handle: WindowHandle,
        region: Region,
    ) -> Result<Option<RawImage>, LinkError> {
        let mut state = self.state.lock();
        self.enter(&mut state, "capture_region")?;
        Ok(self.grab(&mut state, handle, Some(region)))
    }

    fn release_image(&self, image: RawImage) {
        let mut state = self.state.lock();
        state.calls.push("release_image");
        state.released += 1;
        drop(image);
    }

    fn get_window_geometry(
        &self,
        _conn: &FakeConnection,
        handle: WindowHandle,
    ) -> Result<Option<(u32, u32)>, LinkError> {
        let mut state = self.state.lock();
        self.enter(&mut state, "get_window_geometry")?;
        match state.live(handle) {
            Some(window) => Ok(Some((window.width, window.height))),
            None => {
                raise(&state, &stale(BAD_WINDOW, handle));
                Ok(None)
            }
        }
    }

    fn list_client_windows(&self, _conn: &FakeConnection) -> Result<Vec<ClientWindow>, LinkError> {
        let mut state = self.state.lock();
        self.enter(&mut state, "list_client_windows")?;
        Ok(state
            .windows
            .iter()
            .map(|w| ClientWindow {
                handle: w.handle,
                name: state.listed_name(w),
            })
            .collect())
    }
}
