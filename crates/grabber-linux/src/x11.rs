//! X11 protocol binding using x11rb.
//!
//! Replies that come back as X11 errors are routed to the installed error
//! hook and the operation returns its sentinel value. Errors of requests
//! whose replies are never awaited arrive through the event queue and are
//! forwarded the same way after every operation.

use grabber_platform::matching;
use grabber_platform::protocol::{
    ClientWindow, ErrorHook, ErrorRecord, LinkError, Protocol, RawImage, BAD_WINDOW,
};
use grabber_platform::window::{Region, WindowHandle};
use tracing::{debug, info, warn};
use x11rb::connection::Connection;
use x11rb::errors::{ConnectionError, ReplyError};
use x11rb::protocol::xproto::{Atom, AtomEnum, ConnectionExt as _, ImageFormat, ImageOrder, Window};
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;
use x11rb::x11_utils::X11Error;

use crate::hook;

/// Live connection plus the atoms every lookup needs
pub struct X11Connection {
    conn: RustConnection,
    root: Window,
    net_client_list: Atom,
    net_wm_name: Atom,
}

/// X11 implementation of the native protocol surface
#[derive(Debug, Default)]
pub struct X11Protocol;

impl X11Protocol {
    pub fn new() -> Self {
        Self
    }

    fn grab(
        &self,
        conn: &X11Connection,
        window: Window,
        region: Region,
    ) -> Result<Option<RawImage>, LinkError> {
        if region.is_empty() {
            debug!("region {:?} is empty, nothing to fetch", region);
            return Ok(Some(RawImage::empty()));
        }

        let reply = settle(
            conn.conn
                .get_image(
                    ImageFormat::Z_PIXMAP,
                    window,
                    region.x as i16,
                    region.y as i16,
                    region.width as u16,
                    region.height as u16,
                    u32::MAX,
                )
                .map_err(link_error)?
                .reply(),
        )?;
        let Some(reply) = reply else {
            return Ok(None);
        };

        let setup = conn.conn.setup();
        let format = setup
            .pixmap_formats
            .iter()
            .find(|f| f.depth == reply.depth);
        let (bits_per_pixel, scanline_pad) = match format {
            Some(f) => (f.bits_per_pixel, f.scanline_pad.max(8)),
            None => {
                warn!("no pixmap format for depth {}", reply.depth);
                (0, 8)
            }
        };

        let pad = u32::from(scanline_pad);
        let row_bits = region.width * u32::from(bits_per_pixel);
        let stride = (row_bits.div_ceil(pad) * pad / 8) as usize;

        let mut data = reply.data;
        if bits_per_pixel == 32 && setup.image_byte_order == ImageOrder::MSB_FIRST {
            normalize_msb_first(&mut data);
        }

        debug!(
            "fetched {}x{} image (depth={}, bpp={}, stride={})",
            region.width, region.height, reply.depth, bits_per_pixel, stride
        );

        Ok(Some(RawImage {
            width: region.width,
            height: region.height,
            stride,
            bits_per_pixel,
            data,
        }))
    }

    /// Title property of `window`. With `tolerate_vanished`, a window that
    /// closed since it was listed reads as untitled instead of raising.
    fn window_name(
        &self,
        conn: &X11Connection,
        window: Window,
        tolerate_vanished: bool,
    ) -> Result<Option<Vec<u8>>, LinkError> {
        for property in [conn.net_wm_name, Atom::from(AtomEnum::WM_NAME)] {
            let reply = conn
                .conn
                .get_property(false, window, property, AtomEnum::ANY, 0, u32::MAX)
                .map_err(link_error)?
                .reply();
            let reply = if tolerate_vanished {
                settle_vanished(reply)?
            } else {
                settle(reply)?
            };
            match reply {
                Some(reply) if !reply.value.is_empty() => return Ok(Some(reply.value)),
                Some(_) => continue,
                None => return Ok(None),
            }
        }
        Ok(None)
    }

    fn geometry(&self, conn: &X11Connection, window: Window) -> Result<Option<(u32, u32)>, LinkError> {
        let reply = settle(conn.conn.get_geometry(window).map_err(link_error)?.reply())?;
        Ok(reply.map(|g| (u32::from(g.width), u32::from(g.height))))
    }

    fn client_windows(&self, conn: &X11Connection) -> Result<Vec<Window>, LinkError> {
        let reply = settle(
            conn.conn
                .get_property(false, conn.root, conn.net_client_list, AtomEnum::WINDOW, 0, u32::MAX)
                .map_err(link_error)?
                .reply(),
        )?;
        Ok(reply
            .and_then(|r| r.value32().map(|windows| windows.collect()))
            .unwrap_or_default())
    }
}

impl Protocol for X11Protocol {
    type Connection = X11Connection;

    fn install_error_hook(&self, hook: ErrorHook) {
        hook::install(hook);
    }

    fn open_connection(&self, display: Option<&str>) -> Result<X11Connection, LinkError> {
        let (conn, screen_num) = RustConnection::connect(display)
            .map_err(|e| LinkError(format!("failed to connect to X11 display: {e}")))?;

        let root = conn
            .setup()
            .roots
            .get(screen_num)
            .map(|screen| screen.root)
            .ok_or_else(|| LinkError(format!("no X11 screen {screen_num}")))?;

        let net_client_list = intern(&conn, b"_NET_CLIENT_LIST")?;
        let net_wm_name = intern(&conn, b"_NET_WM_NAME")?;

        info!("connected to X11 display (screen {}, root 0x{:x})", screen_num, root);

        Ok(X11Connection {
            conn,
            root,
            net_client_list,
            net_wm_name,
        })
    }

    fn close_connection(&self, conn: X11Connection) {
        if let Err(e) = conn.conn.flush() {
            debug!("flush on close failed: {}", e);
        }
        drop(conn);
        info!("X11 connection closed");
    }

    fn resolve_window_by_title(
        &self,
        conn: &X11Connection,
        title: &str,
        threshold: f32,
    ) -> Result<WindowHandle, LinkError> {
        let windows = self.client_windows(conn)?;
        let mut names = Vec::with_capacity(windows.len());
        for &window in &windows {
            let name = self
                .window_name(conn, window, true)?
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
            names.push(name);
        }

        let best = matching::best_match(title, names.iter().map(|n| n.as_deref()), threshold);
        let handle = best.map_or(WindowHandle::NONE, |i| WindowHandle::from_raw(windows[i]));
        debug!("title '{}' resolved to {} among {} clients", title, handle, windows.len());

        finish(conn, handle)
    }

    fn resolve_desktop(&self, conn: &X11Connection) -> Result<WindowHandle, LinkError> {
        finish(conn, WindowHandle::from_raw(conn.root))
    }

    fn get_window_title(
        &self,
        conn: &X11Connection,
        handle: WindowHandle,
    ) -> Result<Option<Vec<u8>>, LinkError> {
        let name = self.window_name(conn, handle.raw(), false)?;
        finish(conn, name)
    }

    fn capture_window(
        &self,
        conn: &X11Connection,
        handle: WindowHandle,
    ) -> Result<Option<RawImage>, LinkError> {
        let image = match self.geometry(conn, handle.raw())? {
            Some((width, height)) => self.grab(conn, handle.raw(), Region::new(0, 0, width, height))?,
            None => None,
        };
        finish(conn, image)
    }

    fn capture_region(
        &self,
        conn: &X11Connection,
        handle: WindowHandle,
        region: Region,
    ) -> Result<Option<RawImage>, LinkError> {
        let image = match self.geometry(conn, handle.raw())? {
            Some((width, height)) => self.grab(conn, handle.raw(), region.clip_to(width, height))?,
            None => None,
        };
        finish(conn, image)
    }

    fn release_image(&self, image: RawImage) {
        debug!("releasing {}x{} image ({} bytes)", image.width, image.height, image.data.len());
        drop(image);
    }

    fn get_window_geometry(
        &self,
        conn: &X11Connection,
        handle: WindowHandle,
    ) -> Result<Option<(u32, u32)>, LinkError> {
        let size = self.geometry(conn, handle.raw())?;
        finish(conn, size)
    }

    fn list_client_windows(&self, conn: &X11Connection) -> Result<Vec<ClientWindow>, LinkError> {
        let windows = self.client_windows(conn)?;
        let mut clients = Vec::with_capacity(windows.len());
        for window in windows {
            clients.push(ClientWindow {
                handle: WindowHandle::from_raw(window),
                name: self.window_name(conn, window, true)?,
            });
        }
        finish(conn, clients)
    }
}

fn intern(conn: &RustConnection, name: &[u8]) -> Result<Atom, LinkError> {
    let reply = conn
        .intern_atom(false, name)
        .map_err(link_error)?
        .reply()
        .map_err(|e| LinkError(format!("failed to intern {}: {e}", String::from_utf8_lossy(name))))?;
    Ok(reply.atom)
}

/// Route an X11 error reply to the hook; keep connection failures in-band.
fn settle<T>(reply: Result<T, ReplyError>) -> Result<Option<T>, LinkError> {
    match reply {
        Ok(value) => Ok(Some(value)),
        Err(ReplyError::X11Error(error)) => {
            hook::report(&error_record(&error));
            Ok(None)
        }
        Err(ReplyError::ConnectionError(error)) => Err(link_error(error)),
    }
}

/// Like [`settle`], but a BadWindow reply means the window closed after it
/// was listed and is swallowed.
fn settle_vanished<T>(reply: Result<T, ReplyError>) -> Result<Option<T>, LinkError> {
    match reply {
        Err(ReplyError::X11Error(error)) if error.error_code == BAD_WINDOW => {
            debug!("window 0x{:x} vanished while listing", error.bad_value);
            Ok(None)
        }
        other => settle(other),
    }
}

/// Forward queued asynchronous errors, then hand back `value`.
fn finish<T>(conn: &X11Connection, value: T) -> Result<T, LinkError> {
    while let Some(event) = conn.conn.poll_for_event().map_err(link_error)? {
        if let Event::Error(error) = event {
            hook::report(&error_record(&error));
        }
    }
    Ok(value)
}

fn error_record(error: &X11Error) -> ErrorRecord {
    ErrorRecord {
        kind: 0,
        serial: u64::from(error.sequence),
        error_code: error.error_code,
        request_code: error.major_opcode,
        minor_code: error.minor_opcode,
        resource_id: error.bad_value,
    }
}

fn link_error(error: ConnectionError) -> LinkError {
    LinkError(format!("X11 connection failed: {error}"))
}

/// Rewrite MSB-first 32-bit pixels (pad, R, G, B) into B, G, R, pad order.
fn normalize_msb_first(data: &mut [u8]) {
    for pixel in data.chunks_exact_mut(4) {
        pixel.reverse();
    }
}
