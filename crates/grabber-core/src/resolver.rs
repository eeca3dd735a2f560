//! Window lookup, enumeration and geometry.

use grabber_platform::error::{GrabError, GrabResult};
use grabber_platform::matching::DEFAULT_MATCH_THRESHOLD;
use grabber_platform::protocol::Protocol;
use grabber_platform::window::{WindowHandle, WindowInfo};
use tracing::debug;

use crate::connection::ConnectionManager;

#[derive(Debug, Clone)]
pub struct WindowResolver {
    threshold: f32,
}

impl Default for WindowResolver {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_THRESHOLD)
    }
}

impl WindowResolver {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Best title match, or the desktop root for an empty title
    pub fn find_by_title<P: Protocol>(
        &self,
        conn: &ConnectionManager<P>,
        title: &str,
    ) -> GrabResult<WindowHandle> {
        let handle = if title.is_empty() {
            conn.call("resolve_desktop", |p, c| p.resolve_desktop(c))?
        } else {
            conn.call("resolve_window_by_title", |p, c| {
                p.resolve_window_by_title(c, title, self.threshold)
            })?
        };

        if handle.is_none() {
            return Err(GrabError::NotFound(title.to_string()));
        }
        debug!("found '{}' as {}", title, handle);
        Ok(handle)
    }

    /// Snapshot of the client list in server order
    pub fn list_windows<P: Protocol>(&self, conn: &ConnectionManager<P>) -> GrabResult<Vec<WindowInfo>> {
        let clients = conn.call("list_client_windows", |p, c| p.list_client_windows(c))?;
        Ok(clients
            .into_iter()
            .map(|client| WindowInfo {
                handle: client.handle,
                title: decode_title(client.handle, client.name),
            })
            .collect())
    }

    pub fn size<P: Protocol>(
        &self,
        conn: &ConnectionManager<P>,
        handle: WindowHandle,
    ) -> GrabResult<(u32, u32)> {
        conn.call("get_window_geometry", |p, c| p.get_window_geometry(c, handle))
            .map_err(|e| stale_as_lookup(e, handle))?
            .ok_or(GrabError::Lookup(handle))
    }

    pub fn title<P: Protocol>(&self, conn: &ConnectionManager<P>, handle: WindowHandle) -> GrabResult<String> {
        let name = conn
            .call("get_window_title", |p, c| p.get_window_title(c, handle))
            .map_err(|e| stale_as_lookup(e, handle))?;
        Ok(decode_title(handle, name))
    }
}

fn stale_as_lookup(error: GrabError, handle: WindowHandle) -> GrabError {
    match error {
        GrabError::Protocol { record, .. } if record.is_stale_window() => GrabError::Lookup(handle),
        other => other,
    }
}

/// Strict UTF-8; anything else becomes an empty title
fn decode_title(handle: WindowHandle, name: Option<Vec<u8>>) -> String {
    match name.map(String::from_utf8) {
        Some(Ok(title)) => title,
        Some(Err(e)) => {
            debug!("title of {} is not valid UTF-8: {}", handle, e);
            String::new()
        }
        None => String::new(),
    }
}
