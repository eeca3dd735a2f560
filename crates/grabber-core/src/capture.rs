//! Capture engine: raw image acquisition, conversion and packaging.

use grabber_platform::error::{GrabError, GrabResult};
use grabber_platform::pixel::{ColorFormat, Image, PixelArray, ResultShape};
use grabber_platform::protocol::{Protocol, RawImage};
use grabber_platform::window::{Region, WindowHandle};
use image::{DynamicImage, GrayImage, RgbImage};
use tracing::{debug, warn};

use crate::connection::ConnectionManager;
use crate::convert;
use crate::error_channel;

/// Scoped ownership of a backend-allocated image.
///
/// The image is handed back to the backend exactly once, when the lease is
/// dropped, whichever way the capture ends.
pub struct ImageLease<'a, P: Protocol> {
    protocol: &'a P,
    image: RawImage,
}

impl<'a, P: Protocol> ImageLease<'a, P> {
    pub fn new(protocol: &'a P, image: RawImage) -> Self {
        Self { protocol, image }
    }

    pub fn raw(&self) -> &RawImage {
        &self.image
    }
}

impl<P: Protocol> Drop for ImageLease<'_, P> {
    fn drop(&mut self) {
        // the placeholder owns no backend memory
        let image = std::mem::replace(&mut self.image, RawImage::empty());
        if let Err(e) = error_channel::guarded("release_image", || self.protocol.release_image(image)) {
            warn!("releasing image failed: {}", e);
        }
    }
}

/// Capture `handle` (or `region` of it) and convert to `format`/`shape`.
pub fn capture<P: Protocol>(
    conn: &ConnectionManager<P>,
    handle: WindowHandle,
    region: Option<Region>,
    format: ColorFormat,
    shape: ResultShape,
) -> GrabResult<Image> {
    let lease = match region {
        None => conn.call("capture_window", |p, c| {
            Ok(p.capture_window(c, handle)?.map(|image| ImageLease::new(p, image)))
        }),
        Some(region) => conn.call("capture_region", |p, c| {
            Ok(p.capture_region(c, handle, region)?.map(|image| ImageLease::new(p, image)))
        }),
    };
    let lease = lease
        .map_err(|e| stale_as_capture(e, handle))?
        .ok_or_else(|| GrabError::Capture(format!("window {handle} produced no image")))?;

    let raw = lease.raw();
    let (width, height) = (raw.width, raw.height);
    let data = convert::convert(raw, format.pixel_format())?;
    drop(lease);

    debug!("captured {} as {}x{} {} {}", handle, width, height, format, shape);
    package(data, width, height, format, shape)
}

fn stale_as_capture(error: GrabError, handle: WindowHandle) -> GrabError {
    match error {
        GrabError::Protocol { record, .. } if record.is_stale_window() => {
            GrabError::Capture(format!("window {handle} is gone ({record})"))
        }
        other => other,
    }
}

fn package(
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: ColorFormat,
    shape: ResultShape,
) -> GrabResult<Image> {
    let mismatch = || GrabError::Capture(format!("converted buffer does not match {width}x{height} {format}"));

    match shape {
        ResultShape::Array => {
            PixelArray::from_vec(height as usize, width as usize, format.channels(), data)
                .map(Image::Array)
                .ok_or_else(mismatch)
        }
        ResultShape::Image => {
            let image = match format {
                ColorFormat::Rgb | ColorFormat::Bgr => {
                    RgbImage::from_raw(width, height, data).map(DynamicImage::ImageRgb8)
                }
                ColorFormat::Gray => GrayImage::from_raw(width, height, data).map(DynamicImage::ImageLuma8),
            };
            image.map(Image::Image).ok_or_else(mismatch)
        }
    }
}
