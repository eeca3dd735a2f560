//! Packed BGRA to caller-facing pixel layouts.

use grabber_platform::error::{GrabError, GrabResult};
use grabber_platform::pixel::PixelFormat;
use grabber_platform::protocol::RawImage;

const SOURCE_BYTES_PER_PIXEL: usize = 4;

// BT.601 luma weights in 14-bit fixed point (sum = 1 << 14)
const LUMA_R: u32 = 4899;
const LUMA_G: u32 = 9617;
const LUMA_B: u32 = 1868;
const LUMA_SHIFT: u32 = 14;

#[inline(always)]
pub(crate) fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((u32::from(r) * LUMA_R + u32::from(g) * LUMA_G + u32::from(b) * LUMA_B + (1 << (LUMA_SHIFT - 1)))
        >> LUMA_SHIFT) as u8
}

/// Convert a raw capture into tightly packed rows of `format`.
///
/// Row padding (`stride`) is dropped. A 0x0 image converts to an empty buffer.
pub fn convert(raw: &RawImage, format: PixelFormat) -> GrabResult<Vec<u8>> {
    if raw.bits_per_pixel != 32 {
        return Err(GrabError::Capture(format!(
            "unsupported pixel size: {} bits per pixel",
            raw.bits_per_pixel
        )));
    }

    let width = raw.width as usize;
    let height = raw.height as usize;
    let row_bytes = width * SOURCE_BYTES_PER_PIXEL;

    if height > 0 && raw.stride < row_bytes {
        return Err(GrabError::Capture(format!(
            "stride {} shorter than a {}-pixel row",
            raw.stride, width
        )));
    }
    let required = if height == 0 { 0 } else { raw.stride * (height - 1) + row_bytes };
    if raw.data.len() < required {
        return Err(GrabError::Capture(format!(
            "image buffer holds {} bytes, {}x{} needs {}",
            raw.data.len(),
            width,
            height,
            required
        )));
    }

    let mut out = Vec::with_capacity(width * height * format.channels());
    for y in 0..height {
        let start = y * raw.stride;
        let row = &raw.data[start..start + row_bytes];
        for px in row.chunks_exact(SOURCE_BYTES_PER_PIXEL) {
            let (b, g, r) = (px[0], px[1], px[2]);
            match format {
                PixelFormat::Bgra => out.extend_from_slice(px),
                PixelFormat::Rgb => out.extend_from_slice(&[r, g, b]),
                PixelFormat::Bgr => out.extend_from_slice(&[b, g, r]),
                PixelFormat::Gray => out.push(luma(r, g, b)),
            }
        }
    }

    Ok(out)
}
