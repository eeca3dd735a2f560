use std::fmt;
use std::str::FromStr;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::GrabError;

/// Pixel layouts known to the grabber
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Server-native packed layout: blue, green, red, padding/alpha
    Bgra,
    Rgb,
    Bgr,
    Gray,
}

impl PixelFormat {
    pub const fn channels(self) -> usize {
        match self {
            Self::Bgra => 4,
            Self::Rgb | Self::Bgr => 3,
            Self::Gray => 1,
        }
    }
}

/// Output layout a caller may request
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorFormat {
    #[default]
    Rgb,
    Bgr,
    Gray,
}

impl ColorFormat {
    pub const fn pixel_format(self) -> PixelFormat {
        match self {
            Self::Rgb => PixelFormat::Rgb,
            Self::Bgr => PixelFormat::Bgr,
            Self::Gray => PixelFormat::Gray,
        }
    }

    pub const fn channels(self) -> usize {
        self.pixel_format().channels()
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rgb => "rgb",
            Self::Bgr => "bgr",
            Self::Gray => "gray",
        }
    }
}

impl fmt::Display for ColorFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColorFormat {
    type Err = GrabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rgb" => Ok(Self::Rgb),
            "bgr" => Ok(Self::Bgr),
            "gray" | "grey" => Ok(Self::Gray),
            _ => Err(GrabError::InvalidArgument(format!("unknown color format: {s}"))),
        }
    }
}

/// Container handed back to the caller
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultShape {
    /// Dense (height, width, channels) byte array
    #[default]
    Array,
    /// `image::DynamicImage` wrapping the same bytes
    Image,
}

impl ResultShape {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Array => "array",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for ResultShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResultShape {
    type Err = GrabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "array" | "cv2" => Ok(Self::Array),
            "image" | "pil" => Ok(Self::Image),
            _ => Err(GrabError::InvalidArgument(format!("unknown result shape: {s}"))),
        }
    }
}

/// Row-major (height, width, channels) pixel array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelArray {
    height: usize,
    width: usize,
    channels: usize,
    data: Vec<u8>,
}

impl PixelArray {
    /// Returns `None` when `data` does not hold exactly `height * width * channels` bytes.
    pub fn from_vec(height: usize, width: usize, channels: usize, data: Vec<u8>) -> Option<Self> {
        if data.len() != height * width * channels {
            return None;
        }
        Some(Self {
            height,
            width,
            channels,
            data,
        })
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.height, self.width, self.channels)
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn get(&self, y: usize, x: usize, c: usize) -> Option<u8> {
        if y >= self.height || x >= self.width || c >= self.channels {
            return None;
        }
        self.data.get((y * self.width + x) * self.channels + c).copied()
    }

    /// Channel values of one pixel
    pub fn pixel(&self, y: usize, x: usize) -> Option<&[u8]> {
        if y >= self.height || x >= self.width {
            return None;
        }
        let start = (y * self.width + x) * self.channels;
        self.data.get(start..start + self.channels)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

/// A captured, converted bitmap
#[derive(Debug, Clone)]
pub enum Image {
    Array(PixelArray),
    /// `ImageRgb8` for rgb and bgr (bgr keeps its byte order), `ImageLuma8` for gray
    Image(DynamicImage),
}

impl Image {
    pub fn width(&self) -> usize {
        match self {
            Self::Array(array) => array.width(),
            Self::Image(image) => image.width() as usize,
        }
    }

    pub fn height(&self) -> usize {
        match self {
            Self::Array(array) => array.height(),
            Self::Image(image) => image.height() as usize,
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            Self::Array(array) => array.channels(),
            Self::Image(image) => image.color().channel_count() as usize,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Array(array) => array.as_bytes(),
            Self::Image(image) => image.as_bytes(),
        }
    }

    pub fn as_array(&self) -> Option<&PixelArray> {
        match self {
            Self::Array(array) => Some(array),
            Self::Image(_) => None,
        }
    }

    pub fn as_image(&self) -> Option<&DynamicImage> {
        match self {
            Self::Array(_) => None,
            Self::Image(image) => Some(image),
        }
    }
}
