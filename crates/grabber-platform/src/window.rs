use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GrabError;

/// Server-scoped window identifier.
///
/// Handles are plain reference values; the window behind one may disappear at
/// any time, in which case operations on it fail instead of crashing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowHandle(u32);

impl WindowHandle {
    /// Sentinel returned by protocol lookups that found nothing
    pub const NONE: WindowHandle = WindowHandle(0);

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl FromStr for WindowHandle {
    type Err = GrabError;

    /// Accepts decimal (`62914563`) and hex (`0x03c00003`) notation.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => s.parse::<u32>(),
        };
        parsed
            .map(WindowHandle)
            .map_err(|_| GrabError::InvalidArgument(format!("invalid window handle: {s}")))
    }
}

/// One entry of a window list snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub handle: WindowHandle,
    pub title: String,
}

/// Sub-rectangle of a window, in window-relative pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Intersect with a `bounds_width` x `bounds_height` window.
    /// Returns a zero-sized region anchored at the clamped origin when the
    /// two do not overlap.
    pub fn clip_to(&self, bounds_width: u32, bounds_height: u32) -> Region {
        let x0 = i64::from(self.x).clamp(0, i64::from(bounds_width));
        let y0 = i64::from(self.y).clamp(0, i64::from(bounds_height));
        let x1 = (i64::from(self.x) + i64::from(self.width)).clamp(x0, i64::from(bounds_width));
        let y1 = (i64::from(self.y) + i64::from(self.height)).clamp(y0, i64::from(bounds_height));

        Region {
            x: x0 as i32,
            y: y0 as i32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl FromStr for Region {
    type Err = GrabError;

    /// Parses `x,y,width,height`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || GrabError::InvalidArgument(format!("invalid region '{s}', expected x,y,w,h"));
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(invalid());
        }
        let x = parts[0].parse().map_err(|_| invalid())?;
        let y = parts[1].parse().map_err(|_| invalid())?;
        let width = parts[2].parse().map_err(|_| invalid())?;
        let height = parts[3].parse().map_err(|_| invalid())?;
        Ok(Region { x, y, width, height })
    }
}
