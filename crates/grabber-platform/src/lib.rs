// Shared types and traits for window grabbing backends

pub mod error;
pub mod grabber;
pub mod matching;
pub mod pixel;
pub mod protocol;
pub mod window;
