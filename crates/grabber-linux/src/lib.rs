// Linux platform implementations

#[cfg(target_os = "linux")]
pub mod hook;

#[cfg(target_os = "linux")]
pub mod x11;
