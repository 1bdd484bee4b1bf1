//! Hardware Abstraction Layer implementations.
//!
//! This module contains concrete implementations of the traits
//! defined in [`crate::traits`] for various platforms.
//!
//! # Available Implementations
//!
//! - `mock`: Test implementations for desktop development
//! - `halt`: Latched halt output over any `embedded-hal` pin
//! - `esp32`: ESP32-C3 stand-alone probe guard (requires `esp32` feature)

pub mod halt;
pub mod mock;

#[cfg(feature = "esp32")]
pub mod esp32;

pub use halt::HaltLine;
pub use mock::*;

#[cfg(feature = "esp32")]
pub use esp32::*;
