//! Trait definitions for hardware abstraction and host collaboration.
//!
//! This module defines the core abstractions that allow probe-protect to:
//! - Run inside different host controllers (firmware glue, ESP32 guard board)
//! - Read digital inputs on different hardware
//! - Persist its settings in whatever NVS the host provides
//!
//! # Submodules
//!
//! - `hardware`: Digital input ports and clock
//! - `host`: Machine controller collaborator (command queue, spindle, settings)
//! - `storage`: Non-volatile record storage
//!
//! # Host Abstraction
//!
//! The key traits are:
//!
//! - [`DigitalPorts`]: Numbered auxiliary inputs with claiming
//! - [`MachineHost`]: Real-time commands, messages, probe and spindle access
//! - [`SettingsStore`]: Fixed-size record persistence
//! - [`Clock`]: Time source for `no_std` environments

pub mod hardware;
pub mod host;
pub mod storage;

pub use hardware::*;
pub use host::*;
pub use storage::*;
