//! Non-volatile settings storage.
//!
//! The host owns the NVS layout. This crate only asks for a slot of a fixed
//! size once at startup and then loads or saves its record there.

use crate::error::NvsError;

/// Address of an allocated NVS slot.
pub type NvsAddress = u16;

/// Fixed-size record storage provided by the host.
///
/// # Implementation Notes
///
/// - `alloc()` is called once at init; returning `None` is a configuration
///   fault and disables the protection features
/// - `load()` must fail (rather than return garbage) for a slot that was
///   never written; the caller then restores defaults
pub trait SettingsStore {
    /// Reserve `size` bytes. Returns the slot address.
    fn alloc(&mut self, size: usize) -> Option<NvsAddress>;

    /// Read the record at `address` into `buf`.
    fn load(&mut self, address: NvsAddress, buf: &mut [u8]) -> Result<(), NvsError>;

    /// Write `data` to the record at `address`.
    fn save(&mut self, address: NvsAddress, data: &[u8]) -> Result<(), NvsError>;
}
