//! Settings storage on the ESP-IDF NVS partition.
//!
//! Each allocated record is a raw blob under its own key in a dedicated
//! namespace. The blob is written whole, so a record is either the old or
//! the new value after a power loss, never a mix.

use crate::error::NvsError;
use crate::traits::{NvsAddress, SettingsStore};
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

/// NVS namespace used for probe protection records.
pub const NAMESPACE: &str = "probe_prot";

/// [`SettingsStore`] backed by ESP-IDF NVS.
///
/// # Example
///
/// ```ignore
/// use probe_protect::hal::esp32::Esp32Nvs;
/// use esp_idf_svc::nvs::EspDefaultNvsPartition;
///
/// let partition = EspDefaultNvsPartition::take()?;
/// let mut store = Esp32Nvs::new(partition)?;
/// ```
pub struct Esp32Nvs {
    nvs: EspNvs<NvsDefault>,
    next_address: NvsAddress,
}

impl Esp32Nvs {
    /// Opens the namespace read-write.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace cannot be opened.
    pub fn new(partition: EspDefaultNvsPartition) -> anyhow::Result<Self> {
        let nvs = EspNvs::new(partition, NAMESPACE, true)?;
        Ok(Self {
            nvs,
            next_address: 0,
        })
    }

    fn key(address: NvsAddress) -> String {
        format!("rec{address}")
    }
}

impl SettingsStore for Esp32Nvs {
    fn alloc(&mut self, _size: usize) -> Option<NvsAddress> {
        let address = self.next_address;
        self.next_address = address.checked_add(1)?;
        Some(address)
    }

    fn load(&mut self, address: NvsAddress, buf: &mut [u8]) -> Result<(), NvsError> {
        let mut blob = [0u8; 64];
        let data = self
            .nvs
            .get_raw(&Self::key(address), &mut blob)
            .map_err(|_| NvsError::Read)?
            .ok_or(NvsError::Read)?;
        if data.len() != buf.len() {
            return Err(NvsError::Read);
        }
        buf.copy_from_slice(data);
        Ok(())
    }

    fn save(&mut self, address: NvsAddress, data: &[u8]) -> Result<(), NvsError> {
        self.nvs
            .set_raw(&Self::key(address), data)
            .map(|_| ())
            .map_err(|_| NvsError::Write)
    }
}
