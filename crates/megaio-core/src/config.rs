use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of LED driver chips on the board.
pub const CHIP_COUNT: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Character device of the I2C bus the board sits on.
    pub bus_path: PathBuf,
    /// Slave address of chip 0; chip `n` answers at `base_address + n`.
    pub base_address: u8,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            bus_path: PathBuf::from("/dev/i2c-1"),
            base_address: 0x20,
        }
    }
}

impl BusConfig {
    pub fn chip_address(&self, chip: u8) -> Result<u8> {
        if chip >= CHIP_COUNT {
            return Err(Error::invalid(format!(
                "chip index {chip} out of range (0..{CHIP_COUNT})"
            )));
        }
        match self.base_address.checked_add(chip) {
            Some(address) if address <= 0x7f => Ok(address),
            _ => Err(Error::invalid(format!(
                "base address {:#04x} does not leave room for chip {chip} in 7-bit space",
                self.base_address
            ))),
        }
    }
}
