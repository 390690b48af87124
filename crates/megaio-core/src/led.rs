//! LED driver chips.
//!
//! The board routes the driver pins to the front-panel LEDs in an order that
//! has nothing to do with the LED numbering. Callers work with a logical
//! mask (bit 0 = LED 1); the chip's data register wants the wire order. The
//! two are related by the fixed permutation in [`LOGICAL_TO_WIRE`].

use log::{debug, trace};
use parking_lot::Mutex;

use crate::config::{BusConfig, CHIP_COUNT};
use crate::error::{Error, Result};
use crate::transport::{Bus, LinuxBus, RegisterTransport};

/// LEDs driven by one chip.
pub const LED_COUNT: u8 = 16;

/// Output latch of the driver chip, 16 bits.
pub const LED_DATA_REGISTER: u8 = 0x02;
/// Pin direction of the driver chip, 16 bits, a cleared bit is an output.
pub const DIRECTION_REGISTER: u8 = 0x06;
const ALL_OUTPUTS: u16 = 0x0000;

/// `LOGICAL_TO_WIRE[n]` is the register bit that drives logical LED bit `n`.
pub const LOGICAL_TO_WIRE: [u8; 16] = [11, 10, 9, 8, 7, 6, 5, 4, 12, 13, 14, 15, 0, 1, 2, 3];

/// `WIRE_TO_LOGICAL[n]` is the logical LED bit fed by register bit `n`.
pub const WIRE_TO_LOGICAL: [u8; 16] = invert(&LOGICAL_TO_WIRE);

const fn invert(table: &[u8; 16]) -> [u8; 16] {
    let mut inverse = [0u8; 16];
    let mut i = 0;
    while i < 16 {
        inverse[table[i] as usize] = i as u8;
        i += 1;
    }
    inverse
}

fn permute(value: u16, table: &[u8; 16]) -> u16 {
    table
        .iter()
        .enumerate()
        .filter(|&(from, _)| value & (1 << from) != 0)
        .fold(0, |acc, (_, &to)| acc | (1 << to))
}

/// Logical LED mask to the value the data register expects.
pub fn encode(mask: u16) -> u16 {
    let wire = permute(mask, &LOGICAL_TO_WIRE);
    trace!("encode {mask:#06x} -> {wire:#06x}");
    wire
}

/// Data register value to the logical LED mask.
pub fn decode(wire: u16) -> u16 {
    let mask = permute(wire, &WIRE_TO_LOGICAL);
    trace!("decode {wire:#06x} -> {mask:#06x}");
    mask
}

/// Reads and writes the LED masks of both driver chips.
///
/// Every call opens its own device handle. A lock per chip keeps the frames
/// of concurrent callers on the same chip from interleaving.
pub struct LedController<B> {
    bus: B,
    config: BusConfig,
    locks: [Mutex<()>; CHIP_COUNT as usize],
}

impl LedController<LinuxBus> {
    pub fn linux(config: BusConfig) -> Self {
        Self::new(LinuxBus::new(config.bus_path.clone()), config)
    }
}

impl<B: Bus> LedController<B> {
    pub fn new(bus: B, config: BusConfig) -> Self {
        Self {
            bus,
            config,
            locks: Default::default(),
        }
    }

    pub fn get_led_val(&self, chip: u8) -> Result<u16> {
        let address = self.config.chip_address(chip)?;
        let _guard = self.locks[chip as usize].lock();
        self.read_mask(address)
    }

    pub fn set_led_val(&self, chip: u8, mask: u32) -> Result<()> {
        let address = self.config.chip_address(chip)?;
        let mask = u16::try_from(mask)
            .map_err(|_| Error::invalid(format!("LED mask {mask:#x} exceeds 0xffff")))?;
        let _guard = self.locks[chip as usize].lock();
        self.write_mask(address, mask)
    }

    /// Switches one LED (numbered from 1) and leaves the others as they are.
    pub fn set_led(&self, chip: u8, led: u8, on: bool) -> Result<()> {
        let address = self.config.chip_address(chip)?;
        let bit = led_bit(led)?;
        let _guard = self.locks[chip as usize].lock();
        let mask = self.read_mask(address)?;
        let mask = if on { mask | bit } else { mask & !bit };
        self.write_mask(address, mask)
    }

    pub fn led_state(&self, chip: u8, led: u8) -> Result<bool> {
        let bit = led_bit(led)?;
        Ok(self.get_led_val(chip)? & bit != 0)
    }

    fn read_mask(&self, address: u8) -> Result<u16> {
        let mut regs = RegisterTransport::new(self.bus.open(address)?);
        let wire = regs.read_reg16(LED_DATA_REGISTER)?;
        let mask = decode(wire);
        debug!("chip {address:#04x}: leds {mask:#06x}");
        Ok(mask)
    }

    fn write_mask(&self, address: u8, mask: u16) -> Result<()> {
        let mut regs = RegisterTransport::new(self.bus.open(address)?);
        // The data latch only reaches the pins once they are outputs.
        regs.write_reg16(DIRECTION_REGISTER, ALL_OUTPUTS)?;
        regs.write_reg16(LED_DATA_REGISTER, encode(mask))?;
        debug!("chip {address:#04x}: leds <- {mask:#06x}");
        Ok(())
    }
}

fn led_bit(led: u8) -> Result<u16> {
    if (1..=LED_COUNT).contains(&led) {
        Ok(1 << (led - 1))
    } else {
        Err(Error::invalid(format!("LED {led} out of range (1..={LED_COUNT})")))
    }
}
