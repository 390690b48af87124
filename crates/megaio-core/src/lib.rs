//! Core functionalities: I2C register transport, LED bit mapping, operator
//! key wait and scheduling helpers for the Mega IO expansion board.

pub mod config;
pub mod error;
pub mod keypress;
pub mod led;
pub mod sched;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::BusConfig;
pub use error::{Error, Result};
pub use keypress::KeyWait;
pub use led::{LedController, LED_COUNT};
pub use transport::{Bus, I2cDevice, LinuxBus, RegisterTransport, RegisterWidth};
