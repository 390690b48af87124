//! Register-level access to a chip behind a Linux I2C character device.
//!
//! Every transaction is framed the same way: the register address is written
//! as a single byte, then the data bytes follow (write) or are read back
//! (read). Multi-byte values travel most significant byte first.

use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{short_transfer, Error, Result};

const I2C_SLAVE: u16 = 0x0703;

nix::ioctl_write_int_bad!(i2c_set_slave_address, I2C_SLAVE);

/// Something that can hand out a byte stream bound to one slave address.
pub trait Bus {
    type Device: Read + Write;

    fn open(&self, address: u8) -> Result<Self::Device>;
}

impl<B: Bus + ?Sized> Bus for &B {
    type Device = B::Device;

    fn open(&self, address: u8) -> Result<Self::Device> {
        B::open(self, address)
    }
}

/// The kernel's `/dev/i2c-N` interface.
#[derive(Debug, Clone)]
pub struct LinuxBus {
    path: PathBuf,
}

impl LinuxBus {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Bus for LinuxBus {
    type Device = I2cDevice;

    fn open(&self, address: u8) -> Result<I2cDevice> {
        I2cDevice::open(&self.path, address)
    }
}

/// An open bus file with a slave address bound to it. Closed on drop.
#[derive(Debug)]
pub struct I2cDevice {
    file: File,
}

impl I2cDevice {
    pub fn open(path: &Path, address: u8) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| Error::BusOpen {
                path: path.to_path_buf(),
                source,
            })?;

        // SAFETY: the descriptor is owned by `file` and stays open for the call.
        unsafe { i2c_set_slave_address(file.as_raw_fd(), address.into()) }
            .map_err(|source| Error::SlaveBind { address, source })?;

        debug!("opened {} at slave {:#04x}", path.display(), address);
        Ok(Self { file })
    }
}

impl Read for I2cDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for I2cDevice {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterWidth {
    Byte,
    Word,
    Triple,
}

impl RegisterWidth {
    pub fn bytes(self) -> usize {
        match self {
            RegisterWidth::Byte => 1,
            RegisterWidth::Word => 2,
            RegisterWidth::Triple => 3,
        }
    }

    pub fn bits(self) -> u32 {
        self.bytes() as u32 * 8
    }

    pub fn max_value(self) -> u32 {
        (1u32 << self.bits()) - 1
    }
}

impl TryFrom<u32> for RegisterWidth {
    type Error = Error;

    fn try_from(bits: u32) -> Result<Self> {
        match bits {
            8 => Ok(RegisterWidth::Byte),
            16 => Ok(RegisterWidth::Word),
            24 => Ok(RegisterWidth::Triple),
            other => Err(Error::invalid(format!(
                "register width must be 8, 16 or 24 bits, got {other}"
            ))),
        }
    }
}

/// Register accessors on top of a raw device stream.
///
/// Each call is exactly one select write plus one read, or exactly one
/// write; nothing is retried or buffered between calls.
pub struct RegisterTransport<D> {
    device: D,
}

impl<D: Read + Write> RegisterTransport<D> {
    pub fn new(device: D) -> Self {
        Self { device }
    }

    pub fn read_register(&mut self, register: u8, width: RegisterWidth) -> Result<u32> {
        match self.device.write(&[register]) {
            Ok(1) => {}
            Ok(n) => {
                return Err(Error::Select {
                    register,
                    source: short_transfer(ErrorKind::WriteZero, n, 1),
                })
            }
            Err(source) => return Err(Error::Select { register, source }),
        }

        let mut buf = [0u8; 3];
        let buf = &mut buf[..width.bytes()];
        match self.device.read(buf) {
            Ok(n) if n == buf.len() => {}
            Ok(n) => {
                return Err(Error::Read {
                    register,
                    source: short_transfer(ErrorKind::UnexpectedEof, n, buf.len()),
                })
            }
            Err(source) => return Err(Error::Read { register, source }),
        }

        let value = buf.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
        debug!("read  reg {register:#04x} -> {value:#0w$x}", w = width.bytes() * 2 + 2);
        Ok(value)
    }

    pub fn write_register(&mut self, register: u8, value: u32, width: RegisterWidth) -> Result<()> {
        if value > width.max_value() {
            return Err(Error::invalid(format!(
                "value {value:#x} does not fit a {}-bit register",
                width.bits()
            )));
        }

        let mut frame = [0u8; 4];
        frame[0] = register;
        let len = 1 + width.bytes();
        frame[1..len].copy_from_slice(&value.to_be_bytes()[4 - width.bytes()..]);

        match self.device.write(&frame[..len]) {
            Ok(n) if n == len => {}
            Ok(n) => {
                return Err(Error::Write {
                    register,
                    source: short_transfer(ErrorKind::WriteZero, n, len),
                })
            }
            Err(source) => return Err(Error::Write { register, source }),
        }

        debug!("write reg {register:#04x} <- {value:#0w$x}", w = width.bytes() * 2 + 2);
        Ok(())
    }

    pub fn read_reg8(&mut self, register: u8) -> Result<u8> {
        self.read_register(register, RegisterWidth::Byte).map(|v| v as u8)
    }

    pub fn read_reg16(&mut self, register: u8) -> Result<u16> {
        self.read_register(register, RegisterWidth::Word).map(|v| v as u16)
    }

    pub fn read_reg24(&mut self, register: u8) -> Result<u32> {
        self.read_register(register, RegisterWidth::Triple)
    }

    pub fn write_reg8(&mut self, register: u8, value: u8) -> Result<()> {
        self.write_register(register, value.into(), RegisterWidth::Byte)
    }

    pub fn write_reg16(&mut self, register: u8, value: u16) -> Result<()> {
        self.write_register(register, value.into(), RegisterWidth::Word)
    }

    pub fn write_reg24(&mut self, register: u8, value: u32) -> Result<()> {
        self.write_register(register, value, RegisterWidth::Triple)
    }
}
