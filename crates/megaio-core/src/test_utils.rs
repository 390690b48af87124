use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::transport::Bus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Write(u8, Vec<u8>),
    Read(u8, usize),
}

#[derive(Default)]
struct ChipState {
    registers: HashMap<(u8, u8), Vec<u8>>,
    frames: Vec<Frame>,
    opens: usize,
    fail_open: bool,
    fail_register: Option<u8>,
    read_limit: Option<usize>,
    write_limit: Option<usize>,
}

/// In-memory chips that store whatever register bytes they are given.
#[derive(Clone, Default)]
pub struct MockBus {
    state: Arc<Mutex<ChipState>>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_register(&self, address: u8, register: u8, bytes: &[u8]) {
        self.state
            .lock()
            .registers
            .insert((address, register), bytes.to_vec());
    }

    pub fn register(&self, address: u8, register: u8) -> Option<Vec<u8>> {
        self.state.lock().registers.get(&(address, register)).cloned()
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.state.lock().frames.clone()
    }

    pub fn opens(&self) -> usize {
        self.state.lock().opens
    }

    pub fn fail_open(&self) {
        self.state.lock().fail_open = true;
    }

    /// Any write frame starting with `register` fails with an I/O error.
    pub fn fail_writes_to(&self, register: u8) {
        self.state.lock().fail_register = Some(register);
    }

    pub fn limit_reads(&self, n: usize) {
        self.state.lock().read_limit = Some(n);
    }

    pub fn limit_writes(&self, n: usize) {
        self.state.lock().write_limit = Some(n);
    }
}

impl Bus for MockBus {
    type Device = MockDevice;

    fn open(&self, address: u8) -> Result<MockDevice> {
        let mut state = self.state.lock();
        if state.fail_open {
            return Err(Error::BusOpen {
                path: "/dev/mock-i2c".into(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such bus"),
            });
        }
        state.opens += 1;
        Ok(MockDevice {
            state: self.state.clone(),
            address,
            pointer: 0,
        })
    }
}

pub struct MockDevice {
    state: Arc<Mutex<ChipState>>,
    address: u8,
    pointer: u8,
}

impl Write for MockDevice {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        if state.fail_register.is_some() && buf.first().copied() == state.fail_register {
            return Err(io::Error::new(io::ErrorKind::Other, "nack"));
        }
        let n = state.write_limit.map_or(buf.len(), |limit| buf.len().min(limit));
        state.frames.push(Frame::Write(self.address, buf[..n].to_vec()));
        if let Some((&register, data)) = buf[..n].split_first() {
            self.pointer = register;
            if !data.is_empty() {
                state.registers.insert((self.address, register), data.to_vec());
            }
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for MockDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        let n = state.read_limit.map_or(buf.len(), |limit| buf.len().min(limit));
        let stored = state
            .registers
            .get(&(self.address, self.pointer))
            .cloned()
            .unwrap_or_default();
        for (i, byte) in buf[..n].iter_mut().enumerate() {
            *byte = stored.get(i).copied().unwrap_or(0);
        }
        state.frames.push(Frame::Read(self.address, buf.len()));
        Ok(n)
    }
}
