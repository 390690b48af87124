//! Waiting for a yes/no keypress from the operator.
//!
//! The key is read on a background thread so the caller can keep driving the
//! board (blink LEDs, step through a test) and poll or block for the answer.

use std::io::{self, IsTerminal, Read};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, TryRecvError};
use log::warn;
use nix::sys::termios::{self, LocalFlags, SetArg, SpecialCharacterIndices, Termios};

use crate::error::{Error, Result};
use crate::sched;

const READER_PRIORITY: i32 = 10;

/// A pending operator answer.
///
/// Dropping it stops listening; a key typed afterwards is still consumed by
/// the reader thread but the answer is discarded. Once the reader has
/// answered, or failed, every later call reports the same outcome.
pub struct KeyWait {
    rx: Receiver<Result<bool>>,
    outcome: Option<Result<bool>>,
}

impl KeyWait {
    /// Listens on stdin, switching the terminal to single-key input while
    /// waiting.
    pub fn stdin() -> Result<Self> {
        Self::spawn(|| {
            let stdin = io::stdin();
            let _raw = if stdin.is_terminal() {
                Some(RawMode::enter(&stdin)?)
            } else {
                None
            };
            if let Err(e) = sched::set_high_priority(READER_PRIORITY) {
                warn!("key reader keeps normal priority: {e}");
            }
            read_answer(stdin.lock())
        })
    }

    pub fn from_reader<R>(reader: R) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        Self::spawn(move || read_answer(reader))
    }

    fn spawn<F>(read: F) -> Result<Self>
    where
        F: FnOnce() -> Result<bool> + Send + 'static,
    {
        let (tx, rx) = bounded(1);
        sched::spawn_detached("megaio-key", move || {
            let _ = tx.send(read());
        })?;
        Ok(Self { rx, outcome: None })
    }

    /// Returns the answer if the key has been pressed, without blocking.
    pub fn try_answer(&mut self) -> Result<Option<bool>> {
        if self.outcome.is_none() {
            match self.rx.try_recv() {
                Ok(outcome) => self.outcome = Some(outcome),
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Disconnected) => return Err(Error::KeyWaitAborted),
            }
        }
        self.recorded()
    }

    pub fn wait_timeout(&mut self, timeout: Duration) -> Result<Option<bool>> {
        if self.outcome.is_none() {
            match self.rx.recv_timeout(timeout) {
                Ok(outcome) => self.outcome = Some(outcome),
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => return Err(Error::KeyWaitAborted),
            }
        }
        self.recorded()
    }

    pub fn wait(mut self) -> Result<bool> {
        if let Some(outcome) = self.outcome.take() {
            return outcome;
        }
        self.rx.recv().map_err(|_| Error::KeyWaitAborted)?
    }

    fn recorded(&self) -> Result<Option<bool>> {
        match &self.outcome {
            None => Ok(None),
            Some(Ok(answer)) => Ok(Some(*answer)),
            Some(Err(e)) => Err(repeat_error(e)),
        }
    }
}

/// A copy of a reader failure; `io::Error` itself is not `Clone`.
fn repeat_error(err: &Error) -> Error {
    match err {
        Error::KeyRead(e) => Error::KeyRead(io::Error::new(e.kind(), e.to_string())),
        Error::Terminal(errno) => Error::Terminal(*errno),
        _ => Error::KeyWaitAborted,
    }
}

/// Reads one key; `y` or `Y` is a yes, anything else (or end of input) a no.
pub fn read_answer<R: Read>(mut reader: R) -> Result<bool> {
    let mut key = [0u8; 1];
    loop {
        match reader.read(&mut key) {
            Ok(0) => return Ok(false),
            Ok(_) => return Ok(matches!(key[0], b'y' | b'Y')),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::KeyRead(e)),
        }
    }
}

/// Non-canonical input (one key, no line buffering) until dropped.
struct RawMode<'a> {
    stdin: &'a io::Stdin,
    saved: Termios,
}

impl<'a> RawMode<'a> {
    fn enter(stdin: &'a io::Stdin) -> Result<Self> {
        let saved = termios::tcgetattr(stdin).map_err(Error::Terminal)?;
        let mut raw = saved.clone();
        raw.local_flags.remove(LocalFlags::ICANON);
        raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
        raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
        termios::tcsetattr(stdin, SetArg::TCSANOW, &raw).map_err(Error::Terminal)?;
        Ok(Self { stdin, saved })
    }
}

impl Drop for RawMode<'_> {
    fn drop(&mut self) {
        if let Err(e) = termios::tcsetattr(self.stdin, SetArg::TCSANOW, &self.saved) {
            warn!("failed to restore terminal mode: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct Failing;

    impl Read for Failing {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
        }
    }

    /// Blocks until the sender side is dropped or sends bytes.
    struct Gate(Receiver<u8>);

    impl Read for Gate {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.recv() {
                Ok(b) => {
                    buf[0] = b;
                    Ok(1)
                }
                Err(_) => Ok(0),
            }
        }
    }

    #[test]
    fn only_y_means_yes() {
        assert!(read_answer(Cursor::new(b"y")).unwrap());
        assert!(read_answer(Cursor::new(b"Y\n")).unwrap());
        assert!(!read_answer(Cursor::new(b"n")).unwrap());
        assert!(!read_answer(Cursor::new(b"x")).unwrap());
        assert!(!read_answer(Cursor::new(b"")).unwrap());
    }

    #[test]
    fn answer_arrives_through_wait() {
        let wait = KeyWait::from_reader(Cursor::new(b"y".to_vec())).unwrap();
        assert!(wait.wait().unwrap());
    }

    #[test]
    fn poll_is_empty_until_a_key_is_pressed() {
        let (tx, rx) = bounded(1);
        let mut wait = KeyWait::from_reader(Gate(rx)).unwrap();

        assert_eq!(wait.try_answer().unwrap(), None);
        assert_eq!(wait.wait_timeout(Duration::from_millis(10)).unwrap(), None);

        tx.send(b'Y').unwrap();
        assert_eq!(wait.wait_timeout(Duration::from_secs(5)).unwrap(), Some(true));
        assert_eq!(wait.try_answer().unwrap(), Some(true));
        assert!(wait.wait().unwrap());
    }

    #[test]
    fn read_failure_is_reported() {
        let wait = KeyWait::from_reader(Failing).unwrap();
        assert!(matches!(wait.wait(), Err(Error::KeyRead(_))));
    }

    #[test]
    fn read_failure_is_reported_on_every_call() {
        let mut wait = KeyWait::from_reader(Failing).unwrap();

        let first = wait.wait_timeout(Duration::from_secs(5)).unwrap_err();
        assert!(matches!(&first, Error::KeyRead(e) if e.kind() == io::ErrorKind::BrokenPipe));

        let again = wait.try_answer().unwrap_err();
        assert!(matches!(&again, Error::KeyRead(e) if e.kind() == io::ErrorKind::BrokenPipe));
        assert!(matches!(wait.wait(), Err(Error::KeyRead(_))));
    }
}
