use std::io;
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};

/// Moves the calling thread to round-robin real-time scheduling.
///
/// `priority` is clamped to the highest level `SCHED_RR` allows. Usually
/// needs root or `CAP_SYS_NICE`.
pub fn set_high_priority(priority: i32) -> Result<()> {
    // SAFETY: plain libc queries with no pointers involved.
    let max = unsafe { libc::sched_get_priority_max(libc::SCHED_RR) };
    if max < 0 {
        return Err(Error::Scheduler(io::Error::last_os_error()));
    }

    // SAFETY: sched_param is plain old data; all-zero is a valid value.
    let mut param: libc::sched_param = unsafe { std::mem::zeroed() };
    param.sched_priority = priority.min(max);

    // SAFETY: `param` outlives the call.
    if unsafe { libc::sched_setscheduler(0, libc::SCHED_RR, &param) } != 0 {
        return Err(Error::Scheduler(io::Error::last_os_error()));
    }
    Ok(())
}

/// Runs `f` on a new named thread that nobody joins.
pub fn spawn_detached<F>(name: &str, f: F) -> Result<()>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .map(drop)
        .map_err(Error::Spawn)
}

pub fn sleep_ms(ms: u64) {
    thread::sleep(Duration::from_millis(ms));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn detached_thread_runs() {
        let (tx, rx) = crossbeam_channel::bounded(1);

        spawn_detached("megaio-test", move || {
            let name = thread::current().name().map(str::to_string);
            tx.send(name).unwrap();
        })
        .unwrap();

        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("megaio-test"));
    }

    #[test]
    fn sleep_blocks_for_at_least_the_duration() {
        let start = Instant::now();
        sleep_ms(20);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
