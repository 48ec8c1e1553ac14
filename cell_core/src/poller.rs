//! Periodic background tasks.
//!
//! Each `Poller` owns exactly one thread that runs its tick, then waits one
//! period. Dropping the `Poller` wakes the thread immediately and joins it, so
//! no task outlives its owner. A tick in progress is never interrupted.
use crossbeam_channel as xch;
use std::thread::JoinHandle;
use std::time::Duration;

pub struct Poller {
    name: &'static str,
    /// Dropping the sender wakes the thread out of its wait.
    stop: Option<xch::Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn spawn<F>(name: &'static str, period: Duration, mut tick: F) -> std::io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (stop_tx, stop_rx) = xch::bounded::<()>(0);
        let join_handle = std::thread::Builder::new()
            .name(format!("poll-{name}"))
            .spawn(move || {
                loop {
                    tick();
                    match stop_rx.recv_timeout(period) {
                        Err(xch::RecvTimeoutError::Timeout) => {}
                        _ => break,
                    }
                }
                tracing::trace!(task = name, "poller thread exiting cleanly");
            })?;
        Ok(Self {
            name,
            stop: Some(stop_tx),
            join_handle: Some(join_handle),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        drop(self.stop.take());
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!(task = self.name, "poller thread joined"),
                Err(e) => {
                    // Thread panicked; log but don't propagate (we're in Drop)
                    tracing::warn!(task = self.name, ?e, "poller thread panicked during shutdown");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    #[test]
    fn ticks_until_dropped() {
        let n = Arc::new(AtomicU32::new(0));
        let n2 = n.clone();
        let p = Poller::spawn("test", Duration::from_millis(1), move || {
            n2.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        while n.load(Ordering::Relaxed) < 3 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        drop(p);
        let after = n.load(Ordering::Relaxed);
        assert!(after >= 3);
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(n.load(Ordering::Relaxed), after);
    }

    #[test]
    fn drop_does_not_wait_for_a_long_period() {
        let p = Poller::spawn("slow", Duration::from_secs(60), || {}).unwrap();
        let start = Instant::now();
        drop(p);
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
