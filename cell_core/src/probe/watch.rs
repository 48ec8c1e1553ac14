//! Request/timeout arbitration for the single in-flight probe request.
//!
//! Each request is armed once. Whichever of the answer path (`resolve`) or the
//! timeout watcher (`fire`) gets there first wins; the other becomes a no-op.
//! The watcher also carries the generation it captured when the request was
//! armed: once the request completes the generation moves on, so a late
//! watcher from an earlier request can never time out a newer one.

use std::sync::Mutex;

#[derive(Debug, Default)]
struct WatchState {
    generation: u64,
    pending: bool,
}

#[derive(Debug, Default)]
pub struct TimeoutWatch {
    state: Mutex<WatchState>,
}

impl TimeoutWatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a request outstanding and return the generation a watcher must capture.
    pub fn arm(&self) -> u64 {
        self.with(|s| {
            s.pending = true;
            s.generation
        })
    }

    /// Claim the outstanding request for an answer. False if nothing is pending.
    pub fn resolve(&self) -> bool {
        self.with(|s| std::mem::replace(&mut s.pending, false))
    }

    /// Claim the outstanding request for a timeout. Only succeeds while the
    /// request is still pending and the generation is the captured one.
    pub fn fire(&self, captured: u64) -> bool {
        self.with(|s| {
            if s.pending && s.generation == captured {
                s.pending = false;
                true
            } else {
                false
            }
        })
    }

    /// Request finished (either way): advance the generation.
    pub fn complete(&self) {
        self.with(|s| {
            s.pending = false;
            s.generation = s.generation.wrapping_add(1);
        });
    }

    pub fn generation(&self) -> u64 {
        self.with(|s| s.generation)
    }

    pub fn is_pending(&self) -> bool {
        self.with(|s| s.pending)
    }

    fn with<R>(&self, f: impl FnOnce(&mut WatchState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watcher_before_answer_times_out() {
        let w = TimeoutWatch::new();
        let g = w.arm();
        assert!(w.fire(g));
        assert!(!w.resolve());
    }

    #[test]
    fn answer_before_watcher_wins() {
        let w = TimeoutWatch::new();
        let g = w.arm();
        assert!(w.resolve());
        w.complete();
        assert!(!w.fire(g));
    }

    #[test]
    fn stale_watcher_cannot_hit_newer_request() {
        let w = TimeoutWatch::new();
        let old = w.arm();
        assert!(w.resolve());
        w.complete();
        let new = w.arm();
        assert_ne!(old, new);
        assert!(!w.fire(old));
        assert!(w.is_pending());
        assert!(w.fire(new));
    }

    #[test]
    fn unsolicited_answer_is_refused() {
        let w = TimeoutWatch::new();
        assert!(!w.resolve());
    }
}
