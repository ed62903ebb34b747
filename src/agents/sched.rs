//! The single cooperative timer queue that simulated latency runs on.

use std::{
    collections::BTreeMap,
    mem,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

#[cfg(test)]
use mock_instant::Instant;
#[cfg(not(test))]
use std::time::Instant;

use tracing::trace;

type Callback = Box<dyn FnOnce() + Send>;

/// Identifies one scheduled callback, for [`Scheduler::clear`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId {
    at: Instant,
    seq: u64,
}

#[derive(Default)]
struct Queue {
    timers: BTreeMap<TimerId, Callback>,
    next_seq: u64,
}

/// Deferred callbacks, fired in deadline order (ties in the order they were scheduled) whenever the owner calls
/// [`Self::run_due`]. Nothing runs on its own; there are no threads behind this.
///
/// Clones share the same queue.
#[derive(Clone, Default)]
pub struct Scheduler(Arc<Mutex<Queue>>);

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self) -> MutexGuard<'_, Queue> {
        // a panicking callback never holds the lock, so the queue is still consistent
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn schedule(&self, delay: Duration, f: impl FnOnce() + Send + 'static) -> TimerId {
        let mut q = self.queue();
        let id = TimerId {
            at: Instant::now() + delay,
            seq: q.next_seq,
        };
        q.next_seq += 1;
        q.timers.insert(id, Box::new(f));
        trace!(seq = id.seq, ?delay, "timer scheduled");
        id
    }

    /// Drop a timer before it fires. Clearing one that already fired (or was already cleared) does nothing.
    pub fn clear(&self, id: TimerId) {
        if self.queue().timers.remove(&id).is_some() {
            trace!(seq = id.seq, "timer cleared");
        }
    }

    /// Fire every timer whose deadline has passed, including ones scheduled by the callbacks themselves if they're
    /// already due. Returns how many fired.
    pub fn run_due(&self) -> usize {
        let mut fired = 0;
        loop {
            let next = {
                let mut q = self.queue();
                match q.timers.first_key_value() {
                    Some((&id, _)) if id.at <= Instant::now() => q.timers.remove(&id).map(|cb| (id, cb)),
                    _ => None,
                }
            };
            let Some((id, callback)) = next else { break };
            trace!(seq = id.seq, "timer fired");
            callback();
            fired += 1;
        }
        fired
    }

    /// How long until the next timer is due, or `None` if nothing's waiting.
    pub fn next_wakeup(&self) -> Option<Duration> {
        let q = self.queue();
        let (id, _) = q.timers.first_key_value()?;
        let now = Instant::now();
        Some(if id.at > now { id.at - now } else { Duration::ZERO })
    }

    pub fn pending(&self) -> usize {
        self.queue().timers.len()
    }
}

#[derive(Default)]
struct TokenState {
    cancelled: bool,
    pending: Vec<TimerId>,
}

/// A cancellation flag plus the timers registered under it.
///
/// Everything scheduled through the token checks the flag before it runs, so once [`Self::cancel`] returns nothing
/// scheduled through it will do anything, even if it was already queued.
#[derive(Clone)]
pub struct CancelToken {
    sched: Scheduler,
    state: Arc<Mutex<TokenState>>,
}

impl CancelToken {
    pub fn new(sched: &Scheduler) -> Self {
        Self {
            sched: sched.clone(),
            state: Default::default(),
        }
    }

    fn state(&self) -> MutexGuard<'_, TokenState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Schedule `f` to run after `delay` unless this token gets cancelled first. Returns `None` (and schedules
    /// nothing) if it already has been.
    pub fn schedule(&self, delay: Duration, f: impl FnOnce() + Send + 'static) -> Option<TimerId> {
        let mut state = self.state();
        if state.cancelled {
            return None;
        }
        let token = self.clone();
        let id = self.sched.schedule(delay, move || {
            if !token.is_cancelled() {
                f();
            }
        });
        state.pending.push(id);
        Some(id)
    }

    pub fn cancel(&self) {
        let pending = {
            let mut state = self.state();
            state.cancelled = true;
            mem::take(&mut state.pending)
        };
        for id in pending {
            self.sched.clear(id);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state().cancelled
    }
}
