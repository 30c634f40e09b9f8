//! ## delayed-core::time
//! **Clock capability for virtual-time handles**
//!
//! - `SystemClock`: wall-clock waits backed by `crossbeam::channel::after`
//! - `VirtualClock`: seedable nanosecond counter, moved only by `advance`
//!
//! A [`ClockWait`] obtained from [`Clock::after`] is a one-shot channel that
//! yields the clock reading once its deadline is reached. Dropping it withdraws
//! the registration.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvError, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;

pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;

    /// One-shot wait resolving once `delay` has passed on this clock.
    fn after(&self, delay: Duration) -> ClockWait;
}

/// Pending wait on a [`Clock`]. Use [`ClockWait::receiver`] inside `select!`.
pub struct ClockWait {
    fired: Receiver<Instant>,
    _alive: Arc<()>,
}

impl ClockWait {
    fn new(fired: Receiver<Instant>) -> Self {
        Self {
            fired,
            _alive: Arc::new(()),
        }
    }

    fn token(&self) -> Weak<()> {
        Arc::downgrade(&self._alive)
    }

    pub fn receiver(&self) -> &Receiver<Instant> {
        &self.fired
    }

    pub fn recv(&self) -> Result<Instant, RecvError> {
        self.fired.recv()
    }

    pub fn try_recv(&self) -> Result<Instant, TryRecvError> {
        self.fired.try_recv()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<Instant, RecvTimeoutError> {
        self.fired.recv_timeout(timeout)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn after(&self, delay: Duration) -> ClockWait {
        ClockWait::new(channel::after(delay))
    }
}

/// A manually advanced clock. Clones share the same time and pending waits.
#[derive(Clone)]
pub struct VirtualClock {
    inner: Arc<ClockInner>,
}

struct ClockInner {
    epoch: Instant,
    offset: AtomicU64, // Nanoseconds
    // Sorted by deadline; the lock also orders `advance` against `after`.
    waits: Mutex<Vec<PendingWait>>,
}

struct PendingWait {
    deadline_ns: u64,
    notify: Sender<Instant>,
    alive: Weak<()>,
}

impl PendingWait {
    fn withdrawn(&self) -> bool {
        self.alive.strong_count() == 0
    }
}

impl VirtualClock {
    /// Creates a new virtual clock with the given seed (starting offset).
    pub fn new(seed: u64) -> Self {
        Self {
            inner: Arc::new(ClockInner {
                epoch: Instant::now(),
                offset: AtomicU64::new(seed),
                waits: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Returns the current virtual time in nanoseconds.
    #[inline]
    pub fn now_ns(&self) -> u64 {
        self.inner.offset.load(Ordering::Acquire)
    }

    /// Advances the clock and releases every wait whose deadline was reached,
    /// earliest first.
    pub fn advance(&self, by: Duration) {
        self.advance_ns(duration_ns(by));
    }

    pub fn advance_ns(&self, ns: u64) {
        let (now_ns, due) = {
            let mut waits = self.inner.waits.lock();
            let (Ok(before) | Err(before)) = self.inner.offset.fetch_update(
                Ordering::AcqRel,
                Ordering::Acquire,
                |t| Some(t.saturating_add(ns)),
            );
            let now_ns = before.saturating_add(ns);
            let reached = waits.partition_point(|w| w.deadline_ns <= now_ns);
            (now_ns, waits.drain(..reached).collect::<Vec<_>>())
        };

        let at = self.instant_at(now_ns);
        for wait in due {
            // The waiter may have given up; nobody left to tell.
            let _ = wait.notify.try_send(at);
        }
    }

    /// Number of registered waits that have been neither released nor dropped.
    pub fn pending_waits(&self) -> usize {
        let mut waits = self.inner.waits.lock();
        waits.retain(|w| !w.withdrawn());
        waits.len()
    }

    /// Yields until at least `n` waits are registered.
    pub fn block_until(&self, n: usize) {
        while self.pending_waits() < n {
            std::thread::yield_now();
        }
    }

    fn instant_at(&self, ns: u64) -> Instant {
        let epoch = self.inner.epoch;
        epoch.checked_add(Duration::from_nanos(ns)).unwrap_or(epoch)
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Instant {
        self.instant_at(self.now_ns())
    }

    fn after(&self, delay: Duration) -> ClockWait {
        let (notify, fired) = channel::bounded(1);
        let wait = ClockWait::new(fired);
        let mut waits = self.inner.waits.lock();
        waits.retain(|w| !w.withdrawn());
        let now_ns = self.now_ns();
        let deadline_ns = now_ns.saturating_add(duration_ns(delay));

        if deadline_ns <= now_ns {
            let _ = notify.try_send(self.instant_at(now_ns));
        } else {
            let at = waits.partition_point(|w| w.deadline_ns <= deadline_ns);
            waits.insert(
                at,
                PendingWait {
                    deadline_ns,
                    notify,
                    alive: wait.token(),
                },
            );
        }
        wait
    }
}

fn duration_ns(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
