//! ## delayed-core::virtual_time
//! **Delayed call driven by an injected [`Clock`]**
//!
//! Arming registers a wait on the clock, then parks a waiter thread in a select
//! over "clock reached the deadline" and "cancellation received". Cancellation
//! travels over a zero-capacity channel with a non-blocking send: it lands only
//! if a waiter is parked on the other side at that instant.
//!
//! # Cancellation race
//! `cancel() == false` means "no guarantee the callback was prevented". It is
//! returned both when the callback already fired and when the signal missed a
//! waiter that had not parked yet; the two are indistinguishable. A `reset`
//! whose cancel missed leaves the old waiter live, so both callbacks may run.
//! Arming waits for the waiter to start and then for the settle period, which
//! keeps the window narrow but does not close it.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use crossbeam::channel::{self, Receiver, Sender};
use delayed_config::VirtualTimeConfig;
use delayed_telemetry::TimerMetrics;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::delayed_call::{validate, DelayedCall};
use crate::time::{Clock, VirtualClock};
use crate::{Callback, ScheduleError};

const DEFAULT_SETTLE: Duration = Duration::from_millis(10);

/// Delayed call whose delay elapses on `C` instead of the wall clock.
///
/// Dropping the handle releases its waiters without running their callbacks.
pub struct VirtualDelayedFn<C: Clock = VirtualClock> {
    clock: C,
    state: Mutex<VirtualState>,
    cancel_tx: Sender<()>,
    cancel_rx: Receiver<()>,
    settle: Duration,
    component: Arc<str>,
    metrics: Option<TimerMetrics>,
}

struct VirtualState {
    delay: TimeDelta,
    callback: Option<Callback>,
}

impl VirtualDelayedFn {
    /// Unarmed handle on a fresh virtual clock starting at zero.
    pub fn new(delay: TimeDelta, callback: Option<Callback>) -> Self {
        Self::with_clock(VirtualClock::default(), delay, callback)
    }

    /// Creates a handle on a fresh virtual clock and arms it.
    pub fn schedule(delay: TimeDelta, callback: Callback) -> Result<Self, ScheduleError> {
        let handle = Self::new(delay, Some(callback));
        handle.call()?;
        Ok(handle)
    }

    pub fn from_config(
        config: &VirtualTimeConfig,
        delay: TimeDelta,
        callback: Option<Callback>,
    ) -> Self {
        Self::with_clock(VirtualClock::new(config.seed_ns), delay, callback)
            .with_settle(config.settle())
    }
}

impl<C: Clock> VirtualDelayedFn<C> {
    pub fn with_clock(clock: C, delay: TimeDelta, callback: Option<Callback>) -> Self {
        let (cancel_tx, cancel_rx) = channel::bounded(0);
        Self {
            clock,
            state: Mutex::new(VirtualState { delay, callback }),
            cancel_tx,
            cancel_rx,
            settle: DEFAULT_SETTLE,
            component: Arc::from("delayed"),
            metrics: None,
        }
    }

    /// How long arming pauses after the waiter reports it started.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_component(mut self, component: impl Into<Arc<str>>) -> Self {
        self.component = component.into();
        self
    }

    pub fn with_metrics(mut self, metrics: TimerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn delay(&self) -> TimeDelta {
        self.state.lock().delay
    }

    fn signal_cancel(&self) -> bool {
        let delivered = self.cancel_tx.try_send(()).is_ok();
        if delivered {
            trace!(component = %self.component, "cancel delivered to waiter");
            if let Some(metrics) = &self.metrics {
                metrics.cancelled.inc();
            }
        }
        delivered
    }

    fn rearm(
        &self,
        state: &mut VirtualState,
        delay: TimeDelta,
        callback: Option<Callback>,
    ) -> Result<(), ScheduleError> {
        self.signal_cancel();
        let (wait, armed) = self.checked(delay, callback.as_ref())?;
        state.delay = delay;
        state.callback = callback;
        self.arm(wait, armed);
        Ok(())
    }

    fn checked(
        &self,
        delay: TimeDelta,
        callback: Option<&Callback>,
    ) -> Result<(Duration, Callback), ScheduleError> {
        validate(delay, callback).inspect_err(|err| {
            warn!(component = %self.component, %err, "rejected schedule");
            if let Some(metrics) = &self.metrics {
                metrics.rejected.inc();
            }
        })
    }

    fn arm(&self, wait: Duration, callback: Callback) {
        // Registered here, before the waiter exists, so an `advance` issued
        // right after arming is never lost.
        let fired = self.clock.after(wait);
        let cancelled = self.cancel_rx.clone();
        let (ready_tx, ready_rx) = channel::bounded::<()>(1);
        let component = Arc::clone(&self.component);
        let metrics = self.metrics.clone();

        debug!(component = %self.component, ?wait, "waiting to run callback");
        std::thread::spawn(move || {
            let _ = ready_tx.send(());
            crossbeam::select! {
                recv(fired.receiver()) -> tick => {
                    if tick.is_err() {
                        trace!(component = %component, "clock dropped, waiter exiting");
                        return;
                    }
                    trace!(component = %component, "virtual delay elapsed, running callback");
                    if let Some(metrics) = &metrics {
                        metrics.fired.inc();
                    }
                    if panic::catch_unwind(AssertUnwindSafe(|| callback.invoke())).is_err() {
                        warn!(component = %component, "callback panicked");
                    }
                }
                recv(cancelled) -> _ => {
                    trace!(component = %component, "waiter cancelled");
                }
            }
        });

        let _ = ready_rx.recv();
        if !self.settle.is_zero() {
            std::thread::sleep(self.settle);
        }
        if let Some(metrics) = &self.metrics {
            metrics.armed.inc();
        }
    }
}

impl<C: Clock> DelayedCall for VirtualDelayedFn<C> {
    fn call(&self) -> Result<(), ScheduleError> {
        let state = self.state.lock();
        let (wait, callback) = self.checked(state.delay, state.callback.as_ref())?;
        self.signal_cancel();
        self.arm(wait, callback);
        Ok(())
    }

    /// Best effort: see the module docs for what `false` does not tell you.
    fn cancel(&self) -> bool {
        let _state = self.state.lock();
        self.signal_cancel()
    }

    fn reset(&self, delay: TimeDelta, callback: Option<Callback>) -> Result<(), ScheduleError> {
        let mut state = self.state.lock();
        self.rearm(&mut state, delay, callback)
    }

    fn reset_delay(&self, delay: TimeDelta) -> Result<(), ScheduleError> {
        let mut state = self.state.lock();
        let callback = state.callback.clone();
        self.rearm(&mut state, delay, callback)
    }

    fn reset_func(&self, callback: Option<Callback>) -> Result<(), ScheduleError> {
        let mut state = self.state.lock();
        let delay = state.delay;
        self.rearm(&mut state, delay, callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Spy;
    use crate::time::SystemClock;

    const WAIT: Duration = Duration::from_secs(2);

    fn ms(n: i64) -> TimeDelta {
        TimeDelta::milliseconds(n)
    }

    fn advance(handle: &VirtualDelayedFn, n: u64) {
        handle.clock().advance(Duration::from_millis(n));
    }

    #[test]
    fn usable_through_the_trait() {
        let (spy, observed) = Spy::synced();
        let handle = VirtualDelayedFn::new(ms(2000), Some(spy.hook(1)));

        let call: &dyn DelayedCall = &handle;
        call.call().unwrap();
        advance(&handle, 2000);

        let first = observed.recv_timeout(WAIT).unwrap();
        assert_eq!(first.called, 1);
        assert_eq!(first.version, 1);
    }

    #[test]
    fn does_not_fire_before_deadline() {
        let (spy, observed) = Spy::synced();
        let handle = VirtualDelayedFn::schedule(ms(2000), spy.hook(1)).unwrap();

        advance(&handle, 1999);
        assert!(observed.recv_timeout(Duration::from_millis(50)).is_err());
        advance(&handle, 1);
        assert_eq!(observed.recv_timeout(WAIT).unwrap().version, 1);
    }

    #[test]
    fn cancel_before_deadline() {
        let (spy, observed) = Spy::synced();
        let handle = VirtualDelayedFn::schedule(ms(2000), spy.hook(1)).unwrap();

        advance(&handle, 1000);
        assert!(handle.cancel(), "must not have run");
        assert_eq!(spy.called(), 0);
        assert_eq!(spy.last(), None);

        advance(&handle, 5000);
        assert!(observed.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn reset_replaces_pending_call() {
        let (spy, observed) = Spy::synced();
        let handle = VirtualDelayedFn::schedule(ms(2000), spy.hook(1)).unwrap();

        advance(&handle, 1000);
        handle.reset(ms(1000), Some(spy.hook(2))).unwrap();
        advance(&handle, 1000);

        let first = observed.recv_timeout(WAIT).unwrap();
        assert!(!handle.cancel(), "already fired");
        assert_eq!(first.called, 1);
        assert_eq!(first.version, 2);
    }

    #[test]
    fn reset_func_restarts_with_stored_delay() {
        let (spy, observed) = Spy::synced();
        let handle = VirtualDelayedFn::schedule(ms(2000), spy.hook(1)).unwrap();

        advance(&handle, 1000);
        handle.reset_func(Some(spy.hook(2))).unwrap();
        advance(&handle, 1000);
        assert!(observed.recv_timeout(Duration::from_millis(50)).is_err());
        advance(&handle, 1000);

        let first = observed.recv_timeout(WAIT).unwrap();
        assert!(!handle.cancel());
        assert_eq!(first.called, 1);
        assert_eq!(first.version, 2);
    }

    #[test]
    fn reset_delay_keeps_callback() {
        let (spy, observed) = Spy::synced();
        let handle = VirtualDelayedFn::schedule(ms(8000), spy.hook(1)).unwrap();

        advance(&handle, 1000);
        handle.reset_delay(ms(100)).unwrap();
        assert_eq!(handle.delay(), ms(100));
        advance(&handle, 2000);

        let first = observed.recv_timeout(WAIT).unwrap();
        assert!(!handle.cancel());
        assert_eq!(first.called, 1);
        assert_eq!(first.version, 1);
    }

    #[test]
    fn cancel_on_unarmed_handle_is_noop() {
        let handle = VirtualDelayedFn::new(ms(10), None);
        assert!(!handle.cancel());
        assert!(!handle.cancel());
    }

    #[test]
    fn invalid_schedules_never_arm() {
        let spy = Spy::default();
        let handle = VirtualDelayedFn::new(ms(-1), Some(spy.hook(1)));

        assert_eq!(handle.call().unwrap_err(), ScheduleError::NegativeDelay(ms(-1)));
        assert_eq!(
            handle.reset(ms(10), None).unwrap_err(),
            ScheduleError::MissingCallback
        );
        assert_eq!(handle.clock().pending_waits(), 0);
        assert!(!handle.cancel());

        // The failed reset did not overwrite the stored pair.
        assert_eq!(handle.delay(), ms(-1));
        assert!(handle.reset_delay(ms(0)).is_ok());
    }

    #[test]
    fn cancelled_waits_leave_the_clock() {
        let spy = Spy::default();
        let handle = VirtualDelayedFn::new(ms(60_000), Some(spy.hook(1)));

        for _ in 0..5 {
            handle.call().unwrap();
            assert!(handle.cancel());
        }
        handle.call().unwrap();
        handle.reset_delay(ms(30_000)).unwrap();
        assert!(handle.cancel());

        let deadline = std::time::Instant::now() + WAIT;
        while handle.clock().pending_waits() > 0 {
            assert!(std::time::Instant::now() < deadline, "cancelled waits still registered");
            std::thread::yield_now();
        }
        assert_eq!(spy.called(), 0);
    }

    #[test]
    fn zero_delay_fires_without_advancing() {
        let (spy, observed) = Spy::synced();
        let _handle = VirtualDelayedFn::schedule(TimeDelta::zero(), spy.hook(4)).unwrap();
        assert_eq!(observed.recv_timeout(WAIT).unwrap().version, 4);
    }

    #[test]
    fn handles_share_an_injected_clock() {
        let clock = VirtualClock::new(0);
        let (spy, observed) = Spy::synced();
        let short = VirtualDelayedFn::with_clock(clock.clone(), ms(100), Some(spy.hook(1)));
        let long = VirtualDelayedFn::with_clock(clock.clone(), ms(300), Some(spy.hook(2)));
        short.call().unwrap();
        long.call().unwrap();
        assert_eq!(clock.pending_waits(), 2);

        clock.advance(Duration::from_millis(150));
        assert_eq!(observed.recv_timeout(WAIT).unwrap().version, 1);
        assert!(long.cancel());
        clock.advance(Duration::from_millis(500));
        assert!(observed.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn panicking_callback_keeps_handle_usable() {
        let (spy, observed) = Spy::synced();
        let handle = VirtualDelayedFn::schedule(ms(10), Callback::new(|| panic!("boom"))).unwrap();
        advance(&handle, 10);

        handle.reset_func(Some(spy.hook(2))).unwrap();
        advance(&handle, 10);
        assert_eq!(observed.recv_timeout(WAIT).unwrap().version, 2);
    }

    #[test]
    fn runs_on_system_clock() {
        let (spy, observed) = Spy::synced();
        let handle = VirtualDelayedFn::with_clock(SystemClock, ms(20), Some(spy.hook(1)));
        handle.call().unwrap();
        assert_eq!(observed.recv_timeout(WAIT).unwrap().called, 1);
    }

    #[test]
    fn metrics_and_config() {
        let metrics = TimerMetrics::new().unwrap();
        let config = VirtualTimeConfig {
            seed_ns: 5,
            settle_ms: 5,
        };
        let (spy, observed) = Spy::synced();
        let handle = VirtualDelayedFn::from_config(&config, ms(50), Some(spy.hook(1)))
            .with_component("virtual")
            .with_metrics(metrics.clone());
        assert_eq!(handle.clock().now_ns(), 5);

        handle.call().unwrap();
        assert!(handle.cancel());
        assert!(handle.reset_delay(ms(-1)).is_err());
        handle.reset_delay(ms(20)).unwrap();
        advance(&handle, 20);
        observed.recv_timeout(WAIT).unwrap();

        assert_eq!(metrics.armed.get(), 2);
        assert_eq!(metrics.cancelled.get(), 1);
        assert_eq!(metrics.rejected.get(), 1);
        assert_eq!(metrics.fired.get(), 1);
    }
}
