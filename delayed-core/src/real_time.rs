//! ## delayed-core::real_time
//! **Delayed call armed on tokio's timer**
//!
//! Each arm spawns one sleeping task that owns a `pending` flag. When the sleep
//! ends the task claims the flag and hands the callback to the blocking pool;
//! `cancel` claims the same flag. Whoever swaps it first wins, so `cancel`
//! returns `true` exactly when the callback has not started and never will.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use delayed_config::TimerConfig;
use delayed_telemetry::TimerMetrics;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::{spawn_blocking, JoinHandle};
use tracing::{debug, trace, warn};

use crate::delayed_call::{validate, DelayedCall};
use crate::{Callback, ScheduleError};

/// Delayed call driven by real time.
///
/// Timers are spawned on the runtime current when arming, else on the runtime
/// given to [`DelayedFn::with_runtime`].
/// Dropping the handle does not stop a pending firing.
pub struct DelayedFn {
    state: Mutex<State>,
    runtime: Option<Handle>,
    component: Arc<str>,
    metrics: Option<TimerMetrics>,
}

struct State {
    delay: TimeDelta,
    callback: Option<Callback>,
    timer: Option<Timer>,
}

struct Timer {
    pending: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl Timer {
    fn stop(self) -> bool {
        let stopped = self.pending.swap(false, Ordering::AcqRel);
        if stopped {
            self.task.abort();
        }
        stopped
    }
}

impl DelayedFn {
    /// Creates an unarmed handle. Any delay/callback is accepted here and only
    /// checked when scheduling.
    pub fn new(delay: TimeDelta, callback: Option<Callback>) -> Self {
        Self {
            state: Mutex::new(State {
                delay,
                callback,
                timer: None,
            }),
            runtime: None,
            component: Arc::from("delayed"),
            metrics: None,
        }
    }

    /// Creates a handle and arms it immediately.
    pub fn schedule(delay: TimeDelta, callback: Callback) -> Result<Self, ScheduleError> {
        let handle = Self::new(delay, Some(callback));
        handle.call()?;
        Ok(handle)
    }

    pub fn from_config(config: &TimerConfig, callback: Option<Callback>) -> Self {
        Self::new(config.delay(), callback).with_component(config.component.as_str())
    }

    /// Runtime used when arming from outside any tokio context.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Label carried by every log event of this handle.
    pub fn with_component(mut self, component: impl Into<Arc<str>>) -> Self {
        self.component = component.into();
        self
    }

    pub fn with_metrics(mut self, metrics: TimerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn delay(&self) -> TimeDelta {
        self.state.lock().delay
    }

    /// True while a firing is armed and has not started.
    pub fn is_pending(&self) -> bool {
        self.state
            .lock()
            .timer
            .as_ref()
            .is_some_and(|timer| timer.pending.load(Ordering::Acquire))
    }

    fn stop_timer(&self, state: &mut State) -> bool {
        let stopped = state.timer.take().is_some_and(Timer::stop);
        if stopped {
            trace!(component = %self.component, "cancelled pending call");
            if let Some(metrics) = &self.metrics {
                metrics.cancelled.inc();
            }
        }
        stopped
    }

    /// Stops the pending timer, then validates and arms `(delay, callback)`.
    /// State is only written once the new timer exists.
    fn rearm(
        &self,
        state: &mut State,
        delay: TimeDelta,
        callback: Option<Callback>,
    ) -> Result<(), ScheduleError> {
        self.stop_timer(state);
        let (wait, armed) = self.checked(delay, callback.as_ref())?;
        state.timer = Some(self.arm(wait, armed)?);
        state.delay = delay;
        state.callback = callback;
        debug!(component = %self.component, %delay, "scheduled to run after delay");
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

    fn arm(&self, wait: Duration, callback: Callback) -> Result<Timer, ScheduleError> {
        let runtime = match Handle::try_current() {
            Ok(current) => current,
            Err(_) => self.runtime.clone().ok_or(ScheduleError::NoRuntime)?,
        };

        let pending = Arc::new(AtomicBool::new(true));
        let claim = Arc::clone(&pending);
        let component = Arc::clone(&self.component);
        let metrics = self.metrics.clone();

        let task = runtime.spawn(async move {
            tokio::time::sleep(wait).await;
            if !claim.swap(false, Ordering::AcqRel) {
                return;
            }
            trace!(component = %component, "delay elapsed, running callback");
            if let Some(metrics) = &metrics {
                metrics.fired.inc();
            }
            if let Err(err) = spawn_blocking(move || callback.invoke()).await {
                warn!(component = %component, %err, "callback did not complete");
            }
        });

        if let Some(metrics) = &self.metrics {
            metrics.armed.inc();
        }
        Ok(Timer { pending, task })
    }
}

impl Default for DelayedFn {
    fn default() -> Self {
        Self::new(TimeDelta::zero(), None)
    }
}

impl DelayedCall for DelayedFn {
    fn call(&self) -> Result<(), ScheduleError> {
        let mut state = self.state.lock();
        let (wait, callback) = self.checked(state.delay, state.callback.as_ref())?;
        self.stop_timer(&mut state);
        state.timer = Some(self.arm(wait, callback)?);
        debug!(component = %self.component, delay = %state.delay, "scheduled to run after delay");
        Ok(())
    }

    fn cancel(&self) -> bool {
        let mut state = self.state.lock();
        self.stop_timer(&mut state)
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
