//! # delayed-core
//!
//! Mutable delayed-call handles: schedule a callback once after a delay, then
//! reset it (new delay and/or callback, timer restarted) or cancel it before it fires.
//!
//! ### Key Submodules:
//! - `real_time`: [`DelayedFn`], armed on tokio's timer
//! - `virtual_time`: [`VirtualDelayedFn`], armed on an injected [`Clock`]
//! - `time`: `Clock` capability, `SystemClock` and the manually advanced `VirtualClock`
//!
//! Both handles implement [`DelayedCall`]. Control operations on one handle are
//! serialised; callbacks run outside that lock on their own thread, so a slow
//! callback never blocks a `reset` or `cancel`, and nothing stops an old callback
//! that already started from overlapping with a newly armed one.

pub mod callback;
pub mod delayed_call;
pub mod error;
pub mod real_time;
pub mod time;
pub mod virtual_time;

#[cfg(test)]
mod test_support;

pub mod prelude {
    pub use crate::callback::*;
    pub use crate::delayed_call::*;
    pub use crate::error::*;
    pub use crate::real_time::*;
    pub use crate::time::*;
    pub use crate::virtual_time::*;
}

pub use callback::Callback;
pub use delayed_call::DelayedCall;
pub use error::ScheduleError;
pub use real_time::DelayedFn;
pub use time::{Clock, SystemClock, VirtualClock};
pub use virtual_time::VirtualDelayedFn;
