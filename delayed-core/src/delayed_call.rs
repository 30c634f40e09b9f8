//! The capability set shared by every delayed-call handle.

use std::time::Duration;

use chrono::TimeDelta;

use crate::{Callback, ScheduleError};

/// A handle that runs one callback once after a delay.
///
/// ```text
/// unarmed --schedule--> armed --delay elapses--> fired
/// armed   --cancel----> unarmed
/// fired   --schedule--> armed
/// ```
///
/// Every scheduling operation first stops the pending firing, then validates,
/// then arms a fresh one. A failed schedule leaves the stored delay and
/// callback untouched and nothing armed.
pub trait DelayedCall: Send + Sync {
    /// Arms the handle with its stored delay and callback.
    fn call(&self) -> Result<(), ScheduleError>;

    /// Stops the pending firing. Returns `false` when nothing was pending or the
    /// callback already started.
    fn cancel(&self) -> bool;

    /// Replaces delay and callback, then re-arms.
    fn reset(&self, delay: TimeDelta, callback: Option<Callback>) -> Result<(), ScheduleError>;

    /// `reset(delay, current callback)`.
    fn reset_delay(&self, delay: TimeDelta) -> Result<(), ScheduleError>;

    /// `reset(current delay, callback)`.
    fn reset_func(&self, callback: Option<Callback>) -> Result<(), ScheduleError>;
}

/// Checks a delay/callback pair and returns what is needed to arm it.
pub(crate) fn validate(
    delay: TimeDelta,
    callback: Option<&Callback>,
) -> Result<(Duration, Callback), ScheduleError> {
    let wait = delay
        .to_std()
        .map_err(|_| ScheduleError::NegativeDelay(delay))?;
    let callback = callback.cloned().ok_or(ScheduleError::MissingCallback)?;
    Ok((wait, callback))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_delay_is_valid() {
        let (wait, _) = validate(TimeDelta::zero(), Some(&Callback::new(|| {}))).unwrap();
        assert_eq!(wait, Duration::ZERO);
    }

    #[test]
    fn missing_callback_is_rejected() {
        assert_eq!(
            validate(TimeDelta::milliseconds(5), None).unwrap_err(),
            ScheduleError::MissingCallback
        );
    }

    proptest! {
        #[test]
        fn negative_delays_are_rejected(ms in i64::MIN / 1_000_000..0i64) {
            let delay = TimeDelta::milliseconds(ms);
            prop_assert_eq!(
                validate(delay, Some(&Callback::new(|| {}))).unwrap_err(),
                ScheduleError::NegativeDelay(delay)
            );
        }

        #[test]
        fn non_negative_delays_convert_exactly(ms in 0i64..10_000_000) {
            let (wait, _) = validate(TimeDelta::milliseconds(ms), Some(&Callback::new(|| {}))).unwrap();
            prop_assert_eq!(wait, Duration::from_millis(ms as u64));
        }
    }
}
