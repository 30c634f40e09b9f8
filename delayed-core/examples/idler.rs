//! Debounced idle/unidle requests: every request re-arms the same handle, so only
//! the last one issued within the delay takes effect.
//!
//! Run with `RUST_LOG=debug cargo run -p delayed-core --example idler`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use delayed_config::DelayedConfig;
use delayed_core::{Callback, DelayedCall, DelayedFn};
use delayed_telemetry::EventLogger;
use parking_lot::Mutex;
use tokio::time::sleep;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Running,
    Idled,
}

struct Idler {
    status: Arc<Mutex<Status>>,
    unidle_requested: Arc<AtomicBool>,
    delay: TimeDelta,
    timer: DelayedFn,
}

impl Idler {
    fn idle(&self) -> anyhow::Result<()> {
        if self.unidle_requested.load(Ordering::Acquire) {
            info!("ignoring idle request since unidle has been requested earlier");
            return Ok(());
        }

        info!("going to delayed idle");
        let status = Arc::clone(&self.status);
        self.timer.reset(
            self.delay,
            Some(Callback::new(move || {
                if *status.lock() == Status::Idled {
                    info!("no need to idle since it is already idled");
                    return;
                }
                info!("idling ... start");
                std::thread::sleep(Duration::from_millis(500));
                *status.lock() = Status::Idled;
                info!("idling ... done");
            })),
        )?;
        Ok(())
    }

    fn unidle(&self) -> anyhow::Result<()> {
        if self.unidle_requested.swap(true, Ordering::AcqRel) {
            info!("already scheduled to unidle, ignoring this call");
            return Ok(());
        }

        info!("going to delayed unidle");
        let status = Arc::clone(&self.status);
        let requested = Arc::clone(&self.unidle_requested);
        self.timer.reset(
            self.delay,
            Some(Callback::new(move || {
                let mut status = status.lock();
                if *status == Status::Running {
                    info!("no need to unidle since it is already running");
                } else {
                    info!("unidling");
                    *status = Status::Running;
                }
                requested.store(false, Ordering::Release);
            })),
        )?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = DelayedConfig::load()?;
    EventLogger::try_init(&config.telemetry)?;

    let idler = Idler {
        status: Arc::new(Mutex::new(Status::Running)),
        unidle_requested: Arc::new(AtomicBool::new(false)),
        delay: config.timer.delay(),
        timer: DelayedFn::from_config(&config.timer, None),
    };
    let settle = Duration::from_millis(200);

    idler.idle()?;
    sleep(settle).await;
    idler.idle()?;
    sleep(settle).await;
    idler.unidle()?;
    sleep(settle).await;
    idler.idle()?;
    sleep(settle).await;
    idler.unidle()?;

    let delay = config.timer.delay().to_std()?;
    sleep(delay + Duration::from_secs(1)).await;
    idler.idle()?;
    sleep(delay + Duration::from_secs(1)).await;

    info!(status = ?*idler.status.lock(), "done");
    Ok(())
}
