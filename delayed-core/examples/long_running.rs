//! A reset does not wait for a callback that is already running: the first and
//! second callbacks overlap unless they share a lock of their own.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use delayed_config::TelemetryConfig;
use delayed_core::{Callback, DelayedCall, DelayedFn};
use delayed_telemetry::EventLogger;
use parking_lot::Mutex;
use tokio::time::sleep;
use tracing::info;

fn counting(
    name: &'static str,
    count: &Arc<AtomicU64>,
    guard: Option<Arc<Mutex<()>>>,
    busy: Duration,
) -> Callback {
    let count = Arc::clone(count);
    Callback::new(move || {
        let _held = guard.as_ref().map(|guard| guard.lock());
        info!(name, "going to execute");
        count.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(busy);
        info!(name, "execute done");
    })
}

async fn run(guard: Option<Arc<Mutex<()>>>) -> anyhow::Result<(u64, u64)> {
    let count = Arc::new(AtomicU64::new(0));
    let handle = DelayedFn::schedule(
        TimeDelta::milliseconds(100),
        counting("first", &count, guard.clone(), Duration::from_millis(500)),
    )?;

    sleep(Duration::from_millis(110)).await;
    info!("going to schedule another");
    handle.reset(
        TimeDelta::milliseconds(100),
        Some(counting("second", &count, guard, Duration::from_millis(200))),
    )?;

    sleep(Duration::from_millis(110)).await;
    let overlapping = count.load(Ordering::SeqCst);

    sleep(Duration::from_millis(800)).await;
    Ok((overlapping, count.load(Ordering::SeqCst)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    EventLogger::try_init(&TelemetryConfig::default())?;

    let (during, after) = run(None).await?;
    println!("not mutex protected thus count is {during}");
    println!("expect calls to be {after}");

    let (during, after) = run(Some(Arc::new(Mutex::new(())))).await?;
    println!("mutex protected thus count is {during}");
    println!("expect calls to be {after}");
    Ok(())
}
