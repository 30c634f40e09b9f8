//! Spy callbacks that count invocations and remember the last version they ran with.

use std::sync::Arc;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::RwLock;
use tracing::debug;

use crate::Callback;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Observed {
    pub called: usize,
    pub version: u32,
}

#[derive(Default)]
struct SpyState {
    calls: usize,
    last: Option<u32>,
}

#[derive(Clone, Default)]
pub(crate) struct Spy {
    state: Arc<RwLock<SpyState>>,
    notify: Option<Sender<Observed>>,
}

impl Spy {
    /// A spy that also reports every invocation on the returned channel.
    pub fn synced() -> (Self, Receiver<Observed>) {
        let (tx, rx) = channel::unbounded();
        let spy = Self {
            notify: Some(tx),
            ..Default::default()
        };
        (spy, rx)
    }

    pub fn hook(&self, version: u32) -> Callback {
        let spy = self.clone();
        Callback::new(move || {
            let observed = {
                let mut state = spy.state.write();
                state.calls += 1;
                state.last = Some(version);
                Observed {
                    called: state.calls,
                    version,
                }
            };
            debug!(called = observed.called, version, "spy invoked");
            if let Some(notify) = &spy.notify {
                let _ = notify.send(observed);
            }
        })
    }

    pub fn called(&self) -> usize {
        self.state.read().calls
    }

    pub fn last(&self) -> Option<u32> {
        self.state.read().last
    }
}
