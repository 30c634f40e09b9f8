use std::fmt;
use std::sync::Arc;

/// Zero-argument procedure run when a handle fires.
///
/// Cheap to clone; the same callback can be re-armed any number of times.
#[derive(Clone)]
pub struct Callback(Arc<dyn Fn() + Send + Sync + 'static>);

impl Callback {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    #[inline]
    pub fn invoke(&self) {
        (self.0)()
    }

    /// True when both handles point at the same closure.
    pub fn ptr_eq(&self, other: &Callback) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Callback").finish_non_exhaustive()
    }
}
