use chrono::{DateTime, Utc};
use std::{fmt, sync::Arc};

/// Produces a column value at the moment an entity is constructed.
///
/// Any `Fn() -> T` closure is a producer, so a default can be a constant, a
/// clock read or a sequence without special support from the store.
pub trait ValueProducer<T>: Send + Sync {
    fn produce(&self) -> T;
}

impl<T, F> ValueProducer<T> for F
where
    F: Fn() -> T + Send + Sync,
{
    fn produce(&self) -> T {
        self()
    }
}

/// The producers consulted when a claim draft is built
#[derive(Clone)]
pub struct ClaimDefaults {
    created_at: Arc<dyn ValueProducer<DateTime<Utc>>>,
}

impl fmt::Debug for ClaimDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimDefaults").finish_non_exhaustive()
    }
}

impl Default for ClaimDefaults {
    fn default() -> Self {
        Self {
            created_at: Arc::new(Utc::now),
        }
    }
}

impl ClaimDefaults {
    /// Replace the clock used to stamp `created_at`
    pub fn created_at<P>(mut self, producer: P) -> Self
    where
        P: ValueProducer<DateTime<Utc>> + 'static,
    {
        self.created_at = Arc::new(producer);
        self
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.created_at.produce()
    }
}
