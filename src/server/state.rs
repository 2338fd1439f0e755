use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::acquisition::MediaAcquirer;

/// Shared state handed to every handler. Cloning is two `Arc` bumps.
#[derive(Clone)]
pub struct AppState {
    pub acquirer: Arc<dyn MediaAcquirer>,

    /// Caps how many acquisitions run at once
    pub permits: Arc<Semaphore>,
}

impl AppState {
    pub fn new(acquirer: Arc<dyn MediaAcquirer>, max_concurrent_jobs: usize) -> Self {
        Self {
            acquirer,
            permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
        }
    }
}
