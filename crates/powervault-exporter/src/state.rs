//! Shared application state and the global allocator.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::sync::Arc;

use powervault_core::MetricRegistry;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) registry: Arc<MetricRegistry>,
    /// Route serving the exposition, e.g. `/metrics`.
    pub(crate) metrics_path: Arc<str>,
}
