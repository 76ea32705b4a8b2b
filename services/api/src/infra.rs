use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use exam_admin::assignments::{AssignmentEngine, MemoryEntityStore, PropagationConfig};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Fresh assignment engine over a process-local in-memory store.
pub(crate) fn in_memory_engine() -> AssignmentEngine<MemoryEntityStore> {
    AssignmentEngine::new(
        Arc::new(MemoryEntityStore::default()),
        PropagationConfig::default(),
    )
}
