//! The coordinator's configuration surface: one struct field per option a
//! deployment recognizes. No CLI flag or file-format parser lives here —
//! wiring a `CoordinatorConfig` from a file, environment, or flags is the
//! embedding application's job.

use std::time::Duration;

use covina_batch::SizingConfig;
use covina_distributor::DistributorConfig;
use covina_saga::OrchestratorConfig;
use covina_strategy::PollerConfig;

/// Per-operation-kind adaptive batch sizing, keyed by a caller-chosen name
/// (e.g. `"write"`, `"read"`).
#[derive(Debug, Clone)]
pub struct BatchOpConfig {
    /// Which operation kind this tuning applies to.
    pub op_kind: String,
    /// Adaptive sizing bounds and thresholds for this operation kind.
    pub sizing: SizingConfig,
    /// Max time an item waits in an accumulator before dispatch.
    pub coalesce_delay: Duration,
}

/// The full recognized configuration surface, grouped by the subsystem
/// each option tunes.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Availability polling tuning, shared by every adapter.
    pub poller: PollerConfig,
    /// Per-op-kind adaptive batch tuning.
    pub batch: Vec<BatchOpConfig>,
    /// SAGA step/transaction timeouts and compensation retry bounds.
    pub orchestrator: OrchestratorConfig,
    /// Distributor fan-out ceiling and transaction timeout. Completed-
    /// transaction retention before eviction lives on `orchestrator.retention`.
    pub distributor: DistributorConfig,
    /// Default location/collection a bare read (`get_by_id` with no store
    /// hint, `semantic_search`, relation instance reads) addresses.
    pub default_location: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            poller: PollerConfig::default(),
            batch: Vec::new(),
            orchestrator: OrchestratorConfig::default(),
            distributor: DistributorConfig::default(),
            default_location: "documents".to_string(),
        }
    }
}
