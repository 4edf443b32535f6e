//! Adaptive availability polling and read-routing for the polyglot
//! persistence coordinator. Watches every adapter's health, derives a
//! `StrategyKind` the distributor must honor, and routes individual reads
//! to the best live store for their query kind.

pub mod availability;
pub mod routing;

pub use availability::{AvailabilitySnapshot, AvailabilityStrategy, PollerConfig, StrategyKind, choose_strategy};
pub use routing::{QueryKind, ReadRouter};
