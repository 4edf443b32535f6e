//! The adaptive batch operation engine: coalesces concurrent single-item
//! reads, writes, and existence checks into store-native batch calls,
//! sizing each accumulator's batches from its own recent latency and
//! success-ratio history.

pub mod accumulator;
pub mod adaptive;
pub mod engine;

pub use accumulator::{Accumulator, RetryConfig};
pub use adaptive::{AdaptiveSizer, SizingConfig};
pub use engine::{BatchEngine, BatchEngineConfig};
