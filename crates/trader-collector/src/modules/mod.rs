//! 백필 모듈.

pub mod backfill;
pub mod checkpoint;

pub use backfill::{BackfillOptions, BackfillRange, BackfillRunner};
pub use checkpoint::{Checkpoint, CheckpointStatus, CheckpointStore, PgCheckpointStore};
