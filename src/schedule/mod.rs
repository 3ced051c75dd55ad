pub mod fallback;
pub mod model;
pub mod store;

pub use fallback::{fallback_blocks, FallbackInputs};
pub use model::{BlockDifficulty, BlockKind, Provenance, Schedule, ScheduleBlock};
pub use store::IssuedSchedules;
