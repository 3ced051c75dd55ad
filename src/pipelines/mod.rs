pub mod http;
pub mod json_utils;
pub mod perf;
pub mod port;
pub mod router;

pub use http::HttpScheduleGenerator;
pub use port::{CorrectionHint, GenerationRequest, OfflineGenerator, ScheduleGenerator, ScoreSummary};
pub use router::GenerationRouter;
