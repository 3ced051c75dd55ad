pub mod activity;
pub mod analytics;
pub mod circuit_breaker;
pub mod coach;
pub mod config;
pub mod correction;
pub mod error;
pub mod fusion;
pub mod hub;
pub mod logging;
pub mod metrics;
pub mod persist;
pub mod pipelines;
pub mod recommendation;
pub mod schedule;
pub mod state;

pub use activity::{ActivityRecord, InFlightActivity, Metadata};
pub use analytics::{AnalyticsReport, MoodTrend};
pub use coach::Coach;
pub use config::EngineConfig;
pub use correction::{CorrectionResult, FeedbackAnalysis};
pub use error::{CoachError, CollaboratorError, Result};
pub use fusion::{CbtDifficulty, EmotionBand, FusedScores, StressScore};
pub use hub::{BroadcastHub, StateUpdate, Subscription, Unsubscribe};
pub use logging::init_logging;
pub use metrics::{Metrics, MetricsSnapshot};
pub use persist::{JsonlSink, NoopSink, PersistRecord, SnapshotSink};
pub use pipelines::{GenerationRequest, HttpScheduleGenerator, OfflineGenerator, ScheduleGenerator};
pub use recommendation::{Recommendation, RecommendationMode};
pub use schedule::{Provenance, Schedule, ScheduleBlock};
pub use state::{LearnerState, Observation};
