pub mod engine;

pub use engine::{
    CorrectionConfig, EngineConfig, GeneratorConfig, HistoryConfig, PersistConfig, ScheduleConfig,
};
