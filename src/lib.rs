pub mod app_dirs;
pub mod config;
pub mod curriculum;
pub mod error_freq;
pub mod history;
pub mod keystroke;
pub mod plan;
pub mod practice;
pub mod progression;
pub mod rate_limit;
pub mod report;
pub mod runtime;
pub mod scoring;
pub mod session;
pub mod storage;

pub use config::{Config, ConfigStore, FileConfigStore};
pub use curriculum::{Curriculum, Level, LevelBuckets, PlanParams};
pub use error_freq::ErrorFrequencyMap;
pub use progression::{ProgressionController, ProgressionState};
pub use scoring::{compute_stats, Stats};
pub use session::{MismatchPolicy, Session};
