pub mod corpus;
pub mod domain;
pub mod error;
pub mod features;
pub mod mapping;
pub mod record;
pub mod scheduler;

pub use corpus::ExtractionConfig;
pub use error::ExtractError;
pub use features::{Feature, RequestFeatureExtractor};
pub use mapping::MappingTable;
pub use record::{FeatureRecord, FeatureValue};
pub use scheduler::{BoundedScheduler, ProcessLauncher, ScheduleSummary, SpawnLauncher, TaskOutcome};
