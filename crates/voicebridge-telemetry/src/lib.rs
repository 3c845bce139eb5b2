pub mod health;
pub mod metrics;
pub mod percentile;

pub use health::{HealthEvent, HealthReceiver, HealthSender, Stage};
pub use metrics::{PipelineMetrics, PipelineSnapshot};
pub use percentile::PercentileTracker;
