pub mod batch_job;
pub mod metric;
pub mod prediction;
pub mod session;

pub use batch_job::{BatchJob, BatchJobStatus};
pub use metric::SystemMetric;
pub use prediction::{NewPrediction, PredictionRecord};
pub use session::UserSession;
