pub mod aggregation;
pub mod insight;

pub use aggregation::{AggregationService, ANOMALY_THRESHOLD};
pub use insight::{AzureOpenAiClient, ChatCompletion, InsightService};
