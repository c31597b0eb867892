pub mod cleaning;
pub mod labels;

pub use cleaning::{centered_rolling_mean, dedup_by_timestamp};
pub use labels::future_labels;
