pub mod collector;
pub mod fields;
pub mod session;

pub use collector::{Collector, UpsCollector};
pub use fields::{MetricMeta, Reading, Readings};
pub use session::SessionManager;
