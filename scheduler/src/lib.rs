pub mod engine;
mod monitor_loop;
pub mod types;

pub use engine::MonitorScheduler;
pub use types::{DisplaySink, MonitorState, NoopDisplay, SchedulerConfig, StartOutcome};
