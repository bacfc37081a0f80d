pub mod crossover;
pub mod sink;
pub mod state;
pub mod types;

pub use crossover::{CrossoverDetector, Decision};
pub use sink::AlertSink;
pub use state::AlertStateStore;
pub use types::{AlertEvent, AlertKey, CrossKind, Regime};
