pub mod matcher;
pub mod orchestrator;
pub mod partition;
pub mod reduction;
pub mod scanner;

pub use matcher::MatchStrategy;
pub use orchestrator::ScanOrchestrator;
pub use partition::belongs_to_partition;
pub use reduction::{reduce_presence, PresenceReducer};
pub use scanner::{CancelToken, PartitionScanner, PartitionWorker};
