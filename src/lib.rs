pub mod aggregator;
pub mod app;
pub mod common;
pub mod shutdown;

pub use aggregator::ResultAggregator;
pub use app::{Application, PipelineMonitor, PipelineQueues, ShutdownReport};
pub use common::{init_logging, load_config, StartupConfig};
pub use shutdown::wait_for_shutdown_signal;
