pub mod app_config;
pub mod observability;
pub mod pipeline;
pub mod queue;

pub use app_config::AppConfig;
pub use observability::ObservabilityConfig;
pub use pipeline::{
    AbandonPolicy, DispatcherConfig, FleetConfig, OverflowPolicy, PackerConfig, SourceConfig,
    FILL_STRATEGIES,
};
pub use queue::QueueConfig;
