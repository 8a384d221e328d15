pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod shutdown;
pub mod traits;

pub use self::config::{
    AbandonPolicy, AppConfig, DispatcherConfig, FleetConfig, ObservabilityConfig, OverflowPolicy,
    PackerConfig, QueueConfig, SourceConfig,
};
pub use errors::*;
pub use metrics::{PipelineCounters, PipelineMetrics, PipelineSnapshot, QueueDepths};
pub use models::{DeliveryAttempt, DeliveryOutcome, Dimensions, Package, PackingType, PickupBox};
pub use shutdown::{ShutdownListener, ShutdownSignal};
pub use traits::{
    push_until_shutdown, Channel, DrawSource, FillPlan, FillStrategy, PopError, PushError,
    RandomDraws,
};

/// 统一的Result类型
pub type CourierResult<T> = std::result::Result<T, CourierError>;
