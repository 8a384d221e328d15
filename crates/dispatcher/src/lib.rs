//! 车队调度
//!
//! 调度器在单线程运行时上驱动固定数量的投递车，连接箱子队列与三个输出队列。

pub mod car;
pub mod controller;
pub mod delivery;

pub use car::{DeliveryCar, InFlight, InFlightLedger, SharedBoxReceiver};
pub use controller::{CarDispatcher, DispatchReport, DispatcherQueues, DrawFactory};
pub use delivery::DeliveryOdds;
