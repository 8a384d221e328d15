//! 流水线配置
//!
//! 配置按组件划分：包裹源、装箱器、车队、调度器、队列和可观测性。
//! 每个分组都提供默认值和 `validate()`，任何非法值都会在流水线启动前报错。
//!
//! ```toml
//! [packer]
//! capacity = 32
//! overflow_policy = "carry"
//!
//! [fleet]
//! workers = 4
//! vehicle_fault_probability = 0.05
//! ```

pub mod models;

pub use models::*;
