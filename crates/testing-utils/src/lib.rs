//! # Courier Testing Utils
//!
//! 工作区各 crate 共用的测试工具。
//!
//! - **Builders**: 带默认值的包裹、箱子构造器
//! - **Mocks**: 可脚本化的随机数来源和不阻塞的内存队列
//! - **Helpers**: 等待条件成立等通用辅助函数
//!
//! ```toml
//! [dev-dependencies]
//! courier-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
