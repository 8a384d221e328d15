//! # 数据模型
//!
//! 流水线中流转的值类型：包裹、箱子和投递结果。
//!
//! - [`Package`]：不可变的包裹记录，由包裹源生成，重新投递时原样回到包裹队列
//! - [`PickupBox`]：容量受限的一批包裹，构造时校验容量
//! - [`DeliveryOutcome`]：一个箱子的投递结果，三类序列恰好划分箱内包裹

pub mod outcome;
pub mod package;
pub mod pickup_box;

pub use outcome::{DeliveryAttempt, DeliveryOutcome};
pub use package::{Dimensions, Package, PackingType};
pub use pickup_box::PickupBox;
