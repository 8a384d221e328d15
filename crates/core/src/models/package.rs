use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 包裹的包装方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackingType {
    Envelope,
    Box,
    Tube,
    Roll,
}

impl PackingType {
    pub const ALL: [PackingType; 4] = [
        PackingType::Envelope,
        PackingType::Box,
        PackingType::Tube,
        PackingType::Roll,
    ];
}

/// 包裹尺寸（厘米）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length: u32,
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(length: u32, width: u32, height: u32) -> Self {
        Self {
            length,
            width,
            height,
        }
    }

    pub fn volume(&self) -> u64 {
        self.length as u64 * self.width as u64 * self.height as u64
    }
}

/// 待投递的包裹
///
/// 创建后不可变。重新投递时以原样（相同的 `id`）回到包裹队列。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub id: Uuid,
    pub dimensions: Dimensions,
    /// 重量（千克）
    pub weight: f64,
    pub packing_type: PackingType,
}

impl Package {
    pub const MAX_LENGTH: u32 = 100;
    pub const MAX_WIDTH: u32 = 100;
    pub const MAX_HEIGHT: u32 = 10;
    pub const MAX_WEIGHT: f64 = 100.0;

    pub fn new(dimensions: Dimensions, weight: f64, packing_type: PackingType) -> Self {
        Self {
            id: Uuid::new_v4(),
            dimensions,
            weight,
            packing_type,
        }
    }

    /// 生成一个随机包裹
    ///
    /// 长宽取 `0..=100`，高取 `0..=10`，重量取 `[0, 100)`，包装方式均匀分布。
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let dimensions = Dimensions::new(
            rng.random_range(0..=Self::MAX_LENGTH),
            rng.random_range(0..=Self::MAX_WIDTH),
            rng.random_range(0..=Self::MAX_HEIGHT),
        );
        let weight = rng.random::<f64>() * Self::MAX_WEIGHT;
        let packing_type = *PackingType::ALL
            .choose(rng)
            .unwrap_or(&PackingType::Box);

        Self::new(dimensions, weight, packing_type)
    }
}
