//! Test data builders for packages and boxes

use courier_core::{Dimensions, Package, PackingType, PickupBox};

/// Builder for creating test packages
pub struct PackageBuilder {
    dimensions: Dimensions,
    weight: f64,
    packing_type: PackingType,
}

impl PackageBuilder {
    pub fn new() -> Self {
        Self {
            dimensions: Dimensions::new(10, 10, 1),
            weight: 1.0,
            packing_type: PackingType::Box,
        }
    }

    pub fn with_dimensions(mut self, length: u32, width: u32, height: u32) -> Self {
        self.dimensions = Dimensions::new(length, width, height);
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_packing_type(mut self, packing_type: PackingType) -> Self {
        self.packing_type = packing_type;
        self
    }

    pub fn build(self) -> Package {
        Package::new(self.dimensions, self.weight, self.packing_type)
    }
}

impl Default for PackageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 生成 `count` 个默认包裹
pub fn package_batch(count: usize) -> Vec<Package> {
    (0..count).map(|_| PackageBuilder::new().build()).collect()
}

/// 生成指定重量的包裹，顺序与输入一致
pub fn packages_with_weights(weights: &[f64]) -> Vec<Package> {
    weights
        .iter()
        .map(|w| PackageBuilder::new().with_weight(*w).build())
        .collect()
}

/// 用默认容量装好的一箱
pub fn box_of(packages: Vec<Package>) -> PickupBox {
    let capacity = packages.len().max(PickupBox::DEFAULT_CAPACITY);
    match PickupBox::new(packages, capacity) {
        Ok(pickup_box) => pickup_box,
        Err(e) => panic!("构造测试箱子失败: {e}"),
    }
}
