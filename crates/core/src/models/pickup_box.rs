use serde::Serialize;

use crate::{models::Package, CourierError, CourierResult};

/// 一次投递行程使用的箱子
///
/// 始终满足 `packages.len() <= capacity`，违反时构造失败。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PickupBox {
    packages: Vec<Package>,
    capacity: usize,
}

impl PickupBox {
    /// 默认箱子容量
    pub const DEFAULT_CAPACITY: usize = 64;

    pub fn new(packages: Vec<Package>, capacity: usize) -> CourierResult<Self> {
        if packages.len() > capacity {
            return Err(CourierError::BoxOverfilled {
                count: packages.len(),
                capacity,
            });
        }

        Ok(Self { packages, capacity })
    }

    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// 拆箱，箱内包裹按装箱顺序返回
    pub fn into_packages(self) -> Vec<Package> {
        self.packages
    }
}

impl IntoIterator for PickupBox {
    type Item = Package;
    type IntoIter = std::vec::IntoIter<Package>;

    fn into_iter(self) -> Self::IntoIter {
        self.packages.into_iter()
    }
}
