use std::sync::Arc;

use rand::seq::SliceRandom;
use tracing::debug;

use courier_core::{CourierError, CourierResult, FillPlan, FillStrategy, Package};

/// 随机装箱：打乱缓冲区后取前 `capacity` 个
pub struct RandomFillStrategy;

/// 按到达顺序装箱
pub struct FifoFillStrategy;

/// 先装最轻的包裹
pub struct LightestFirstStrategy;

impl RandomFillStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RandomFillStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl FillStrategy for RandomFillStrategy {
    fn fill(&self, mut buffer: Vec<Package>, capacity: usize) -> FillPlan {
        buffer.shuffle(&mut rand::rng());
        FillPlan::split_at_capacity(buffer, capacity)
    }

    fn name(&self) -> &str {
        "random"
    }
}

impl FifoFillStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FifoFillStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl FillStrategy for FifoFillStrategy {
    fn fill(&self, buffer: Vec<Package>, capacity: usize) -> FillPlan {
        FillPlan::split_at_capacity(buffer, capacity)
    }

    fn name(&self) -> &str {
        "fifo"
    }
}

impl LightestFirstStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LightestFirstStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl FillStrategy for LightestFirstStrategy {
    fn fill(&self, mut buffer: Vec<Package>, capacity: usize) -> FillPlan {
        buffer.sort_by(|a, b| a.weight.total_cmp(&b.weight));
        let plan = FillPlan::split_at_capacity(buffer, capacity);

        debug!(
            "轻件优先策略装箱: {} 个入箱, {} 个溢出",
            plan.selected.len(),
            plan.overflow.len()
        );
        plan
    }

    fn name(&self) -> &str {
        "lightest_first"
    }
}

/// 根据配置中的名称创建装箱策略
pub fn strategy_from_name(name: &str) -> CourierResult<Arc<dyn FillStrategy>> {
    match name {
        "random" => Ok(Arc::new(RandomFillStrategy::new())),
        "fifo" => Ok(Arc::new(FifoFillStrategy::new())),
        "lightest_first" => Ok(Arc::new(LightestFirstStrategy::new())),
        other => Err(CourierError::config_error(format!(
            "无效的装箱策略: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::{Dimensions, PackingType};
    use std::collections::HashSet;

    fn packages(weights: &[f64]) -> Vec<Package> {
        weights
            .iter()
            .map(|w| Package::new(Dimensions::new(10, 10, 1), *w, PackingType::Box))
            .collect()
    }

    #[test]
    fn test_random_fill_respects_capacity_and_keeps_all_packages() {
        let buffer = packages(&[1.0; 10]);
        let ids: HashSet<_> = buffer.iter().map(|p| p.id).collect();

        let plan = RandomFillStrategy::new().fill(buffer, 4);
        assert_eq!(plan.selected.len(), 4);
        assert_eq!(plan.overflow.len(), 6);

        let out: HashSet<_> = plan
            .selected
            .iter()
            .chain(plan.overflow.iter())
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, out);
    }

    #[test]
    fn test_fifo_fill_keeps_arrival_order() {
        let buffer = packages(&[1.0, 2.0, 3.0]);
        let ids: Vec<_> = buffer.iter().map(|p| p.id).collect();

        let plan = FifoFillStrategy::new().fill(buffer, 2);
        assert_eq!(
            plan.selected.iter().map(|p| p.id).collect::<Vec<_>>(),
            ids[..2]
        );
        assert_eq!(plan.overflow[0].id, ids[2]);
    }

    #[test]
    fn test_lightest_first_selects_lightest() {
        let buffer = packages(&[9.0, 1.0, 5.0, 0.5]);

        let plan = LightestFirstStrategy::new().fill(buffer, 2);
        let weights: Vec<f64> = plan.selected.iter().map(|p| p.weight).collect();
        assert_eq!(weights, vec![0.5, 1.0]);
        assert_eq!(plan.overflow.len(), 2);
    }

    #[test]
    fn test_fill_smaller_buffer_has_no_overflow() {
        let plan = FifoFillStrategy::new().fill(packages(&[1.0, 2.0]), 8);
        assert_eq!(plan.selected.len(), 2);
        assert!(plan.overflow.is_empty());
    }

    #[test]
    fn test_strategy_from_name() {
        assert_eq!(strategy_from_name("random").unwrap().name(), "random");
        assert_eq!(strategy_from_name("fifo").unwrap().name(), "fifo");
        assert_eq!(
            strategy_from_name("lightest_first").unwrap().name(),
            "lightest_first"
        );
        assert!(strategy_from_name("unknown").is_err());
    }
}
