use crate::models::Package;

/// 装箱策略
///
/// 决定缓冲区中哪些包裹进入箱子，其余作为溢出返回。
/// 返回的 `selected` 长度不得超过 `capacity`，否则箱子构造会失败。
pub trait FillStrategy: Send + Sync {
    fn fill(&self, buffer: Vec<Package>, capacity: usize) -> FillPlan;

    fn name(&self) -> &str;
}

/// 一次装箱的选择结果
#[derive(Debug, Default)]
pub struct FillPlan {
    pub selected: Vec<Package>,
    pub overflow: Vec<Package>,
}

impl FillPlan {
    /// 按位置切分：前 `capacity` 个装箱，其余溢出
    pub fn split_at_capacity(mut buffer: Vec<Package>, capacity: usize) -> Self {
        let overflow = if buffer.len() > capacity {
            buffer.split_off(capacity)
        } else {
            Vec::new()
        };

        Self {
            selected: buffer,
            overflow,
        }
    }
}
