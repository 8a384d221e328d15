use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 投递故障注入使用的随机数来源，每次返回 `[0, 1)` 内的值
pub trait DrawSource: Send {
    fn draw(&mut self) -> f64;
}

/// 基于 `StdRng` 的随机来源
#[derive(Debug, Clone)]
pub struct RandomDraws {
    rng: StdRng,
}

impl RandomDraws {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl DrawSource for RandomDraws {
    fn draw(&mut self) -> f64 {
        self.rng.random::<f64>()
    }
}
