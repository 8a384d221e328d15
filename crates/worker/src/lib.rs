pub mod packer;
pub mod source;
pub mod strategies;

pub use packer::{BoxPacker, BoxPackerBuilder};
pub use source::PackageSource;
pub use strategies::{
    strategy_from_name, FifoFillStrategy, LightestFirstStrategy, RandomFillStrategy,
};
