pub mod channel;
pub mod draw;
pub mod strategy;

pub use channel::{push_until_shutdown, Channel, PopError, PushError};
pub use draw::{DrawSource, RandomDraws};
pub use strategy::{FillPlan, FillStrategy};
