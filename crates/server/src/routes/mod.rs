mod datasets;
mod finetune;
mod health;
mod story;
mod workers;

pub use datasets::*;
pub use finetune::*;
pub use health::*;
pub use story::*;
pub use workers::*;
