//! The seven pipeline steps, in chain order.

mod finetune;
mod illustrate;
mod index;
mod narrate;
mod retrieve;
mod story;
mod vision;

pub use finetune::MaybeFinetune;
pub use illustrate::Illustrate;
pub use index::MaybeIndex;
pub use narrate::Narrate;
pub use retrieve::KbRetrieve;
pub use story::WriteStory;
pub use vision::VisionDescribe;
