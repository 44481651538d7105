pub mod bus;
pub mod interval;
pub mod trigger;

pub use bus::EventBus;
pub use trigger::{RunRequest, Trigger};
