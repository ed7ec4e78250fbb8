//! Outbound HTTP clients: LLM completion and robot message delivery.

pub mod completion;
pub mod robot;

pub use completion::{CompletionClient, CompletionError};
pub use robot::{DeliveryError, RobotClient};
