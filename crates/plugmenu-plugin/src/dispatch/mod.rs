//! Outbound side: delivering menu selections to plugins.

pub mod bridge;
pub mod channel;
pub mod outcome;

pub use bridge::DispatchBridge;
pub use channel::{
    CallbackHandler, CallbackReply, CallbackRequest, ChannelError, ClosureCallback,
    CommandChannel, InProcessChannel,
};
pub use outcome::DispatchOutcome;
