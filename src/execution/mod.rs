//! Request handling and background task hand-off

pub mod engine;
pub mod queue;

pub use engine::{ActionEngine, EngineEvent, HttpResponse, Route};
pub use queue::{ChannelQueue, Task, TaskQueue};
