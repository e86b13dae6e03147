mod breakpoints;
mod engine;
mod events;
mod gate;
mod source;
mod stepping;

pub use breakpoints::Breakpoints;
pub use engine::ExecutionEngine;
pub(crate) use engine::Shared;
pub use events::{EngineEvent, EngineObserver};
pub use gate::Gate;
pub use source::SourceDocument;
pub use stepping::RunState;
