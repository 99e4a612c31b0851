//! Pipeline execution: ready queue, scheduler, dispatcher and the run loop

pub mod dispatcher;
pub mod engine;
pub mod queue;
pub mod scheduler;

pub use dispatcher::{Dispatched, Dispatcher};
pub use engine::{Engine, EventHandler, PipelineEvent, ShutdownHandle};
pub use queue::{MessageQueue, PriorityQueue};
pub use scheduler::{Next, Scheduler};
