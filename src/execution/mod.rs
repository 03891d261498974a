//! Execution: worker pools, partitioning and the queue/handler front end.

pub mod pool;
pub mod partition;
pub mod dispatch;
pub mod handler;
pub mod queue;

pub use pool::{InlinePool, SharedPool, Task, TaskPool, WorkerPool};
pub use partition::{Chunk, ChunkIterator};
pub use dispatch::{dispatch, DispatchStats};
pub use handler::Handler;
pub use queue::{Event, Queue, QueueStats};
