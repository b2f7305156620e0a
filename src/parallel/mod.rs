pub mod batch;
pub mod pool;
pub mod progress;

pub use batch::{batch_count, batch_ranges};
pub use pool::WorkerPool;
pub use progress::{CancellationFlag, Progress};
