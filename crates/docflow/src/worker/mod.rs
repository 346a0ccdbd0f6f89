//! Worker pool, dispatcher and input watching.

pub mod inflight;
pub mod item;
pub mod manager;
pub mod panic_guard;
pub mod pool;
pub mod scheduler;
pub mod state;
pub mod watcher;

pub use inflight::InFlight;
pub use item::{WorkItem, WorkKey, WorkerReport};
pub use manager::Manager;
pub use pool::{WorkerContext, WorkerPool};
pub use scheduler::{is_saturated, least_loaded, WorkerLoad};
pub use state::{WorkerState, WorkerStatus};
pub use watcher::InputWatcher;
