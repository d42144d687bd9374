pub mod executor;
pub mod lock;
pub mod watcher;
