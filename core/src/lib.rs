pub mod config;
pub mod lifecycle;
pub mod monitor;
pub mod probe;
pub mod remote;
pub mod scheduler;
pub mod state;

// Re-exports for convenience
pub use config::Config;
pub use lifecycle::{ExitGuard, LifecycleController};
pub use state::SharedState;
