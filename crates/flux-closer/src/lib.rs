pub mod config;
pub mod coordinator;
pub mod error;
pub mod exit;
pub mod global;
pub mod guard;
pub mod logging;
pub mod registry;
pub mod signal;
pub mod trigger;

pub use config::{CloserConfig, ExitSignal};
pub use coordinator::{Closer, CloserBuilder, ShutdownPhase};
pub use error::{CloserError, Result};
pub use exit::{ExitHandler, ProcessExit};
pub use global::{bind, close, fatal, global, hold, init, run_guarded};
pub use guard::CloseGuard;
pub use logging::init_tracing;
pub use registry::{Cleanup, CleanupRegistry};
pub use signal::SignalSet;
pub use trigger::Trigger;
