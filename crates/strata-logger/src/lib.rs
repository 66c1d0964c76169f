pub mod log;
pub mod severity;
pub mod systime;

pub use self::log::{init, init_from_env, Logger};
pub use severity::LogSeverity;
