pub mod config;
pub mod error;
pub mod job;

pub use config::{load_dotenv, PoolConfig, SchedulerConfig, TasklineConfig};
pub use error::*;
pub use job::*;
