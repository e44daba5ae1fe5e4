//! Domain model (IDs, task records, outcomes, errors).

pub mod errors;
pub mod ids;
pub mod info;
pub mod outcome;
pub mod state;
pub mod task;

pub use errors::{BuildError, ClientError, ConfigError, ExecutorError, RegistryError, ResourceError};
pub use ids::{NodeId, TaskId};
pub use info::TaskInfo;
pub use outcome::{TaskOutcome, TaskResult};
pub use state::TaskStatus;
pub use task::{Execution, NewTask, TaskRecord};
