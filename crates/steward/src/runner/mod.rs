//! Runner orchestration.
//!
//! - [`CadenceRunner`] runs one execution on a fixed interval.
//! - [`EventRunner`] runs event executions on authorized triggers.
//! - [`Supervisor`] starts the runners and stops them on shutdown.

mod cadence;
mod event;
mod executor;
mod supervisor;

pub use cadence::CadenceRunner;
pub use event::{Dispatch, EventRunner, Trigger};
pub use executor::ManifestExecutor;
pub use supervisor::{Supervisor, SupervisorReport, CADENCE_UNIT};
