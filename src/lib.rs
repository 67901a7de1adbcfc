// Ledger transaction write pipeline core.
// Exposes the component contracts and orchestrator so callers (HTTP handlers,
// worker binaries, admin tooling) can drive them; wiring those callers is out of scope here.

#[macro_use]
extern crate log;

pub mod amount;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod model;
pub mod orchestrator;
pub mod queue;
pub mod router;
pub mod store;
pub mod worker;

pub use error::PipelineError;
