//! Conversation engine: template resolution, reply polling and rendering,
//! the per-path driver and the suite runner.

pub mod compare;
pub mod driver;
pub mod orchestrator;
pub mod polling;
pub mod render;
pub mod template;

pub use driver::{ConversationDriver, DriverSettings, PathOutcome, PathVerdict};
pub use orchestrator::{SuiteRunner, SuiteSummary};
