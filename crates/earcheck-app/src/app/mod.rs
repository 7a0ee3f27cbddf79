//! Session control
//!
//! The controller owns every piece of mutable test state and runs on its own
//! thread; frontends send [`TestCommand`]s and read [`TestSnapshot`]s.

pub mod controller;
pub mod hooks;
pub mod scheduler;
pub mod state;

pub use controller::{ControllerHandle, ControllerOptions, TestController};
pub use hooks::{Collaborator, Hooks, LogCollaborator, Milestone, Notification};
pub use scheduler::{Scheduler, Timer};
pub use state::{CalibrationView, ResumeOffer, Stage, TestCommand, TestSnapshot};
