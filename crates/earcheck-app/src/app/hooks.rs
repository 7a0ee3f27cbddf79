//! External collaborator hooks
//!
//! Email capture and analytics live outside the core. They are notified on a
//! worker thread; their failures are logged and never reach the test flow.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{info, warn};

use earcheck::procedure::TestOutcome;

use crate::error::Result;

/// Points in the session reported to analytics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Milestone {
    TestStarted,
    TestFinished,
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Milestone::TestStarted => write!(f, "test started"),
            Milestone::TestFinished => write!(f, "test finished"),
        }
    }
}

/// Something the outside world is told about
#[derive(Debug, Clone)]
pub enum Notification {
    Milestone(Milestone),
    /// Completion handoff, e.g. for email capture
    ResultsReady(Box<TestOutcome>),
}

/// Receiver of session notifications. Both methods default to doing nothing.
pub trait Collaborator: Send + Sync {
    /// Name used in log lines
    fn name(&self) -> &str;

    fn milestone(&self, _milestone: Milestone) -> Result<()> {
        Ok(())
    }

    fn results_ready(&self, _outcome: &TestOutcome) -> Result<()> {
        Ok(())
    }
}

/// Collaborator that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct LogCollaborator;

impl Collaborator for LogCollaborator {
    fn name(&self) -> &str {
        "log"
    }

    fn milestone(&self, milestone: Milestone) -> Result<()> {
        info!(%milestone, "milestone");
        Ok(())
    }

    fn results_ready(&self, outcome: &TestOutcome) -> Result<()> {
        info!(
            left = outcome.left_ear_thresholds.len(),
            right = outcome.right_ear_thresholds.len(),
            reliable = outcome.reliable,
            "results ready"
        );
        Ok(())
    }
}

/// Registered collaborators
#[derive(Clone, Default)]
pub struct Hooks {
    collaborators: Vec<Arc<dyn Collaborator>>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.collaborators.iter().map(|c| c.name()))
            .finish()
    }
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, collaborator: Arc<dyn Collaborator>) -> Self {
        self.collaborators.push(collaborator);
        self
    }

    pub fn add(&mut self, collaborator: Arc<dyn Collaborator>) {
        self.collaborators.push(collaborator);
    }

    pub fn is_empty(&self) -> bool {
        self.collaborators.is_empty()
    }

    /// Deliver `notification` to every collaborator on a worker thread.
    ///
    /// Returns the worker's handle; callers normally drop it.
    pub fn notify(&self, notification: Notification) -> Option<JoinHandle<()>> {
        if self.collaborators.is_empty() {
            return None;
        }
        let collaborators = self.collaborators.clone();
        let spawned = thread::Builder::new()
            .name("collaborators".into())
            .spawn(move || deliver(&collaborators, &notification));
        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Failed to spawn collaborator thread: {}", e);
                None
            }
        }
    }
}

fn deliver(collaborators: &[Arc<dyn Collaborator>], notification: &Notification) {
    for collaborator in collaborators {
        let result = match notification {
            Notification::Milestone(m) => collaborator.milestone(*m),
            Notification::ResultsReady(outcome) => collaborator.results_ready(outcome),
        };
        if let Err(e) = result {
            warn!(collaborator = collaborator.name(), "ignored collaborator failure: {}", e);
        }
    }
}
