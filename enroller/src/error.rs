use std::time::Duration;

use thiserror::Error;

/// A failure while interacting with the course page.
///
/// The enrollment machine absorbs these into `Classification::Error`; they
/// never abort a run.
#[derive(Debug, Clone, Error)]
pub enum AutomationFault {
    #[error("timed out after {waited:?} waiting for {condition}{}", fault_suffix(.last_fault.as_deref()))]
    Timeout {
        condition: String,
        waited: Duration,
        /// Most recent driver fault swallowed while polling.
        last_fault: Option<Box<AutomationFault>>,
    },
    #[error("browser error: {0}")]
    Browser(String),
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("element not found: {0}")]
    MissingElement(String),
}

fn fault_suffix(fault: Option<&AutomationFault>) -> String {
    fault.map(|fault| format!(" (last error: {fault})")).unwrap_or_default()
}

impl AutomationFault {
    pub(crate) fn browser(err: impl std::fmt::Display) -> Self {
        Self::Browser(err.to_string())
    }
}

/// Why the enrollment worker could not produce a report.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to spawn enrollment worker thread")]
    Spawn(#[source] std::io::Error),
    #[error("failed to build enrollment worker runtime")]
    Runtime(#[source] std::io::Error),
    #[error("failed to start the page driver")]
    Driver(#[source] AutomationFault),
    #[error("enrollment worker panicked")]
    Panicked,
}
