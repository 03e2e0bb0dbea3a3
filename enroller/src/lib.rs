//! Course enrollment over a browser page.
//!
//! [`EnrollmentMachine`] decides, for one course and token, whether the token
//! makes the course free and completes the checkout when it does. It talks to
//! the page only through [`PageDriver`]; [`ChromeDriver`] is the Chromium
//! implementation. [`spawn_worker`] runs the machine over the bridge consumer
//! on a dedicated thread.

mod chrome;
mod driver;
mod error;
mod machine;
pub mod selectors;
mod worker;

#[cfg(test)]
mod scripted;

pub use chrome::{BrowserProfile, ChromeDriver};
pub use driver::{Condition, DriverFut, PageDriver, WAIT_POLL_INTERVAL, WAIT_TIMEOUT, Waits};
pub use error::{AutomationFault, WorkerError};
pub use machine::EnrollmentMachine;
pub use worker::{
    DEFAULT_MAX_ATTEMPTS, WorkerHandle, WorkerOptions, run_queue, spawn_with_driver,
    spawn_worker, spawn_worker_with,
};
