//! The serial enrollment worker.
//!
//! The page driver cannot be shared or re-entered, so every course is handled
//! on one dedicated OS thread with its own single-threaded runtime. The thread
//! owns the driver from launch to quit and returns the [`RunReport`].

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::thread;

use autocoupons_bridge::{Consumer, QueueItem};
use autocoupons_types::{Classification, RunReport, SpecificCourse, UrlId};
use futures_util::FutureExt;

use crate::chrome::{BrowserProfile, ChromeDriver};
use crate::driver::{DriverFut, PageDriver, Waits};
use crate::error::WorkerError;
use crate::machine::EnrollmentMachine;

/// Extra attempts for a course that ended in `Error`.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerOptions {
    pub max_attempts: u32,
    pub waits: Waits,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            waits: Waits::default(),
        }
    }
}

pub struct WorkerHandle {
    thread: thread::JoinHandle<Result<RunReport, WorkerError>>,
}

impl WorkerHandle {
    /// Block until the worker has seen the end of the queue.
    pub fn join(self) -> Result<RunReport, WorkerError> {
        match self.thread.join() {
            Ok(result) => result,
            Err(_) => Err(WorkerError::Panicked),
        }
    }

    /// [`join`](Self::join) without blocking the async runtime.
    pub async fn wait(self) -> Result<RunReport, WorkerError> {
        match tokio::task::spawn_blocking(move || self.join()).await {
            Ok(result) => result,
            Err(_) => Err(WorkerError::Panicked),
        }
    }
}

/// Start the browser-backed worker for one run.
pub fn spawn_worker(
    consumer: Consumer,
    profile_directory: impl Into<String>,
    user_data_dir: impl Into<PathBuf>,
) -> Result<WorkerHandle, WorkerError> {
    spawn_worker_with(
        consumer,
        BrowserProfile::new(profile_directory, user_data_dir),
        WorkerOptions::default(),
    )
}

pub fn spawn_worker_with(
    consumer: Consumer,
    profile: BrowserProfile,
    options: WorkerOptions,
) -> Result<WorkerHandle, WorkerError> {
    spawn_with_driver(consumer, options, move || {
        Box::pin(async move { ChromeDriver::launch(&profile).await })
    })
}

/// Start a worker around any driver. `launch` runs on the worker thread.
pub fn spawn_with_driver<D, L>(
    consumer: Consumer,
    options: WorkerOptions,
    launch: L,
) -> Result<WorkerHandle, WorkerError>
where
    D: PageDriver + 'static,
    L: FnOnce() -> DriverFut<'static, D> + Send + 'static,
{
    let thread = thread::Builder::new()
        .name("enroller".to_string())
        .spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(WorkerError::Runtime)?;
            runtime.block_on(async move {
                let mut driver = launch().await.map_err(WorkerError::Driver)?;
                let outcome = AssertUnwindSafe(run_queue(&mut driver, consumer, options))
                    .catch_unwind()
                    .await;
                if let Err(err) = driver.quit().await {
                    tracing::warn!(error = %err, "Failed to quit page driver");
                }
                match outcome {
                    Ok(report) => Ok(report),
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            })
        })
        .map_err(WorkerError::Spawn)?;

    Ok(WorkerHandle { thread })
}

/// Enroll every course from `consumer` until the end-of-stream sentinel.
///
/// Courses are processed strictly one at a time; the report lists them in
/// consumption order with exactly one classification each.
pub async fn run_queue<D: PageDriver>(
    driver: &mut D,
    mut consumer: Consumer,
    options: WorkerOptions,
) -> RunReport {
    let machine = EnrollmentMachine::new(options.waits);
    let mut report = RunReport::new();
    let mut settled: HashSet<UrlId> = HashSet::new();

    loop {
        // Taking blocks the thread; keep the runtime free for the driver.
        let taken = tokio::task::spawn_blocking(move || {
            let item = consumer.recv();
            (consumer, item)
        })
        .await;
        let (returned, item) = match taken {
            Ok(taken) => taken,
            Err(err) => {
                tracing::error!(error = %err, "Course queue reader failed");
                break;
            }
        };
        consumer = returned;

        let QueueItem::Course(course) = item else {
            tracing::debug!("Reached end of course queue");
            break;
        };

        let classification = if settled.contains(course.url_id()) {
            tracing::debug!(%course, "Course already settled in this run");
            Classification::ToBlacklist
        } else {
            enroll_with_retries(&machine, driver, &course, options.max_attempts).await
        };

        if classification.settles_course() {
            settled.insert(course.url_id().clone());
        }
        if classification == Classification::Enrolled {
            tracing::info!("Enrolled in {course}");
        }
        tracing::debug!(%course, %classification, "Course classified");
        report.record(course, classification);
    }

    let enrolled = report.count(Classification::Enrolled);
    tracing::info!("Enrolled in {enrolled} courses");
    report
}

async fn enroll_with_retries<D: PageDriver>(
    machine: &EnrollmentMachine,
    driver: &mut D,
    course: &SpecificCourse,
    max_attempts: u32,
) -> Classification {
    let mut attempt = 0;
    loop {
        let classification = machine.enroll(driver, course).await;
        if classification != Classification::Error || attempt >= max_attempts {
            return classification;
        }
        attempt += 1;
        tracing::info!(%course, attempt, "Retrying course after page error");
    }
}
