//! Core domain types for autocoupons.
//!
//! Course identity, the deduplicating [`CourseStore`], and the terminal
//! [`Classification`] of a course after enrollment. Pure data: no IO, no async.

mod course;
mod outcome;
mod store;

pub use course::{BlanketCourse, CourseRef, SpecificCourse, UrlId};
pub use outcome::{Classification, CourseOutcome, RunReport};
pub use store::{CompactEntry, CourseStore, TypeFault};
