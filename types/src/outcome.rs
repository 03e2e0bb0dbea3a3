//! Terminal classifications and the per-run report.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::course::{CourseRef, SpecificCourse};
use crate::store::{CourseStore, TypeFault};

/// Where a course ended after the enrollment procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// The discount applies and checkout is free.
    Enrollable,
    /// The token does not make the course free.
    Paid,
    /// Already owned, free without a token, private, or gone.
    ToBlacklist,
    Enrolled,
    /// Page automation failed; the course is reconsidered next run.
    Error,
}

impl Classification {
    pub const ALL: [Self; 5] = [
        Self::Enrollable,
        Self::Paid,
        Self::ToBlacklist,
        Self::Enrolled,
        Self::Error,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enrollable => "enrollable",
            Self::Paid => "paid",
            Self::ToBlacklist => "to_blacklist",
            Self::Enrolled => "enrolled",
            Self::Error => "error",
        }
    }

    /// Whether no other token for the same course can change the outcome.
    #[must_use]
    pub const fn settles_course(self) -> bool {
        matches!(self, Self::Enrolled | Self::ToBlacklist)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseOutcome {
    pub course: SpecificCourse,
    pub classification: Classification,
}

/// Ordered classifications for one run, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    outcomes: Vec<CourseOutcome>,
}

impl RunReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, course: SpecificCourse, classification: Classification) {
        self.outcomes.push(CourseOutcome {
            course,
            classification,
        });
    }

    #[must_use]
    pub fn outcomes(&self) -> &[CourseOutcome] {
        &self.outcomes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    #[must_use]
    pub fn count(&self, classification: Classification) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.classification == classification)
            .count()
    }

    /// Fold the run's results into the persistent store.
    ///
    /// Settled courses become blanket entries, tokens that proved paid are kept
    /// as specific entries, and errors or enrollable results are left out so
    /// the next run sees them again.
    pub fn merge_into(&self, store: &mut CourseStore) -> Result<(), TypeFault> {
        for outcome in &self.outcomes {
            let entry = match outcome.classification {
                Classification::Enrolled | Classification::ToBlacklist => {
                    CourseRef::Blanket(outcome.course.to_blanket())
                }
                Classification::Paid => CourseRef::Specific(outcome.course.clone()),
                Classification::Enrollable | Classification::Error => continue,
            };
            store.add(entry)?;
        }
        Ok(())
    }
}

impl IntoIterator for RunReport {
    type Item = CourseOutcome;
    type IntoIter = std::vec::IntoIter<CourseOutcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.into_iter()
    }
}
