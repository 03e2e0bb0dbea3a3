//! The relay task between the async and blocking halves of the bridge.

use std::collections::HashSet;
use std::sync::{Arc, mpsc as blocking};

use autocoupons_types::{CourseRef, CourseStore, SpecificCourse};
use tokio::sync::mpsc;

use crate::QueueItem;

pub(crate) enum Inbound {
    Url(String),
    Close,
}

/// What the relay did with the URLs it received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub forwarded: usize,
    /// Already relayed earlier in this run.
    pub duplicates: usize,
    pub unparseable: usize,
    /// Course URLs without a discount token.
    pub bare: usize,
    /// Covered by the store loaded at startup.
    pub known: usize,
}

struct Admission<'a> {
    known: &'a CourseStore,
    seen: HashSet<SpecificCourse>,
    stats: RelayStats,
}

impl Admission<'_> {
    fn admit(&mut self, raw: &str) -> Option<SpecificCourse> {
        let course = match CourseRef::from_url(raw) {
            Some(CourseRef::Specific(course)) => course,
            Some(CourseRef::Bare { url_id }) => {
                tracing::debug!(%url_id, "Dropping course without a token");
                self.stats.bare += 1;
                return None;
            }
            Some(CourseRef::Blanket(_)) | None => {
                tracing::debug!(url = raw, "Dropping unparseable course URL");
                self.stats.unparseable += 1;
                return None;
            }
        };

        if self.known.contains_specific(&course) {
            tracing::debug!(%course, "Already settled in a previous run");
            self.stats.known += 1;
            return None;
        }
        if !self.seen.insert(course.clone()) {
            self.stats.duplicates += 1;
            return None;
        }
        Some(course)
    }
}

pub(crate) async fn run(
    mut rx: mpsc::UnboundedReceiver<Inbound>,
    out: blocking::Sender<QueueItem>,
    known: Arc<CourseStore>,
) -> RelayStats {
    let mut admission = Admission {
        known: &known,
        seen: HashSet::new(),
        stats: RelayStats::default(),
    };
    let mut consumer_gone = false;

    while let Some(message) = rx.recv().await {
        let raw = match message {
            Inbound::Url(raw) => raw,
            Inbound::Close => break,
        };
        let Some(course) = admission.admit(&raw) else {
            continue;
        };

        if consumer_gone {
            continue;
        }
        tracing::debug!(%course, "Relaying course");
        if out.send(QueueItem::Course(course)).is_err() {
            tracing::warn!("Enrollment worker is gone; discarding further courses");
            consumer_gone = true;
            continue;
        }
        admission.stats.forwarded += 1;
    }

    if !consumer_gone {
        let _ = out.send(QueueItem::End);
    }

    let stats = admission.stats;
    tracing::info!(
        forwarded = stats.forwarded,
        duplicates = stats.duplicates,
        known = stats.known,
        bare = stats.bare,
        unparseable = stats.unparseable,
        "Course relay finished"
    );
    stats
}
