//! Course references and their URL forms.
//!
//! A course is identified by the `url_id` segment of its canonical URL
//! (`https://www.udemy.com/course/<url_id>/`). Discount tokens travel in the
//! `couponCode` query parameter.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::{Url, form_urlencoded};

const COURSE_BASE: &str = "https://www.udemy.com/course/";
const COUPON_PARAM: &str = "couponCode";
const COURSE_HOSTS: [&str; 2] = ["udemy.com", "www.udemy.com"];

/// The stable identifier of a course, taken from its URL path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UrlId(String);

impl UrlId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UrlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UrlId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for UrlId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A course paired with one concrete discount token.
///
/// Identity is the `(url_id, token)` pair: the same course with two different
/// tokens is two different checkout URLs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpecificCourse {
    url_id: UrlId,
    token: String,
}

impl SpecificCourse {
    #[must_use]
    pub fn new(url_id: impl Into<UrlId>, token: impl Into<String>) -> Self {
        Self {
            url_id: url_id.into(),
            token: token.into(),
        }
    }

    #[must_use]
    pub fn url_id(&self) -> &UrlId {
        &self.url_id
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The URL that applies this course's token at checkout.
    #[must_use]
    pub fn checkout_url(&self) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair(COUPON_PARAM, &self.token)
            .finish();
        format!("{}?{query}", self.blanket_url())
    }

    /// The URL of the course without any token.
    ///
    /// Landing here after navigating to [`checkout_url`](Self::checkout_url)
    /// means the site dropped the token.
    #[must_use]
    pub fn blanket_url(&self) -> String {
        blanket_url(&self.url_id)
    }

    #[must_use]
    pub fn to_blanket(&self) -> BlanketCourse {
        BlanketCourse::new(self.url_id.clone())
    }
}

impl fmt::Display for SpecificCourse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}?{}", self.url_id, self.token)
    }
}

/// A course-level marker covering whatever discount currently exists.
///
/// Holding a `BlanketCourse` implies holding every [`SpecificCourse`] with the
/// same `url_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlanketCourse {
    url_id: UrlId,
}

impl BlanketCourse {
    #[must_use]
    pub fn new(url_id: impl Into<UrlId>) -> Self {
        Self {
            url_id: url_id.into(),
        }
    }

    #[must_use]
    pub fn url_id(&self) -> &UrlId {
        &self.url_id
    }

    #[must_use]
    pub fn url(&self) -> String {
        blanket_url(&self.url_id)
    }
}

impl fmt::Display for BlanketCourse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}?*", self.url_id)
    }
}

/// Any reference to a course that a source can produce.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CourseRef {
    /// A course with no discount token attached.
    Bare { url_id: UrlId },
    Specific(SpecificCourse),
    Blanket(BlanketCourse),
}

impl CourseRef {
    /// Parse a course URL into a reference.
    ///
    /// Returns `Specific` when the URL carries a non-empty `couponCode`,
    /// `Bare` otherwise, and `None` when the URL is not a course URL.
    #[must_use]
    pub fn from_url(raw: &str) -> Option<Self> {
        let url = parse_course_url(raw)?;
        let url_id = extract_url_id(&url)?;

        let token = url
            .query_pairs()
            .find(|(key, _)| key == COUPON_PARAM)
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty());

        Some(match token {
            Some(token) => Self::Specific(SpecificCourse { url_id, token }),
            None => Self::Bare { url_id },
        })
    }

    /// Parse a course URL into a `Blanket` reference, ignoring any token.
    #[must_use]
    pub fn blanket_from_url(raw: &str) -> Option<Self> {
        let url = parse_course_url(raw)?;
        extract_url_id(&url).map(|url_id| Self::Blanket(BlanketCourse { url_id }))
    }

    #[must_use]
    pub fn url_id(&self) -> &UrlId {
        match self {
            Self::Bare { url_id } => url_id,
            Self::Specific(course) => course.url_id(),
            Self::Blanket(course) => course.url_id(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bare { .. } => "bare",
            Self::Specific(_) => "specific",
            Self::Blanket(_) => "blanket",
        }
    }

    #[must_use]
    pub fn url(&self) -> String {
        match self {
            Self::Bare { url_id } => blanket_url(url_id),
            Self::Specific(course) => course.checkout_url(),
            Self::Blanket(course) => course.url(),
        }
    }
}

impl From<SpecificCourse> for CourseRef {
    fn from(course: SpecificCourse) -> Self {
        Self::Specific(course)
    }
}

impl From<BlanketCourse> for CourseRef {
    fn from(course: BlanketCourse) -> Self {
        Self::Blanket(course)
    }
}

impl fmt::Display for CourseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bare { url_id } => write!(f, "{url_id}"),
            Self::Specific(course) => course.fmt(f),
            Self::Blanket(course) => course.fmt(f),
        }
    }
}

fn blanket_url(url_id: &UrlId) -> String {
    format!("{COURSE_BASE}{url_id}/")
}

fn parse_course_url(raw: &str) -> Option<Url> {
    let ascii: String = raw.chars().filter(char::is_ascii).collect();
    let url = match Url::parse(ascii.trim()) {
        Ok(url) => url,
        Err(err) => {
            tracing::debug!(url = raw, error = %err, "Not a parseable URL");
            return None;
        }
    };

    if url
        .host_str()
        .is_none_or(|host| !COURSE_HOSTS.contains(&host))
    {
        tracing::debug!(url = raw, "Not a course host");
        return None;
    }

    Some(url)
}

fn extract_url_id(url: &Url) -> Option<UrlId> {
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    let first = segments.next()?;
    let id = if first == "course" {
        segments.next()?
    } else {
        first
    };

    Some(UrlId::new(id))
}
