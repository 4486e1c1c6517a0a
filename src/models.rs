use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sentiment label assigned to a review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Negative,
}

impl Sentiment {
    /// The stored string form ("Positive" / "Negative")
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "Positive",
            Sentiment::Negative => "Negative",
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A movie as listed by the catalog and referenced by reviews
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movie {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img: Option<String>,
}

impl Movie {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            overview: None,
            img: None,
        }
    }
}

/// A persisted movie review with its derived sentiment
///
/// Collections written before ids existed deserialize with a fresh id; the
/// id becomes durable on the next rewrite of the collection file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub movie: Movie,
    #[serde(rename = "review")]
    pub text: String,
    pub sentiment: Sentiment,
    pub timestamp: DateTime<Utc>,
}

/// Input for a new review; sentiment and timestamp are assigned by the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewDraft {
    pub movie: Movie,
    #[serde(rename = "review")]
    pub text: String,
}

/// Conjunctive listing filters; an absent field matches every review
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewFilter {
    /// Sentiment label, compared case-insensitively
    pub sentiment: Option<String>,
    /// Exact movie title, compared case-insensitively
    #[serde(alias = "movieTitle")]
    pub movie: Option<String>,
}

impl ReviewFilter {
    pub fn is_empty(&self) -> bool {
        self.sentiment.is_none() && self.movie.is_none()
    }

    /// Check whether a review satisfies every present filter field
    pub fn matches(&self, review: &Review) -> bool {
        if let Some(ref sentiment) = self.sentiment {
            if !review.sentiment.as_str().eq_ignore_ascii_case(sentiment) {
                return false;
            }
        }
        if let Some(ref title) = self.movie {
            if !review.movie.title.eq_ignore_ascii_case(title) {
                return false;
            }
        }
        true
    }
}
