use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Canonical paper record, normalized from whatever shape a provider returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    /// Stable identifier within the source namespace (bare arXiv ID or DOI).
    pub canonical_id: String,
    pub title: String,
    pub abstract_text: String,
    /// Source-provided order, preserved for "first N et al." truncation.
    pub authors: Vec<String>,
    pub categories: Vec<String>,
    pub published: NaiveDate,
    pub link: String,
    /// Name of the adapter that produced the record; canonical IDs are
    /// only unique per source.
    pub source: String,
}

impl Paper {
    pub fn dedup_key(&self) -> (&str, &str) {
        (&self.source, &self.canonical_id)
    }

    pub fn has_category(&self, tag: &str) -> bool {
        self.categories.iter().any(|c| c == tag)
    }
}

/// A provider category code ("cs.CV") or a free-text search term,
/// distinguished syntactically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicQuery(String);

impl TopicQuery {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Category codes carry a namespace separator; everything else is free text.
    pub fn is_category(&self) -> bool {
        self.0.contains('.')
    }
}

impl From<&str> for TopicQuery {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl std::fmt::Display for TopicQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inclusive calendar-date bound. Time of day never matters here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidRange(format!(
                "start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn single_day(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

/// One aggregation cycle's input. Built per delivery cycle, consumed once.
#[derive(Debug, Clone)]
pub struct AggregationRequest {
    pub topics: Vec<TopicQuery>,
    pub range: DateRange,
    /// Caps the per-query source fetch, not the post-dedup output size.
    pub max_results: usize,
}

#[derive(Debug, Clone)]
pub struct TopicFailure {
    pub topic: String,
    pub message: String,
}

/// Deduplicated papers plus per-topic groups, ordered by the request's
/// topic order. Owned by the caller that issued the request.
#[derive(Debug, Clone, Default)]
pub struct AggregationResult {
    pub by_topic: Vec<(String, Vec<Paper>)>,
    pub papers: Vec<Paper>,
    pub failures: Vec<TopicFailure>,
}

impl AggregationResult {
    pub fn is_empty(&self) -> bool {
        self.papers.is_empty()
    }

    pub fn topic_papers(&self, topic: &str) -> Option<&[Paper]> {
        self.by_topic
            .iter()
            .find(|(t, _)| t == topic)
            .map(|(_, papers)| papers.as_slice())
    }
}
