use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use pw_core::{
    AggregationRequest, AggregationResult, Error, Paper, Result, TopicFailure, TopicQuery,
};

use crate::sources::PaperSource;

/// Fans a request out across sources and topics, then merges, date-filters,
/// deduplicates, and groups the result.
pub struct Aggregator {
    sources: Vec<Arc<dyn PaperSource>>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    pub fn with_sources(sources: Vec<Arc<dyn PaperSource>>) -> Self {
        Self { sources }
    }

    pub fn add_source(&mut self, source: Arc<dyn PaperSource>) {
        self.sources.push(source);
    }

    pub async fn aggregate(&self, request: &AggregationRequest) -> Result<AggregationResult> {
        // Fan out, then merge strictly in source-registration order and
        // request-topic order. Completion order never decides dedup ties.
        let mut batches: Vec<(String, Result<Vec<Paper>>)> = Vec::new();
        for source in &self.sources {
            if source.supports_combined_query() {
                let label = format!("{}:{}", source.name(), join_topic_names(&request.topics));
                let outcome = source
                    .search(&request.topics, &request.range, request.max_results)
                    .await;
                batches.push((label, outcome));
            } else {
                let calls = request.topics.iter().map(|topic| {
                    source.search(
                        std::slice::from_ref(topic),
                        &request.range,
                        request.max_results,
                    )
                });
                let outcomes = join_all(calls).await;
                for (topic, outcome) in request.topics.iter().zip(outcomes) {
                    batches.push((format!("{}:{}", source.name(), topic), outcome));
                }
            }
        }

        let total_queries = batches.len();
        let mut failures: Vec<TopicFailure> = Vec::new();
        let mut merged: Vec<Paper> = Vec::new();
        for (label, outcome) in batches {
            match outcome {
                Ok(papers) => merged.extend(papers),
                Err(e) => {
                    warn!("⚠️ Query {} failed: {}", label, e);
                    failures.push(TopicFailure {
                        topic: label,
                        message: e.to_string(),
                    });
                }
            }
        }
        if total_queries > 0 && failures.len() == total_queries {
            return Err(Error::AllSourcesFailed(format!(
                "all {} queries failed",
                total_queries
            )));
        }

        // Providers may filter coarsely; the range invariant is enforced here.
        merged.retain(|p| request.range.contains(p.published));

        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut papers: Vec<Paper> = Vec::new();
        for paper in merged {
            let key = (paper.source.clone(), paper.canonical_id.clone());
            if seen.insert(key) {
                papers.push(paper);
            }
        }

        // Grouping is by exact category membership, not query provenance;
        // free-text matches stay in the full set only.
        let by_topic: Vec<(String, Vec<Paper>)> = request
            .topics
            .iter()
            .map(|topic| {
                let group: Vec<Paper> = papers
                    .iter()
                    .filter(|p| p.has_category(topic.as_str()))
                    .cloned()
                    .collect();
                (topic.as_str().to_string(), group)
            })
            .collect();

        info!(
            "📚 Aggregated {} papers across {} topics ({} failed queries)",
            papers.len(),
            request.topics.len(),
            failures.len()
        );
        Ok(AggregationResult {
            by_topic,
            papers,
            failures,
        })
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

fn join_topic_names(topics: &[TopicQuery]) -> String {
    topics
        .iter()
        .map(|t| t.as_str().to_string())
        .collect::<Vec<_>>()
        .join(",")
}
