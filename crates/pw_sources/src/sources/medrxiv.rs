use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::warn;
use url::Url;

use pw_core::{DateRange, Error, Paper, Result, TopicQuery};

use super::{PaperSource, SourcePage};
use pw_core::ident;

pub const SOURCE_NAME: &str = "medrxiv";
const DEFAULT_ENDPOINT: &str = "https://api.medrxiv.org/papers";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Adapter for the medRxiv JSON API. Papers are identified by DOI.
#[derive(Debug, Clone)]
pub struct MedrxivSource {
    http: Client,
    endpoint: Url,
}

impl MedrxivSource {
    pub fn new() -> Result<Self> {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| Error::Config(format!("invalid medrxiv endpoint: {}", e)))?;
        let http = Client::builder()
            .user_agent("paperwatch/0.1")
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, endpoint })
    }

    async fn fetch_json(&self, url: Url, params: &[(&str, &str)]) -> Result<ApiResponse> {
        let resp = self
            .http
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| Error::Transient(format!("medrxiv request failed: {}", e)))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(ApiResponse::default());
        }
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(Error::Transient(format!(
                "medrxiv responded HTTP {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(Error::MalformedResponse(format!(
                "medrxiv responded HTTP {}",
                status
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| Error::Transient(format!("medrxiv body read failed: {}", e)))?;
        parse_response(&body)
    }
}

#[async_trait]
impl PaperSource for MedrxivSource {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn supports_combined_query(&self) -> bool {
        true
    }

    /// medRxiv has no category-marker syntax; everything joins verbatim.
    fn build_query(&self, topics: &[TopicQuery]) -> String {
        topics
            .iter()
            .map(|t| t.as_str().to_string())
            .collect::<Vec<_>>()
            .join(" OR ")
    }

    async fn fetch_page(
        &self,
        query: &str,
        range: &DateRange,
        cursor: usize,
        page_size: usize,
    ) -> Result<SourcePage> {
        let from_date = range.start.to_string();
        let to_date = range.end.to_string();
        let limit = page_size.to_string();
        let cursor_param = cursor.to_string();
        let response = self
            .fetch_json(
                self.endpoint.clone(),
                &[
                    ("q", query),
                    ("from_date", &from_date),
                    ("to_date", &to_date),
                    ("limit", &limit),
                    ("cursor", &cursor_param),
                    ("format", "json"),
                ],
            )
            .await?;

        let fetched = response.results.len();
        let papers: Vec<Paper> = response
            .results
            .into_iter()
            .filter_map(api_paper_to_paper)
            .filter(|p| range.contains(p.published))
            .collect();
        // The server-side range is an optimization only; a full page
        // means there may be more.
        let next = if fetched < page_size {
            None
        } else {
            Some(cursor + page_size)
        };
        Ok(SourcePage { papers, next })
    }

    async fn get_by_id(&self, raw_id: &str) -> Result<Option<Paper>> {
        let doi = ident::normalize_doi(raw_id)?;
        let url = Url::parse(&format!("{}/{}", self.endpoint, doi))
            .map_err(|e| Error::Config(format!("invalid medrxiv lookup url: {}", e)))?;
        let response = self.fetch_json(url, &[("format", "json")]).await?;
        Ok(response
            .results
            .into_iter()
            .filter_map(api_paper_to_paper)
            .next())
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    results: Vec<ApiPaper>,
}

#[derive(Debug, Deserialize)]
struct ApiPaper {
    #[serde(default)]
    title: String,
    #[serde(default, rename = "abstract")]
    abstract_text: String,
    #[serde(default)]
    doi: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    authors: Vec<ApiAuthor>,
    #[serde(default)]
    pdf_url: Option<String>,
    /// Either a single category string or a list, depending on the record.
    #[serde(default)]
    category: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiAuthor {
    #[serde(default)]
    name: String,
}

fn parse_response(body: &str) -> Result<ApiResponse> {
    serde_json::from_str(body)
        .map_err(|e| Error::MalformedResponse(format!("medrxiv payload: {}", e)))
}

fn categories_from_value(value: &serde_json::Value) -> Vec<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => vec![s.clone()],
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.to_string())
            .collect(),
        _ => Vec::new(),
    }
}

fn api_paper_to_paper(api: ApiPaper) -> Option<Paper> {
    if api.doi.is_empty() {
        warn!("medrxiv record without a doi, skipping");
        return None;
    }
    let canonical_id = match ident::normalize_doi(&api.doi) {
        Ok(id) => id,
        Err(e) => {
            warn!("medrxiv record with unusable doi {:?}: {}", api.doi, e);
            return None;
        }
    };
    let published = match NaiveDate::parse_from_str(api.date.trim(), "%Y-%m-%d") {
        Ok(date) => date,
        Err(_) => {
            warn!(
                "medrxiv record {} with unusable date {:?}",
                canonical_id, api.date
            );
            return None;
        }
    };
    let link = api
        .pdf_url
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| format!("https://www.medrxiv.org/content/{}.full.pdf", canonical_id));
    Some(Paper {
        title: api.title,
        abstract_text: api.abstract_text,
        authors: api
            .authors
            .into_iter()
            .map(|a| a.name)
            .filter(|n| !n.is_empty())
            .collect(),
        categories: categories_from_value(&api.category),
        published,
        link,
        canonical_id,
        source: SOURCE_NAME.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "results": [
            {
                "title": "Community Spread Dynamics",
                "abstract": "We model community spread.",
                "doi": "10.1101/2024.01.01.123456",
                "date": "2024-01-05",
                "authors": [{"name": "A. Author"}, {"name": "B. Author"}],
                "pdf_url": "https://www.medrxiv.org/content/10.1101/2024.01.01.123456.full.pdf",
                "category": "epidemiology"
            },
            {
                "title": "Second Study",
                "abstract": "Another abstract.",
                "doi": "10.1101/2024.01.02.654321",
                "date": "2024-01-06",
                "authors": [{"name": "C. Author"}],
                "category": ["infectious diseases", "public health"]
            }
        ]
    }"#;

    #[test]
    fn test_parse_response_and_convert() {
        let response = parse_response(SAMPLE).unwrap();
        assert_eq!(response.results.len(), 2);

        let papers: Vec<Paper> = response
            .results
            .into_iter()
            .filter_map(api_paper_to_paper)
            .collect();
        assert_eq!(papers.len(), 2);
        assert_eq!(papers[0].canonical_id, "10.1101/2024.01.01.123456");
        assert_eq!(papers[0].categories, vec!["epidemiology"]);
        assert_eq!(papers[0].authors, vec!["A. Author", "B. Author"]);
        assert_eq!(
            papers[0].published,
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
        );
        assert_eq!(
            papers[1].categories,
            vec!["infectious diseases", "public health"]
        );
    }

    #[test]
    fn test_missing_pdf_url_falls_back_to_content_link() {
        let response = parse_response(SAMPLE).unwrap();
        let paper = response
            .results
            .into_iter()
            .nth(1)
            .and_then(api_paper_to_paper)
            .unwrap();
        assert_eq!(
            paper.link,
            "https://www.medrxiv.org/content/10.1101/2024.01.02.654321.full.pdf"
        );
    }

    #[test]
    fn test_records_without_doi_or_date_are_skipped() {
        let body = r#"{"results": [
            {"title": "No doi", "date": "2024-01-05"},
            {"title": "No date", "doi": "10.1101/2024.01.03.111111"}
        ]}"#;
        let response = parse_response(body).unwrap();
        let papers: Vec<Paper> = response
            .results
            .into_iter()
            .filter_map(api_paper_to_paper)
            .collect();
        assert!(papers.is_empty());
    }

    #[test]
    fn test_build_query_joins_topics_verbatim() {
        let source = MedrxivSource::new().unwrap();
        let topics = vec![TopicQuery::new("COVID-19"), TopicQuery::new("long covid")];
        assert_eq!(source.build_query(&topics), "COVID-19 OR long covid");
    }

    #[test]
    fn test_malformed_payload_is_an_error() {
        assert!(matches!(
            parse_response("<html>teapot</html>"),
            Err(Error::MalformedResponse(_))
        ));
    }
}
