use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use tracing::warn;
use url::Url;

use pw_core::{DateRange, Error, Paper, Result, TopicQuery};

use super::{PaperSource, SourcePage};
use pw_core::ident;

pub const SOURCE_NAME: &str = "arxiv";
const DEFAULT_ENDPOINT: &str = "https://export.arxiv.org/api/query";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Adapter for the arXiv Atom API.
#[derive(Debug, Clone)]
pub struct ArxivSource {
    http: Client,
    endpoint: Url,
}

impl ArxivSource {
    pub fn new() -> Result<Self> {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| Error::Config(format!("invalid arxiv endpoint: {}", e)))?;
        let http = Client::builder()
            .user_agent("paperwatch/0.1")
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, endpoint })
    }

    async fn fetch_feed(&self, params: &[(&str, &str)]) -> Result<Vec<FeedEntry>> {
        let resp = self
            .http
            .get(self.endpoint.clone())
            .query(params)
            .send()
            .await
            .map_err(|e| Error::Transient(format!("arxiv request failed: {}", e)))?;

        let status = resp.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(Error::Transient(format!("arxiv responded HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(Error::MalformedResponse(format!(
                "arxiv responded HTTP {}",
                status
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| Error::Transient(format!("arxiv body read failed: {}", e)))?;
        parse_feed(&body)
    }
}

#[async_trait]
impl PaperSource for ArxivSource {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn supports_combined_query(&self) -> bool {
        true
    }

    /// Category codes get the `cat:` marker; free text passes through.
    fn build_query(&self, topics: &[TopicQuery]) -> String {
        topics
            .iter()
            .map(|t| {
                if t.is_category() {
                    format!("cat:{}", t.as_str())
                } else {
                    t.as_str().to_string()
                }
            })
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
        let start = cursor.to_string();
        let max_results = page_size.to_string();
        let entries = self
            .fetch_feed(&[
                ("search_query", query),
                ("start", &start),
                ("max_results", &max_results),
                ("sortBy", "submittedDate"),
                ("sortOrder", "descending"),
            ])
            .await?;

        let fetched = entries.len();
        let all: Vec<Paper> = entries.into_iter().filter_map(entry_to_paper).collect();
        // Results come newest-first; once an entry predates the window,
        // no later page can contain anything in range.
        let past_window = all.iter().any(|p| p.published < range.start);
        let papers: Vec<Paper> = all
            .into_iter()
            .filter(|p| range.contains(p.published))
            .collect();
        let next = if fetched < page_size || past_window {
            None
        } else {
            Some(cursor + page_size)
        };
        Ok(SourcePage { papers, next })
    }

    async fn get_by_id(&self, raw_id: &str) -> Result<Option<Paper>> {
        let id = ident::normalize_arxiv(raw_id)?;
        let entries = self
            .fetch_feed(&[("id_list", id.as_str()), ("max_results", "1")])
            .await?;
        Ok(entries.into_iter().filter_map(entry_to_paper).next())
    }
}

#[derive(Debug, Default)]
struct FeedEntry {
    id_url: String,
    title: String,
    summary: String,
    published: String,
    authors: Vec<String>,
    categories: Vec<String>,
    pdf_url: Option<String>,
}

fn entry_to_paper(entry: FeedEntry) -> Option<Paper> {
    let canonical_id = match ident::normalize_arxiv(&entry.id_url) {
        Ok(id) => id,
        Err(e) => {
            warn!("arxiv entry with unusable id {:?}: {}", entry.id_url, e);
            return None;
        }
    };
    let published = match parse_entry_date(&entry.published) {
        Some(date) => date,
        None => {
            warn!(
                "arxiv entry {} with unusable date {:?}",
                canonical_id, entry.published
            );
            return None;
        }
    };
    let link = entry
        .pdf_url
        .unwrap_or_else(|| format!("https://arxiv.org/pdf/{}", canonical_id));
    Some(Paper {
        title: normalize_ws(&entry.title),
        abstract_text: normalize_ws(&entry.summary),
        authors: entry.authors,
        categories: entry.categories,
        published,
        link,
        canonical_id,
        source: SOURCE_NAME.to_string(),
    })
}

fn parse_entry_date(raw: &str) -> Option<NaiveDate> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.date_naive())
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip any namespace prefix from an element name.
fn local_name(raw: &[u8]) -> &[u8] {
    match raw.iter().position(|b| *b == b':') {
        Some(ix) => &raw[ix + 1..],
        None => raw,
    }
}

fn term_attribute(e: &quick_xml::events::BytesStart<'_>) -> Option<String> {
    for a in e.attributes().flatten() {
        if local_name(a.key.as_ref()) == b"term" {
            let v = String::from_utf8_lossy(&a.value).to_string();
            if !v.trim().is_empty() {
                return Some(v);
            }
        }
    }
    None
}

fn pdf_link_attribute(e: &quick_xml::events::BytesStart<'_>) -> Option<String> {
    let mut href = None;
    let mut typ = None;
    let mut title = None;
    for a in e.attributes().flatten() {
        let v = String::from_utf8_lossy(&a.value).to_string();
        match a.key.as_ref() {
            b"href" => href = Some(v),
            b"type" => typ = Some(v),
            b"title" => title = Some(v),
            _ => {}
        }
    }
    let is_pdf = typ.as_deref().map(|t| t.contains("pdf")).unwrap_or(false)
        || title
            .as_deref()
            .map(|t| t.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
    if is_pdf {
        href
    } else {
        None
    }
}

fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries: Vec<FeedEntry> = Vec::new();
    let mut cur = FeedEntry::default();
    let mut in_entry = false;
    let mut text_target: Option<&'static str> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match local_name(e.name().as_ref()) {
                b"entry" => {
                    in_entry = true;
                    cur = FeedEntry::default();
                    text_target = None;
                }
                b"id" if in_entry => text_target = Some("id"),
                b"title" if in_entry => text_target = Some("title"),
                b"summary" if in_entry => text_target = Some("summary"),
                b"published" if in_entry => text_target = Some("published"),
                b"name" if in_entry => text_target = Some("author"),
                b"category" if in_entry => {
                    if let Some(term) = term_attribute(&e) {
                        cur.categories.push(term);
                    }
                }
                b"link" if in_entry => {
                    if cur.pdf_url.is_none() {
                        cur.pdf_url = pdf_link_attribute(&e);
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => match local_name(e.name().as_ref()) {
                b"category" if in_entry => {
                    if let Some(term) = term_attribute(&e) {
                        cur.categories.push(term);
                    }
                }
                b"link" if in_entry => {
                    if cur.pdf_url.is_none() {
                        cur.pdf_url = pdf_link_attribute(&e);
                    }
                }
                _ => {}
            },
            Ok(Event::Text(t)) => {
                if let Some(target) = text_target.take() {
                    let txt = t.unescape().unwrap_or_default().to_string();
                    match target {
                        "id" => cur.id_url = txt,
                        "title" => cur.title = txt,
                        "summary" => cur.summary = txt,
                        "published" => cur.published = txt,
                        "author" => cur.authors.push(txt),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) => {
                if local_name(e.name().as_ref()) == b"entry" && in_entry {
                    in_entry = false;
                    entries.push(std::mem::take(&mut cur));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::MalformedResponse(format!(
                    "arxiv feed parse error: {}",
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <id>http://arxiv.org/abs/2401.12345v1</id>
    <published>2024-01-15T12:00:00Z</published>
    <title>  Windowed   Attention for
      Long Sequences </title>
    <summary>We study windowed attention.</summary>
    <author><name>A. Author</name></author>
    <author><name>B. Author</name></author>
    <category term="cs.CV" />
    <category term="cs.LG" />
    <link title="pdf" href="https://arxiv.org/pdf/2401.12345v1"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2401.67890v2</id>
    <published>2024-01-20T00:00:00Z</published>
    <title>Second Paper</title>
    <summary>Abstract two.</summary>
    <author><name>C. Author</name></author>
    <category term="cs.AI" />
  </entry>
</feed>
"#;

    #[test]
    fn test_parse_feed_extracts_entries() {
        let entries = parse_feed(SAMPLE).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id_url, "http://arxiv.org/abs/2401.12345v1");
        assert_eq!(entries[0].authors, vec!["A. Author", "B. Author"]);
        assert_eq!(entries[0].categories, vec!["cs.CV", "cs.LG"]);
        assert_eq!(
            entries[0].pdf_url.as_deref(),
            Some("https://arxiv.org/pdf/2401.12345v1")
        );
        assert_eq!(entries[1].categories, vec!["cs.AI"]);
    }

    #[test]
    fn test_entry_to_paper() {
        let entries = parse_feed(SAMPLE).unwrap();
        let paper = entry_to_paper(entries.into_iter().next().unwrap()).unwrap();
        assert_eq!(paper.canonical_id, "2401.12345v1");
        assert_eq!(paper.title, "Windowed Attention for Long Sequences");
        assert_eq!(
            paper.published,
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
        assert_eq!(paper.source, SOURCE_NAME);
        assert_eq!(paper.link, "https://arxiv.org/pdf/2401.12345v1");
    }

    #[test]
    fn test_entry_without_pdf_link_falls_back() {
        let entries = parse_feed(SAMPLE).unwrap();
        let paper = entry_to_paper(entries.into_iter().nth(1).unwrap()).unwrap();
        assert_eq!(paper.link, "https://arxiv.org/pdf/2401.67890v2");
    }

    #[test]
    fn test_entry_with_bad_date_is_skipped() {
        let entry = FeedEntry {
            id_url: "http://arxiv.org/abs/2401.11111".to_string(),
            published: "yesterday".to_string(),
            ..FeedEntry::default()
        };
        assert!(entry_to_paper(entry).is_none());
    }

    #[test]
    fn test_build_query_marks_categories() {
        let source = ArxivSource::new().unwrap();
        let topics = vec![
            TopicQuery::new("cs.CV"),
            TopicQuery::new("diffusion models"),
            TopicQuery::new("cs.AI"),
        ];
        assert_eq!(
            source.build_query(&topics),
            "cat:cs.CV OR diffusion models OR cat:cs.AI"
        );
    }

    #[test]
    fn test_malformed_feed_is_an_error() {
        assert!(parse_feed("<feed><entry></wrong></feed>").is_err());
    }
}
