//! Academic abstracts from the arXiv Atom API.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use quick_xml::events::Event;

use learning_harness_core::models::{Category, SourceDocument};

use super::ResearchSource;

pub struct ArxivSource {
    client: reqwest::Client,
    url: String,
    max_results: usize,
}

impl ArxivSource {
    pub fn new(client: reqwest::Client, url: &str, max_results: usize) -> Self {
        Self {
            client,
            url: url.to_string(),
            max_results,
        }
    }
}

#[async_trait]
impl ResearchSource for ArxivSource {
    fn name(&self) -> &str {
        "arxiv"
    }

    fn category(&self) -> Category {
        Category::Academic
    }

    async fn fetch(&self, topic: &str) -> Result<Vec<SourceDocument>> {
        let search_query = format!("all:{}", topic);
        let max_results = self.max_results.to_string();
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("search_query", search_query.as_str()),
                ("start", "0"),
                ("max_results", max_results.as_str()),
            ])
            .send()
            .await
            .context("arXiv request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("arXiv returned {}", status);
        }

        let body = response.text().await.context("Failed to read arXiv response")?;
        let mut docs = parse_atom_feed(&body)?;
        docs.truncate(self.max_results);
        Ok(docs)
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    None,
    Id,
    Summary,
}

/// Extract `(entry/id, entry/summary)` pairs from an Atom feed.
///
/// Feed-level `<id>` elements are ignored; summary whitespace is collapsed.
pub fn parse_atom_feed(xml: &str) -> Result<Vec<SourceDocument>> {
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut docs = Vec::new();
    let mut in_entry = false;
    let mut field = Field::None;
    let mut id = String::new();
    let mut summary = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"entry" => {
                    in_entry = true;
                    id.clear();
                    summary.clear();
                }
                b"id" if in_entry => field = Field::Id,
                b"summary" if in_entry => field = Field::Summary,
                _ => {}
            },
            Ok(Event::Text(te)) => {
                let text = te.unescape().unwrap_or_default();
                match field {
                    Field::Id => id.push_str(&text),
                    Field::Summary => {
                        summary.push(' ');
                        summary.push_str(&text);
                    }
                    Field::None => {}
                }
            }
            Ok(Event::CData(cd)) => {
                if field == Field::Summary {
                    summary.push(' ');
                    summary.push_str(&String::from_utf8_lossy(&cd));
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"id" | b"summary" => field = Field::None,
                b"entry" => {
                    in_entry = false;
                    let text = summary.split_whitespace().collect::<Vec<_>>().join(" ");
                    docs.push(SourceDocument::new(id.trim(), text, Category::Academic));
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => bail!("Invalid arXiv feed at {}: {}", reader.buffer_position(), e),
            _ => {}
        }
    }

    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <id>http://arxiv.org/api/feed-id</id>
  <title>ArXiv Query</title>
  <entry>
    <id>http://arxiv.org/abs/2101.00001v1</id>
    <title>Qubits &amp; Gates</title>
    <summary>  Quantum gates act on
      qubits &amp; registers.
    </summary>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2101.00002v2</id>
    <summary>Error correction.</summary>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_entries() {
        let docs = parse_atom_feed(FEED).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].source_id, "http://arxiv.org/abs/2101.00001v1");
        assert_eq!(docs[0].text, "Quantum gates act on qubits & registers.");
        assert_eq!(docs[1].text, "Error correction.");
        assert!(docs.iter().all(|d| d.category == Category::Academic));
    }

    #[test]
    fn test_parse_empty_feed() {
        let docs = parse_atom_feed("<feed xmlns=\"http://www.w3.org/2005/Atom\"></feed>").unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_queries_all_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("search_query", "all:quantum"))
            .and(query_param("max_results", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
            .expect(1)
            .mount(&server)
            .await;

        let source = ArxivSource::new(reqwest::Client::new(), &server.uri(), 1);
        let docs = source.fetch("quantum").await.unwrap();
        assert_eq!(docs.len(), 1);
    }
}
