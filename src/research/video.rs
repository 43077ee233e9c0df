//! Best-effort single video transcript.
//!
//! Searches for lecture videos on the topic, then walks the candidates in
//! order and keeps the first one with a non-empty transcript. Every
//! per-candidate failure (missing link, malformed URL, unrecognized host,
//! no transcript, API error) is logged and the next candidate is tried.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use quick_xml::events::Event;
use reqwest::Url;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, info, warn};

use learning_harness_core::models::{Category, SourceDocument};

use super::ResearchSource;

/// A video returned by a video search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoCandidate {
    pub link: Option<String>,
    pub title: Option<String>,
}

#[async_trait]
pub trait VideoSearch: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<VideoCandidate>>;
}

#[async_trait]
pub trait TranscriptFetcher: Send + Sync {
    /// Full transcript text for a video id. Empty when the video has none.
    async fn transcript(&self, video_id: &str) -> Result<String>;
}

pub struct VideoTranscriptSource {
    search: Arc<dyn VideoSearch>,
    transcripts: Arc<dyn TranscriptFetcher>,
    candidates: usize,
}

impl VideoTranscriptSource {
    pub fn new(
        search: Arc<dyn VideoSearch>,
        transcripts: Arc<dyn TranscriptFetcher>,
        candidates: usize,
    ) -> Self {
        Self {
            search,
            transcripts,
            candidates,
        }
    }

    async fn try_candidate(&self, candidate: &VideoCandidate) -> Result<SourceDocument> {
        let link = candidate
            .link
            .as_deref()
            .filter(|l| !l.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("candidate has no link"))?;
        let video_id = extract_video_id(link)?;
        let text = self
            .transcripts
            .transcript(&video_id)
            .await
            .with_context(|| format!("transcript fetch failed for {}", video_id))?;
        if text.trim().is_empty() {
            bail!("no transcript available for {}", video_id);
        }
        Ok(SourceDocument::new(link, text, Category::Video))
    }
}

#[async_trait]
impl ResearchSource for VideoTranscriptSource {
    fn name(&self) -> &str {
        "video-transcript"
    }

    fn category(&self) -> Category {
        Category::Video
    }

    async fn fetch(&self, topic: &str) -> Result<Vec<SourceDocument>> {
        let query = format!("{} lecture", topic);
        let candidates = self.search.search(&query, self.candidates).await?;
        debug!(count = candidates.len(), "video candidates found");

        for candidate in candidates.iter().take(self.candidates) {
            match self.try_candidate(candidate).await {
                Ok(doc) => {
                    info!(video = %doc.source_id, "using video transcript");
                    return Ok(vec![doc]);
                }
                Err(e) => {
                    warn!(link = ?candidate.link, error = %format!("{:#}", e), "skipping video");
                }
            }
        }

        Ok(Vec::new())
    }
}

/// Extract a YouTube video id from a watch or short link.
///
/// ```rust
/// use learning_harness::research::video::extract_video_id;
///
/// assert_eq!(extract_video_id("https://www.youtube.com/watch?v=abc123&t=9").unwrap(), "abc123");
/// assert_eq!(extract_video_id("https://youtu.be/abc123").unwrap(), "abc123");
/// assert!(extract_video_id("https://vimeo.com/1").is_err());
/// ```
pub fn extract_video_id(link: &str) -> Result<String> {
    let url = Url::parse(link).with_context(|| format!("malformed video URL: {}", link))?;
    let id = match url.host_str() {
        Some("www.youtube.com") | Some("youtube.com") | Some("m.youtube.com") => url
            .query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.into_owned()),
        Some("youtu.be") => Some(url.path().trim_start_matches('/').to_string()),
        other => bail!("unrecognized video host: {:?}", other),
    };
    match id {
        Some(id) if !id.is_empty() => Ok(id),
        _ => bail!("no video id in {}", link),
    }
}

/// SerpAPI YouTube engine search.
pub struct SerpApiVideoSearch {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl SerpApiVideoSearch {
    pub fn new(client: reqwest::Client, url: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            url: url.to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl VideoSearch for SerpApiVideoSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<VideoCandidate>> {
        let Some(api_key) = &self.api_key else {
            bail!("SERPAPI_API_KEY not set");
        };
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("search_query", query),
                ("engine", "youtube"),
                ("api_key", api_key.as_str()),
            ])
            .send()
            .await
            .context("SerpAPI video search failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("SerpAPI returned {}: {}", status, body);
        }

        let json: serde_json::Value = response.json().await.context("Invalid SerpAPI JSON")?;
        Ok(parse_video_results(&json, limit))
    }
}

/// Read candidates from `video_results`, else `videos_results`, else the
/// first key whose name contains `video`.
pub fn parse_video_results(json: &serde_json::Value, limit: usize) -> Vec<VideoCandidate> {
    let Some(obj) = json.as_object() else {
        return Vec::new();
    };
    let list = obj
        .get("video_results")
        .or_else(|| obj.get("videos_results"))
        .or_else(|| {
            obj.iter()
                .find(|(k, _)| k.to_lowercase().contains("video"))
                .map(|(_, v)| v)
        });

    list.and_then(|l| l.as_array())
        .map(|items| {
            items
                .iter()
                .take(limit)
                .map(|item| VideoCandidate {
                    link: item.get("link").and_then(|v| v.as_str()).map(String::from),
                    title: item.get("title").and_then(|v| v.as_str()).map(String::from),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// YouTube timed-text transcripts.
pub struct YoutubeTranscripts {
    client: reqwest::Client,
    url: String,
    lang: String,
}

impl YoutubeTranscripts {
    pub fn new(client: reqwest::Client, url: &str, lang: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
            lang: lang.to_string(),
        }
    }
}

#[async_trait]
impl TranscriptFetcher for YoutubeTranscripts {
    async fn transcript(&self, video_id: &str) -> Result<String> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("v", video_id), ("lang", self.lang.as_str())])
            .send()
            .await
            .context("timedtext request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("timedtext returned {}", status);
        }
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(String::new());
        }
        parse_timedtext(&body)
    }
}

/// Join the `<text>` segments of a timed-text document with spaces.
///
/// Segment bodies are HTML-escaped inside the XML, so they are unescaped a
/// second time after XML decoding.
pub fn parse_timedtext(xml: &str) -> Result<String> {
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut segments: Vec<String> = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"text" => in_text = true,
            Ok(Event::End(e)) if e.local_name().as_ref() == b"text" => in_text = false,
            Ok(Event::Text(te)) if in_text => {
                let once = te.unescape().unwrap_or_default();
                let twice = quick_xml::escape::unescape(&once)
                    .unwrap_or(Cow::Borrowed(once.as_ref()))
                    .into_owned();
                let segment = twice.split_whitespace().collect::<Vec<_>>().join(" ");
                if !segment.is_empty() {
                    segments.push(segment);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => bail!("Invalid transcript XML: {}", e),
            _ => {}
        }
    }

    Ok(segments.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FixedSearch(Vec<VideoCandidate>);

    #[async_trait]
    impl VideoSearch for FixedSearch {
        async fn search(&self, _query: &str, limit: usize) -> Result<Vec<VideoCandidate>> {
            Ok(self.0.iter().take(limit).cloned().collect())
        }
    }

    struct FixedTranscripts {
        by_id: HashMap<&'static str, Result<&'static str, &'static str>>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TranscriptFetcher for FixedTranscripts {
        async fn transcript(&self, video_id: &str) -> Result<String> {
            self.calls.lock().unwrap().push(video_id.to_string());
            match self.by_id.get(video_id) {
                Some(Ok(t)) => Ok(t.to_string()),
                Some(Err(e)) => bail!("{}", e),
                None => Ok(String::new()),
            }
        }
    }

    fn candidate(link: Option<&str>) -> VideoCandidate {
        VideoCandidate {
            link: link.map(String::from),
            title: None,
        }
    }

    #[tokio::test]
    async fn test_falls_back_to_next_candidate() {
        let search = FixedSearch(vec![
            candidate(None),
            candidate(Some("https://vimeo.com/5")),
            candidate(Some("https://www.youtube.com/watch?v=broken")),
            candidate(Some("https://youtu.be/good")),
        ]);
        let transcripts = Arc::new(FixedTranscripts {
            by_id: HashMap::from([("broken", Err("disabled")), ("good", Ok("hello world"))]),
            calls: Mutex::new(Vec::new()),
        });
        let source = VideoTranscriptSource::new(Arc::new(search), transcripts.clone(), 4);

        let docs = source.fetch("Rust").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source_id, "https://youtu.be/good");
        assert_eq!(docs[0].text, "hello world");
        assert_eq!(*transcripts.calls.lock().unwrap(), vec!["broken", "good"]);
    }

    #[tokio::test]
    async fn test_stops_at_first_transcript() {
        let search = FixedSearch(vec![
            candidate(Some("https://youtu.be/one")),
            candidate(Some("https://youtu.be/two")),
        ]);
        let transcripts = Arc::new(FixedTranscripts {
            by_id: HashMap::from([("one", Ok("first")), ("two", Ok("second"))]),
            calls: Mutex::new(Vec::new()),
        });
        let source = VideoTranscriptSource::new(Arc::new(search), transcripts.clone(), 3);
        let docs = source.fetch("Rust").await.unwrap();
        assert_eq!(docs[0].text, "first");
        assert_eq!(transcripts.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_no_usable_candidate_is_empty_not_error() {
        let search = FixedSearch(vec![candidate(Some("https://youtu.be/silent"))]);
        let transcripts = Arc::new(FixedTranscripts {
            by_id: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        });
        let source = VideoTranscriptSource::new(Arc::new(search), transcripts, 3);
        assert!(source.fetch("Rust").await.unwrap().is_empty());
    }

    #[test]
    fn test_extract_video_id() {
        assert_eq!(
            extract_video_id("https://youtube.com/watch?feature=share&v=xyz").unwrap(),
            "xyz"
        );
        assert!(extract_video_id("not a url").is_err());
        assert!(extract_video_id("https://www.youtube.com/watch").is_err());
        assert!(extract_video_id("https://youtu.be/").is_err());
    }

    #[test]
    fn test_parse_video_results_key_fallback() {
        let primary = serde_json::json!({"video_results": [{"link": "a"}, {"link": "b"}]});
        assert_eq!(parse_video_results(&primary, 1).len(), 1);

        let alt = serde_json::json!({"videos_results": [{"link": "a"}]});
        assert_eq!(parse_video_results(&alt, 3)[0].link.as_deref(), Some("a"));

        let other = serde_json::json!({"search_metadata": {}, "movie_video_list": [{"title": "t"}]});
        let parsed = parse_video_results(&other, 3);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].link, None);

        assert!(parse_video_results(&serde_json::json!({"error": "x"}), 3).is_empty());
    }

    #[test]
    fn test_parse_timedtext() {
        let xml = r#"<?xml version="1.0" encoding="utf-8" ?><transcript><text start="0" dur="1.5">Hello &amp;#39;world&amp;#39;</text><text start="1.5" dur="2">second
line</text></transcript>"#;
        assert_eq!(parse_timedtext(xml).unwrap(), "Hello 'world' second line");
    }
}
