//! API.Bible client used for verse search and for the settings panel's bible picker

use crate::conf::Settings;
use crate::protocol::Version;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use thiserror::Error;

pub const API_BIBLE_BASE: &str = "https://api.scripture.api.bible/v1";

const SEARCH_LIMIT: &str = "10";

static MARKUP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("markup pattern"));

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("API.Bible key is not set.")]
    Credential,
    #[error("No Bible ID is set for {0}.")]
    Configuration(Version),
    #[error("API.Bible error {status}: {message}")]
    RemoteService { status: u16, message: String },
    #[error("API.Bible request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Invalid API.Bible URL: {0}")]
    Url(String),
}

/// One verse returned by a search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerseHit {
    pub reference: String,
    pub text: String,
}

/// A bible visible to the configured key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BibleSummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub abbreviation: Option<String>,
}

#[derive(Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    data: Option<SearchData>,
}

#[derive(Deserialize)]
struct SearchData {
    #[serde(default)]
    verses: Vec<RawVerse>,
}

#[derive(Deserialize)]
struct RawVerse {
    reference: Option<String>,
    text: Option<String>,
}

#[derive(Deserialize)]
struct BiblesEnvelope {
    #[serde(default)]
    data: Vec<BibleSummary>,
}

/// Remove inline markup and surrounding whitespace from verse text
pub fn strip_markup(text: &str) -> String {
    MARKUP.replace_all(text, "").trim().to_string()
}

fn hits_from(envelope: SearchEnvelope) -> Vec<VerseHit> {
    envelope
        .data
        .map(|data| data.verses)
        .unwrap_or_default()
        .into_iter()
        .map(|verse| VerseHit {
            reference: verse
                .reference
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| "Verse".to_string()),
            text: strip_markup(verse.text.as_deref().unwrap_or_default()),
        })
        .collect()
}

fn sort_bibles(mut bibles: Vec<BibleSummary>) -> Vec<BibleSummary> {
    bibles.sort_by(|a, b| a.name.cmp(&b.name));
    bibles
}

#[derive(Debug, Clone)]
pub struct BibleClient {
    http: reqwest::Client,
    base_url: String,
}

impl BibleClient {
    pub fn new() -> Self {
        Self::with_base_url(API_BIBLE_BASE)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Search `version` for `query`.
    ///
    /// The key is checked before the version mapping; both are reported as
    /// errors before any request is made.
    pub async fn search_verses(
        &self,
        settings: &Settings,
        version: Version,
        query: &str,
    ) -> Result<Vec<VerseHit>, SearchError> {
        let api_key = settings.api_bible_key.trim();
        if api_key.is_empty() {
            return Err(SearchError::Credential);
        }
        let bible_id = settings
            .bible_ids_by_version
            .get(version)
            .ok_or(SearchError::Configuration(version))?;

        let url = self.endpoint(&["bibles", bible_id, "search"])?;
        tracing::debug!(%version, %url, query, "searching API.Bible");

        let response = self
            .http
            .get(url)
            .header("api-key", api_key)
            .query(&[("query", query), ("limit", SEARCH_LIMIT), ("offset", "0")])
            .send()
            .await?;

        let envelope: SearchEnvelope = Self::read_json(response).await?;
        Ok(hits_from(envelope))
    }

    /// List every bible the key can see, sorted by name
    pub async fn list_bibles(&self, api_key: &str) -> Result<Vec<BibleSummary>, SearchError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(SearchError::Credential);
        }

        let url = self.endpoint(&["bibles"])?;
        let response = self.http.get(url).header("api-key", api_key).send().await?;

        let envelope: BiblesEnvelope = Self::read_json(response).await?;
        Ok(sort_bibles(envelope.data))
    }

    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url, SearchError> {
        let mut url =
            reqwest::Url::parse(&self.base_url).map_err(|e| SearchError::Url(e.to_string()))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| SearchError::Url(self.base_url.clone()))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, SearchError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SearchError::RemoteService {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }
}

impl Default for BibleClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with_key(key: &str) -> Settings {
        Settings {
            api_bible_key: key.to_string(),
            ..Settings::default()
        }
    }

    /// Answer one HTTP request with `status` and `body`, returning the request head
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}/v1", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.ends_with(b"\r\n\r\n") {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
            String::from_utf8(head).unwrap()
        });

        (base_url, handle)
    }

    fn mapped_settings() -> Settings {
        let mut settings = settings_with_key("abc");
        settings.bible_ids_by_version.set(Version::Nlt, "nlt-id");
        settings
    }

    #[tokio::test]
    async fn test_search_sends_key_and_paging() {
        let body = r#"{"data":{"query":"love","verses":[{"id":"JHN.3.16","reference":"John 3:16","text":"<p>For God so loved</p>"}]}}"#;
        let (base_url, server) = serve_once("200 OK", body).await;
        let client = BibleClient::with_base_url(base_url);

        let hits = client
            .search_verses(&mapped_settings(), Version::Nlt, "love")
            .await
            .unwrap();
        assert_eq!(
            hits,
            vec![VerseHit {
                reference: "John 3:16".to_string(),
                text: "For God so loved".to_string(),
            }]
        );

        let head = server.await.unwrap();
        let request_line = head.lines().next().unwrap();
        assert_eq!(
            request_line,
            "GET /v1/bibles/nlt-id/search?query=love&limit=10&offset=0 HTTP/1.1"
        );
        assert!(head.to_ascii_lowercase().contains("\r\napi-key: abc\r\n"));
    }

    #[tokio::test]
    async fn test_rejected_key_is_remote_service_error() {
        let (base_url, server) =
            serve_once("401 Unauthorized", r#"{"statusCode":401,"message":"Unauthorized"}"#).await;
        let client = BibleClient::with_base_url(base_url);

        let err = client
            .search_verses(&mapped_settings(), Version::Nlt, "love")
            .await
            .unwrap_err();
        match err {
            SearchError::RemoteService { status, message } => {
                assert_eq!(status, 401);
                assert!(message.contains("Unauthorized"));
            }
            other => panic!("expected remote service error, got {:?}", other),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_unmapped_version_is_configuration_error() {
        let client = BibleClient::with_base_url("http://127.0.0.1:9");
        let settings = settings_with_key("abc");

        let err = client
            .search_verses(&settings, Version::Nlt, "love")
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Configuration(Version::Nlt)));
    }

    #[tokio::test]
    async fn test_missing_key_is_credential_error() {
        let client = BibleClient::with_base_url("http://127.0.0.1:9");
        let mut settings = settings_with_key("   ");
        settings.bible_ids_by_version.set(Version::Nlt, "nlt-id");

        let err = client
            .search_verses(&settings, Version::Nlt, "love")
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Credential));

        let err = client.list_bibles("").await.unwrap_err();
        assert!(matches!(err, SearchError::Credential));
    }

    #[test]
    fn test_endpoint_encodes_bible_id() {
        let client = BibleClient::new();
        let url = client.endpoint(&["bibles", "abc def", "search"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.scripture.api.bible/v1/bibles/abc%20def/search"
        );

        let client = BibleClient::with_base_url("http://localhost:8080/v1/");
        let url = client.endpoint(&["bibles"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/v1/bibles");
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(
            strip_markup("  <p class=\"p\"><span data-number=\"16\" class=\"v\">16</span>For God</p> "),
            "16For God"
        );
        assert_eq!(strip_markup("plain"), "plain");
    }

    #[test]
    fn test_search_envelope_to_hits() {
        let json = serde_json::json!({
            "data": {
                "query": "love",
                "verses": [
                    { "id": "JHN.3.16", "reference": "John 3:16", "text": "<p>For God so loved</p>" },
                    { "id": "X", "text": "no reference" }
                ]
            }
        });
        let envelope: SearchEnvelope = serde_json::from_value(json).unwrap();
        let hits = hits_from(envelope);

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].reference, "John 3:16");
        assert_eq!(hits[0].text, "For God so loved");
        assert_eq!(hits[1].reference, "Verse");
    }

    #[test]
    fn test_empty_search_envelope() {
        let envelope: SearchEnvelope = serde_json::from_str("{\"data\":{}}").unwrap();
        assert!(hits_from(envelope).is_empty());
        let envelope: SearchEnvelope = serde_json::from_str("{}").unwrap();
        assert!(hits_from(envelope).is_empty());
    }

    #[test]
    fn test_bibles_sorted_by_name() {
        let json = serde_json::json!({
            "data": [
                { "id": "2", "name": "World English Bible", "abbreviation": "WEB" },
                { "id": "1", "name": "King James (Authorised) Version", "abbreviation": "engKJV" },
                { "id": "3", "name": "Free Bible Version" }
            ]
        });
        let envelope: BiblesEnvelope = serde_json::from_value(json).unwrap();
        let sorted = sort_bibles(envelope.data);
        let ids: Vec<_> = sorted.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, ["3", "1", "2"]);
        assert_eq!(sorted[0].abbreviation, None);
    }
}
