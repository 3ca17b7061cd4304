//! Proxy crawler module for fetching candidate lists from vendor APIs
//!
//! This module provides functionality for:
//! - Paginating the geonode JSON API and persisting the accumulated list
//! - Downloading proxyscrape plain-text lists, one file per protocol
//! - Abstracting the HTTP transport behind [`ListEndpoint`]

use crate::proxy::models::{Candidate, ProxyType, UnknownProtocol, Vendor};
use crate::proxy::parser::ProxyParser;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default timeout for HTTP requests in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default user agent for HTTP requests
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const GEONODE_URL: &str =
    "https://proxylist.geonode.com/api/proxy-list?limit=200&sort_by=lastChecked&sort_type=desc";

const PROXYSCRAPE_URL: &str = "https://api.proxyscrape.com/v2/?request=getproxies";

/// Errors that abort a fetch
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    UnknownProtocol(#[from] UnknownProtocol),
    #[error("{} doesn't exist", .0.display())]
    DirNotFound(PathBuf),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid response body: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Status and body of a single GET
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub status: u16,
    pub body: String,
}

impl Page {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Transport used by the crawler to talk to vendor APIs
#[async_trait]
pub trait ListEndpoint: Send + Sync {
    async fn get(&self, url: &str) -> Result<Page, FetchError>;
}

/// [`ListEndpoint`] backed by a reqwest client
pub struct HttpEndpoint {
    client: Client,
}

impl HttpEndpoint {
    pub fn new(config: &CrawlerConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ListEndpoint for HttpEndpoint {
    async fn get(&self, url: &str) -> Result<Page, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(Page { status, body })
    }
}

/// Why a fetch loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The vendor returned an empty page, or every list was downloaded
    Exhausted,
    /// The vendor answered with a non-success status
    Status(u16),
}

/// Result of paginating the geonode API
#[derive(Debug, Clone)]
pub struct FetchReport {
    pub candidates: Vec<Candidate>,
    /// Pages that contributed candidates
    pub pages: usize,
    pub stop: StopReason,
}

/// Result of downloading proxyscrape lists
#[derive(Debug, Clone)]
pub struct ScrapeReport {
    /// Files written, in request order
    pub files: Vec<(String, PathBuf)>,
    pub stop: StopReason,
}

#[derive(Deserialize)]
struct GeonodeResponse {
    #[serde(default)]
    data: Vec<GeonodeRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeonodeRecord {
    ip: String,
    port: GeonodePort,
    #[serde(default)]
    protocols: Vec<String>,
    #[serde(default)]
    country: String,
    #[serde(default)]
    anonymity_level: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GeonodePort {
    Number(u64),
    Text(String),
}

impl GeonodeRecord {
    fn into_candidate(self) -> Option<Candidate> {
        let port = match &self.port {
            GeonodePort::Number(n) => u16::try_from(*n).ok(),
            GeonodePort::Text(s) => s.trim().parse::<u16>().ok(),
        }
        .filter(|port| *port != 0);

        let Some(port) = port else {
            log::warn!("skipping {} with invalid port", self.ip);
            return None;
        };

        let protocols = self
            .protocols
            .iter()
            .filter_map(|p| match p.parse::<ProxyType>() {
                Ok(t) => Some(t),
                Err(e) => {
                    log::warn!("{} for {}:{}", e, self.ip, port);
                    None
                }
            })
            .collect();

        Some(
            Candidate::new(self.ip, port)
                .with_protocols(protocols)
                .with_location(self.country, self.anonymity_level),
        )
    }
}

/// Configuration for proxy crawler
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Timeout for HTTP requests
    pub timeout: Duration,
    /// User agent for HTTP requests
    pub user_agent: String,
    /// Geonode list endpoint, without the page and protocol parameters
    pub geonode_url: String,
    /// Proxyscrape list endpoint, without the protocol parameters
    pub proxyscrape_url: String,
    /// First geonode page to request
    pub start_page: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            geonode_url: GEONODE_URL.to_string(),
            proxyscrape_url: PROXYSCRAPE_URL.to_string(),
            start_page: 1,
        }
    }
}

impl CrawlerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub fn with_start_page(mut self, start_page: u32) -> Self {
        self.start_page = start_page;
        self
    }
}

/// Proxy crawler for fetching candidate lists
pub struct ProxyCrawler<E: ListEndpoint = HttpEndpoint> {
    config: CrawlerConfig,
    endpoint: E,
}

impl ProxyCrawler<HttpEndpoint> {
    /// Create a new proxy crawler with default configuration
    pub fn new() -> Result<Self, FetchError> {
        Self::with_config(CrawlerConfig::default())
    }

    /// Create a new proxy crawler with custom configuration
    pub fn with_config(config: CrawlerConfig) -> Result<Self, FetchError> {
        let endpoint = HttpEndpoint::new(&config)?;
        Ok(Self { config, endpoint })
    }
}

impl<E: ListEndpoint> ProxyCrawler<E> {
    /// Create a crawler around an existing endpoint
    pub fn with_endpoint(config: CrawlerConfig, endpoint: E) -> Self {
        Self { config, endpoint }
    }

    /// File name a proxyscrape list is stored under
    pub fn proxyscrape_file_name(label: &str) -> String {
        format!("proxyspace-{}-proxies.txt", label)
    }

    fn geonode_page_url(&self, page: u32, protocols: &[ProxyType]) -> String {
        let mut url = format!("{}&page={}", self.config.geonode_url, page);
        if !protocols.is_empty() {
            let joined = protocols
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("%2c");
            url.push_str("&protocols=");
            url.push_str(&joined);
        }
        url
    }

    fn proxyscrape_url(&self, label: &str) -> String {
        format!(
            "{}&protocol={}&timeout=10000&country=all&ssl=all&anonymity=all",
            self.config.proxyscrape_url, label
        )
    }

    /// Page through the geonode API until it runs dry.
    ///
    /// The accumulated list is rewritten to `output` after every page, so an
    /// upstream failure leaves the pages fetched so far on disk.
    pub async fn fetch_geonode<S: AsRef<str>>(
        &self,
        output: &Path,
        protocols: &[S],
    ) -> Result<FetchReport, FetchError> {
        let wanted = Vendor::Geonode.parse_protocols(protocols)?;

        let mut candidates: Vec<Candidate> = Vec::new();
        let mut page = self.config.start_page;
        let mut pages = 0;

        let stop = loop {
            let url = self.geonode_page_url(page, &wanted);
            log::debug!("GET {}", url);

            let response = self.endpoint.get(&url).await?;
            if !response.is_success() {
                println!("Request failed with status code {}", response.status);
                break StopReason::Status(response.status);
            }

            let body: GeonodeResponse = serde_json::from_str(&response.body)?;
            if body.data.is_empty() {
                break StopReason::Exhausted;
            }

            candidates.extend(body.data.into_iter().filter_map(GeonodeRecord::into_candidate));
            ProxyParser::save_json(&candidates, output)?;
            pages += 1;
            println!("Fetched {} IPS", candidates.len());

            page += 1;
        };

        log::info!(
            "geonode fetch finished after {} pages with {} candidates ({:?})",
            pages,
            candidates.len(),
            stop
        );

        Ok(FetchReport {
            candidates,
            pages,
            stop,
        })
    }

    /// Download one proxyscrape list per protocol into `dir`.
    ///
    /// Without protocols a single `all` list is downloaded. A non-success
    /// status skips the remaining lists.
    pub async fn fetch_proxyscrape<S: AsRef<str>>(
        &self,
        dir: &Path,
        protocols: &[S],
    ) -> Result<ScrapeReport, FetchError> {
        let wanted = Vendor::Proxyscrape.parse_protocols(protocols)?;
        if !dir.is_dir() {
            return Err(FetchError::DirNotFound(dir.to_path_buf()));
        }

        let labels: Vec<String> = if wanted.is_empty() {
            vec!["all".to_string()]
        } else {
            wanted.iter().map(ToString::to_string).collect()
        };

        let mut files = Vec::with_capacity(labels.len());
        for label in labels {
            let url = self.proxyscrape_url(&label);
            log::debug!("GET {}", url);

            let response = self.endpoint.get(&url).await?;
            if !response.is_success() {
                println!(
                    "Request failed while fetching {} proxies with status code {}",
                    label, response.status
                );
                return Ok(ScrapeReport {
                    files,
                    stop: StopReason::Status(response.status),
                });
            }

            let path = dir.join(Self::proxyscrape_file_name(&label));
            fs::write(&path, &response.body)?;
            println!("Fetched {} proxies", label);
            files.push((label, path));
        }

        Ok(ScrapeReport {
            files,
            stop: StopReason::Exhausted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned pages and records requested URLs
    struct ScriptedEndpoint {
        pages: Mutex<VecDeque<Page>>,
        urls: Mutex<Vec<String>>,
    }

    impl ScriptedEndpoint {
        fn new(pages: Vec<Page>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                urls: Mutex::new(Vec::new()),
            }
        }

        fn urls(&self) -> Vec<String> {
            self.urls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ListEndpoint for ScriptedEndpoint {
        async fn get(&self, url: &str) -> Result<Page, FetchError> {
            self.urls.lock().unwrap().push(url.to_string());
            Ok(self
                .pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Page::new(200, r#"{"data": []}"#)))
        }
    }

    /// Records are `(ip, port, comma separated protocols)`
    fn geonode_page(records: &[(&str, &str, &str)]) -> Page {
        let data: Vec<_> = records
            .iter()
            .map(|(ip, port, protocols)| {
                let protocols: Vec<&str> = protocols.split(',').collect();
                serde_json::json!({
                    "_id": "x",
                    "ip": ip,
                    "port": port,
                    "protocols": protocols,
                    "country": "US",
                    "anonymityLevel": "elite",
                    "upTime": 99.5
                })
            })
            .collect();
        Page::new(200, serde_json::json!({ "data": data, "total": 1000 }).to_string())
    }

    fn crawler(pages: Vec<Page>) -> ProxyCrawler<ScriptedEndpoint> {
        ProxyCrawler::with_endpoint(CrawlerConfig::default(), ScriptedEndpoint::new(pages))
    }

    #[test]
    fn test_crawler_config_default() {
        let config = CrawlerConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.start_page, 1);
    }

    #[test]
    fn test_crawler_config_builder() {
        let config = CrawlerConfig::new()
            .with_timeout(Duration::from_secs(60))
            .with_user_agent("Custom Agent".to_string())
            .with_start_page(3);

        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.user_agent, "Custom Agent");
        assert_eq!(config.start_page, 3);
    }

    #[test]
    fn test_geonode_page_url() {
        let crawler = crawler(vec![]);
        assert_eq!(
            crawler.geonode_page_url(2, &[]),
            format!("{}&page=2", GEONODE_URL)
        );
        assert_eq!(
            crawler.geonode_page_url(1, &[ProxyType::Socks4, ProxyType::Socks5]),
            format!("{}&page=1&protocols=socks4%2csocks5", GEONODE_URL)
        );
    }

    #[test]
    fn test_geonode_record_conversion() {
        let record: GeonodeRecord = serde_json::from_value(serde_json::json!({
            "ip": "1.2.3.4",
            "port": "8080",
            "protocols": ["http", "carrier-pigeon"],
            "country": "JP",
            "anonymityLevel": "transparent"
        }))
        .unwrap();
        let candidate = record.into_candidate().unwrap();
        assert_eq!(candidate.port, 8080);
        assert_eq!(candidate.protocols, vec![ProxyType::Http]);
        assert_eq!(candidate.country, "JP");
        assert_eq!(candidate.anonymity_level, "transparent");

        let record: GeonodeRecord =
            serde_json::from_value(serde_json::json!({"ip": "1.2.3.4", "port": 70000})).unwrap();
        assert!(record.into_candidate().is_none());
    }

    #[tokio::test]
    async fn test_fetch_geonode_until_empty_page() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("geonode.json");
        let crawler = crawler(vec![
            geonode_page(&[("1.1.1.1", "80", "http"), ("2.2.2.2", "1080", "socks5")]),
            geonode_page(&[("3.3.3.3", "3128", "https"), ("1.1.1.1", "80", "http")]),
            Page::new(200, r#"{"data": []}"#),
        ]);

        let report = crawler.fetch_geonode(&output, &["HTTP", "socks5"]).await.unwrap();
        assert_eq!(report.stop, StopReason::Exhausted);
        assert_eq!(report.pages, 2);
        // duplicates across pages are kept
        assert_eq!(report.candidates.len(), 4);

        let urls = crawler.endpoint.urls();
        assert_eq!(urls.len(), 3);
        assert!(urls[0].ends_with("&page=1&protocols=http%2csocks5"));
        assert!(urls[2].contains("&page=3"));

        let saved = ProxyParser::parse_json(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(saved, report.candidates);
    }

    #[tokio::test]
    async fn test_fetch_geonode_stops_on_status() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("geonode.json");
        let crawler = crawler(vec![
            geonode_page(&[("1.1.1.1", "80", "http")]),
            Page::new(429, "slow down"),
            geonode_page(&[("9.9.9.9", "80", "http")]),
        ]);

        let report = crawler.fetch_geonode::<&str>(&output, &[]).await.unwrap();
        assert_eq!(report.stop, StopReason::Status(429));
        assert_eq!(report.pages, 1);
        assert_eq!(crawler.endpoint.urls().len(), 2);

        let saved = ProxyParser::parse_json(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].host, "1.1.1.1");
    }

    #[tokio::test]
    async fn test_fetch_geonode_starts_at_configured_page() {
        let dir = tempfile::tempdir().unwrap();
        let crawler = ProxyCrawler::with_endpoint(
            CrawlerConfig::new().with_start_page(5),
            ScriptedEndpoint::new(vec![]),
        );

        let report = crawler
            .fetch_geonode::<&str>(&dir.path().join("out.json"), &[])
            .await
            .unwrap();
        assert_eq!(report.pages, 0);
        assert!(crawler.endpoint.urls()[0].ends_with("&page=5"));
        assert!(!dir.path().join("out.json").exists());
    }

    #[tokio::test]
    async fn test_fetch_geonode_rejects_unknown_protocol() {
        let dir = tempfile::tempdir().unwrap();
        let crawler = crawler(vec![]);

        let err = crawler
            .fetch_geonode(&dir.path().join("out.json"), &["socks6"])
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::UnknownProtocol(_)));
        assert!(crawler.endpoint.urls().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_proxyscrape_writes_one_file_per_protocol() {
        let dir = tempfile::tempdir().unwrap();
        let crawler = crawler(vec![
            Page::new(200, "1.1.1.1:80\r\n2.2.2.2:8080\r\n"),
            Page::new(200, "3.3.3.3:1080\r\n"),
        ]);

        let report = crawler
            .fetch_proxyscrape(dir.path(), &["http", "socks5"])
            .await
            .unwrap();
        assert_eq!(report.stop, StopReason::Exhausted);
        assert_eq!(report.files.len(), 2);
        assert_eq!(report.files[1].0, "socks5");

        let socks = dir.path().join("proxyspace-socks5-proxies.txt");
        assert_eq!(report.files[1].1, socks);
        assert_eq!(fs::read_to_string(socks).unwrap(), "3.3.3.3:1080\r\n");

        let urls = crawler.endpoint.urls();
        assert!(urls[0].contains("&protocol=http&timeout=10000"));
        assert!(urls[1].contains("&protocol=socks5&"));
    }

    #[tokio::test]
    async fn test_fetch_proxyscrape_all_and_status() {
        let dir = tempfile::tempdir().unwrap();
        let crawler = crawler(vec![Page::new(503, "")]);

        let report = crawler.fetch_proxyscrape::<&str>(dir.path(), &[]).await.unwrap();
        assert_eq!(report.stop, StopReason::Status(503));
        assert!(report.files.is_empty());
        assert!(crawler.endpoint.urls()[0].contains("&protocol=all&"));
        assert!(!dir.path().join("proxyspace-all-proxies.txt").exists());
    }

    #[tokio::test]
    async fn test_fetch_proxyscrape_validation() {
        let dir = tempfile::tempdir().unwrap();
        let crawler = crawler(vec![]);

        let err = crawler
            .fetch_proxyscrape(dir.path(), &["https"])
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::UnknownProtocol(_)));

        let err = crawler
            .fetch_proxyscrape(&dir.path().join("missing"), &["http"])
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::DirNotFound(_)));
        assert!(crawler.endpoint.urls().is_empty());
    }
}
