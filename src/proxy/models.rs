//! Proxy data models

use crate::proxy::probe::ProbeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Proxy protocol enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProxyType {
    #[default]
    Http,
    Https,
    Socks4,
    Socks5,
}

impl fmt::Display for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyType::Http => write!(f, "http"),
            ProxyType::Https => write!(f, "https"),
            ProxyType::Socks4 => write!(f, "socks4"),
            ProxyType::Socks5 => write!(f, "socks5"),
        }
    }
}

/// Returned when a string is not one of the known proxy protocols
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid proxy type: {0}")]
pub struct ParseProxyTypeError(pub String);

impl FromStr for ProxyType {
    type Err = ParseProxyTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "http" => Ok(ProxyType::Http),
            "https" => Ok(ProxyType::Https),
            "socks4" => Ok(ProxyType::Socks4),
            "socks5" => Ok(ProxyType::Socks5),
            _ => Err(ParseProxyTypeError(s.to_string())),
        }
    }
}

/// A protocol name outside the vocabulary of a vendor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid protocol: {protocol}, valid protocols for {vendor} are: {valid}")]
pub struct UnknownProtocol {
    pub protocol: String,
    pub vendor: Vendor,
    pub valid: String,
}

/// On-disk layout of a candidate list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFormat {
    /// JSON array of candidate records
    Json,
    /// One `host:port` per line
    Text,
}

impl FromStr for ListFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ListFormat::Json),
            "text" | "txt" => Ok(ListFormat::Text),
            _ => Err(anyhow::anyhow!("Invalid list format: {}. Use: json, text", s)),
        }
    }
}

/// Layout of a line in the results file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultFormat {
    /// `host:port\t<protocols> <country> <anonymity>`
    Detailed,
    /// `host:port`
    Minimal,
}

/// Upstream proxy list service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Vendor {
    #[default]
    Geonode,
    Proxyscrape,
}

impl Vendor {
    /// Protocols the vendor knows about
    pub fn protocols(&self) -> &'static [ProxyType] {
        match self {
            Vendor::Geonode => &[
                ProxyType::Https,
                ProxyType::Http,
                ProxyType::Socks4,
                ProxyType::Socks5,
            ],
            Vendor::Proxyscrape => &[ProxyType::Http, ProxyType::Socks4, ProxyType::Socks5],
        }
    }

    /// Validate protocol names against the vendor vocabulary.
    ///
    /// Names are matched case-insensitively. Duplicates are dropped while
    /// keeping the order of first appearance.
    pub fn parse_protocols<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<Vec<ProxyType>, UnknownProtocol> {
        let mut parsed = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let proxy_type = name
                .parse::<ProxyType>()
                .ok()
                .filter(|t| self.protocols().contains(t))
                .ok_or_else(|| UnknownProtocol {
                    protocol: name.to_string(),
                    vendor: *self,
                    valid: self.vocabulary(),
                })?;
            if !parsed.contains(&proxy_type) {
                parsed.push(proxy_type);
            }
        }
        Ok(parsed)
    }

    fn vocabulary(&self) -> String {
        self.protocols()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Format the fetcher writes for this vendor
    pub fn list_format(&self) -> ListFormat {
        match self {
            Vendor::Geonode => ListFormat::Json,
            Vendor::Proxyscrape => ListFormat::Text,
        }
    }

    /// Format of the lines written for reachable candidates
    pub fn result_format(&self) -> ResultFormat {
        match self {
            Vendor::Geonode => ResultFormat::Detailed,
            Vendor::Proxyscrape => ResultFormat::Minimal,
        }
    }

    /// Default connect timeout used when filtering this vendor's lists
    pub fn default_timeout(&self) -> Duration {
        match self {
            Vendor::Geonode => Duration::from_secs(10),
            Vendor::Proxyscrape => Duration::from_secs(10),
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vendor::Geonode => write!(f, "geonode"),
            Vendor::Proxyscrape => write!(f, "proxyscrape"),
        }
    }
}

impl FromStr for Vendor {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "geonode" => Ok(Vendor::Geonode),
            "proxyscrape" => Ok(Vendor::Proxyscrape),
            _ => Err(anyhow::anyhow!(
                "Invalid vendor: {}. Use: geonode, proxyscrape",
                s
            )),
        }
    }
}

/// An unverified proxy endpoint taken from a vendor list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "ip")]
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub protocols: Vec<ProxyType>,
    #[serde(default)]
    pub country: String,
    #[serde(rename = "anonymityLevel", default)]
    pub anonymity_level: String,
}

impl Candidate {
    /// Create a candidate with no metadata
    pub fn new(host: String, port: u16) -> Self {
        Self {
            host,
            port,
            protocols: Vec::new(),
            country: String::new(),
            anonymity_level: String::new(),
        }
    }

    pub fn with_protocols(mut self, protocols: Vec<ProxyType>) -> Self {
        self.protocols = protocols;
        self
    }

    pub fn with_location(mut self, country: String, anonymity_level: String) -> Self {
        self.country = country;
        self.anonymity_level = anonymity_level;
        self
    }

    /// Get the candidate string in HOST:PORT format
    pub fn to_simple_string(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// True when the candidate advertises at least one of `wanted`
    pub fn supports_any(&self, wanted: &[ProxyType]) -> bool {
        self.protocols.iter().any(|p| wanted.contains(p))
    }

    /// Render the line written to the results file
    pub fn to_result_line(&self, format: ResultFormat) -> String {
        match format {
            ResultFormat::Minimal => self.to_simple_string(),
            ResultFormat::Detailed => {
                let protocols = self
                    .protocols
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "{}\t{} {} {}",
                    self.to_simple_string(),
                    protocols,
                    self.country,
                    self.anonymity_level
                )
            }
        }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_simple_string())
    }
}

/// Outcome of a single probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    Reachable,
    Unreachable(ProbeError),
}

/// Detailed result of probing a candidate
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub candidate: Candidate,
    pub status: ProbeStatus,
    pub response_time_ms: Option<u64>,
}

impl ProbeResult {
    pub fn reachable(candidate: Candidate, response_time_ms: u64) -> Self {
        Self {
            candidate,
            status: ProbeStatus::Reachable,
            response_time_ms: Some(response_time_ms),
        }
    }

    pub fn unreachable(candidate: Candidate, error: ProbeError) -> Self {
        Self {
            candidate,
            status: ProbeStatus::Unreachable(error),
            response_time_ms: None,
        }
    }

    pub fn is_reachable(&self) -> bool {
        matches!(self.status, ProbeStatus::Reachable)
    }

    /// The failure kind, if the probe failed
    pub fn error(&self) -> Option<&ProbeError> {
        match &self.status {
            ProbeStatus::Reachable => None,
            ProbeStatus::Unreachable(e) => Some(e),
        }
    }
}
