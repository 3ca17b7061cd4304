//! Candidate list parser for the text and JSON list formats

use crate::proxy::models::{Candidate, ListFormat, ProxyType};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// `scheme://host:port` with an optional trailing slash
static URL_FORMAT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)(https?|socks[45])://([^:/\s]+):(\d+)/?$").expect("Invalid URL format regex")
});

/// `host:port` followed by optional metadata, as written to results files
static RESULT_LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([^:\s]+):(\d+)(?:\s+(.*))?$").expect("Invalid result line regex")
});

/// A line read back from a results file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultEntry {
    pub host: String,
    pub port: u16,
    /// Everything after `host:port`, split on whitespace and commas
    pub metadata: Vec<String>,
}

/// Parser for candidate lists
pub struct ProxyParser;

impl ProxyParser {
    /// Parse a single candidate line
    ///
    /// Supports formats:
    /// - HOST:PORT
    /// - scheme://HOST:PORT
    ///
    /// The scheme, when present, overrides `default_type`.
    pub fn parse_line(line: &str, default_type: Option<ProxyType>) -> Option<Candidate> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        if let Some(candidate) = Self::parse_url_format(line) {
            return Some(candidate);
        }

        Self::parse_colon_format(line, default_type)
    }

    fn parse_url_format(line: &str) -> Option<Candidate> {
        let caps = URL_FORMAT_REGEX.captures(line)?;
        let proxy_type: ProxyType = caps[1].parse().ok()?;
        let port = Self::parse_port(&caps[3])?;

        Some(Candidate::new(caps[2].to_string(), port).with_protocols(vec![proxy_type]))
    }

    fn parse_colon_format(line: &str, default_type: Option<ProxyType>) -> Option<Candidate> {
        let (host, port) = line.split_once(':')?;
        let host = host.trim();
        if host.is_empty() || host.contains(char::is_whitespace) {
            return None;
        }
        let port = Self::parse_port(port.trim())?;

        Some(Candidate::new(host.to_string(), port).with_protocols(default_type.into_iter().collect()))
    }

    fn parse_port(s: &str) -> Option<u16> {
        s.parse::<u16>().ok().filter(|port| *port != 0)
    }

    /// Parse candidates from text, one per line
    ///
    /// Lines that cannot be parsed are skipped.
    pub fn parse_string(content: &str, default_type: Option<ProxyType>) -> Vec<Candidate> {
        content
            .lines()
            .enumerate()
            .filter_map(|(index, line)| {
                let candidate = Self::parse_line(line, default_type);
                let trimmed = line.trim();
                if candidate.is_none() && !trimmed.is_empty() && !trimmed.starts_with('#') {
                    log::warn!("skipping malformed line {}: {:?}", index + 1, trimmed);
                }
                candidate
            })
            .collect()
    }

    /// Protocol named by a `proxyspace-<protocol>-proxies.txt` download
    pub fn type_from_file_name(path: &Path) -> Option<ProxyType> {
        path.file_stem()?
            .to_str()?
            .strip_prefix("proxyspace-")?
            .strip_suffix("-proxies")?
            .parse()
            .ok()
    }

    /// Parse a JSON array of candidate records
    pub fn parse_json(content: &str) -> serde_json::Result<Vec<Candidate>> {
        serde_json::from_str(content)
    }

    /// Load a whole candidate list from disk
    pub fn load_file<P: AsRef<Path>>(
        path: P,
        format: ListFormat,
        default_type: Option<ProxyType>,
    ) -> io::Result<Vec<Candidate>> {
        let content = fs::read_to_string(path)?;
        match format {
            ListFormat::Text => Ok(Self::parse_string(&content, default_type)),
            ListFormat::Json => Self::parse_json(&content).map_err(io::Error::from),
        }
    }

    /// Write candidates as a pretty-printed JSON array, replacing the file
    pub fn save_json<P: AsRef<Path>>(candidates: &[Candidate], path: P) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, candidates)?;
        writer.flush()
    }

    /// Parse a line of a results file
    pub fn parse_result_line(line: &str) -> Option<ResultEntry> {
        let caps = RESULT_LINE_REGEX.captures(line.trim())?;
        let port = Self::parse_port(&caps[2])?;
        let metadata = caps
            .get(3)
            .map(|m| {
                m.as_str()
                    .split(|c: char| c.is_whitespace() || c == ',')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Some(ResultEntry {
            host: caps[1].to_string(),
            port,
            metadata,
        })
    }
}
