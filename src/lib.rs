//! Proxy Sieve - Proxy List Fetcher and Reachability Filter
//!
//! Fetches public proxy lists from the geonode and proxyscrape APIs and keeps
//! the candidates that accept a TCP connection within a timeout.

pub mod proxy;

pub use proxy::*;

use std::path::PathBuf;

/// Application result type
pub type Result<T> = anyhow::Result<T>;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding fetched lists and results
    pub log_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("log"),
        }
    }
}

impl Config {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
        }
    }

    /// Geonode candidate list, e.g. `log/geonode-iplist-socks5.json`
    pub fn geonode_list_path(&self, protocols: &[ProxyType]) -> PathBuf {
        self.log_dir
            .join(format!("geonode-iplist-{}.json", protocol_tag(protocols)))
    }

    /// Geonode results, e.g. `log/geonode-workinglist-socks5.txt`
    pub fn geonode_results_path(&self, protocols: &[ProxyType]) -> PathBuf {
        self.log_dir
            .join(format!("geonode-workinglist-{}.txt", protocol_tag(protocols)))
    }

    /// Proxyscrape list for `label` (a protocol or `all`)
    pub fn proxyscrape_list_path(&self, label: &str) -> PathBuf {
        self.log_dir
            .join(ProxyCrawler::<HttpEndpoint>::proxyscrape_file_name(label))
    }

    /// Proxyscrape results for `label`
    pub fn proxyscrape_results_path(&self, label: &str) -> PathBuf {
        self.log_dir
            .join(format!("proxyspace-{}-working-proxies.txt", label))
    }
}

fn protocol_tag(protocols: &[ProxyType]) -> String {
    if protocols.is_empty() {
        return "all".to_string();
    }
    protocols
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("-")
}
