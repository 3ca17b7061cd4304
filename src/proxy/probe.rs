//! TCP connectivity probe
//!
//! A probe only answers whether `host:port` accepts a TCP connection within
//! the timeout. Nothing is sent or read and the stream is closed as soon as
//! the connect succeeds.

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{lookup_host, TcpStream};

/// Default timeout for a bare probe in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Why a probe failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("connection timed out")]
    Timeout,
    #[error("connection refused")]
    Refused,
    #[error("failed to resolve host: {0}")]
    DnsFailure(String),
    #[error("{0}")]
    Other(String),
}

impl From<io::Error> for ProbeError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::ConnectionRefused => ProbeError::Refused,
            io::ErrorKind::TimedOut => ProbeError::Timeout,
            _ => ProbeError::Other(e.to_string()),
        }
    }
}

/// Reachability check for a single endpoint
#[async_trait]
pub trait Probe: Send + Sync {
    /// Attempt a connection to `host:port`
    async fn probe(&self, host: &str, port: u16) -> Result<(), ProbeError>;

    /// Upper bound of a single `probe` call
    fn timeout(&self) -> Duration;
}

/// Probe backed by a plain TCP connect
#[derive(Debug, Clone)]
pub struct TcpProbe {
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Probe and print the outcome, returning only whether it connected
    pub async fn is_reachable(&self, host: &str, port: u16) -> bool {
        let result = self.probe(host, port).await;
        report(host, port, &result, self.timeout);
        result.is_ok()
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

#[async_trait]
impl Probe for TcpProbe {
    async fn probe(&self, host: &str, port: u16) -> Result<(), ProbeError> {
        match tokio::time::timeout(self.timeout, connect(host, port)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout),
        }
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

async fn connect(host: &str, port: u16) -> Result<(), ProbeError> {
    let addrs: Vec<SocketAddr> = lookup_host((host, port))
        .await
        .map_err(|e| ProbeError::DnsFailure(e.to_string()))?
        .collect();
    if addrs.is_empty() {
        return Err(ProbeError::DnsFailure(format!("no addresses for {}", host)));
    }

    let stream = TcpStream::connect(&addrs[..]).await?;
    log::debug!("connected to {}:{} via {:?}", host, port, stream.peer_addr().ok());
    drop(stream);
    Ok(())
}

/// Console line describing a probe outcome
pub fn outcome_line(
    host: &str,
    port: u16,
    result: &Result<(), ProbeError>,
    timeout: Duration,
) -> String {
    match result {
        Ok(()) => format!("[+] {}:{} Connected", host, port),
        Err(ProbeError::Refused) => format!("[-] Failed to connect to {}:{}", host, port),
        Err(ProbeError::Timeout) => format!(
            "[-] Timeout while connecting to {}:{} timeout={}",
            host,
            port,
            timeout.as_secs()
        ),
        Err(e) => format!("[-] {} {}:{}", e, host, port),
    }
}

/// Print the outcome of a probe to stdout
pub fn report(host: &str, port: u16, result: &Result<(), ProbeError>, timeout: Duration) {
    println!("{}", outcome_line(host, port, result, timeout));
}
