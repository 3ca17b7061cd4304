//! Proxy module for fetching and probing proxy candidates
//!
//! This module provides functionality for:
//! - Fetching candidate lists from the geonode and proxyscrape APIs
//! - Parsing candidate lists in JSON and text formats
//! - Probing candidates with bounded-timeout TCP connects
//! - Writing the reachable candidates to a results file

pub mod checker;
pub mod crawler;
pub mod models;
pub mod parser;
pub mod probe;

pub use checker::{CheckError, CheckerConfig, FilterSummary, ProxyChecker};
pub use crawler::{
    CrawlerConfig, FetchError, FetchReport, HttpEndpoint, ListEndpoint, Page, ProxyCrawler,
    ScrapeReport, StopReason,
};
pub use models::{
    Candidate, ListFormat, ProbeResult, ProbeStatus, ProxyType, ResultFormat, UnknownProtocol,
    Vendor,
};
pub use parser::{ProxyParser, ResultEntry};
pub use probe::{Probe, ProbeError, TcpProbe};
