//! Proxy checker: probes every candidate of a list and keeps the reachable ones

use crate::proxy::models::{
    Candidate, ListFormat, ProbeResult, ProxyType, UnknownProtocol, Vendor,
};
use crate::proxy::parser::ProxyParser;
use crate::proxy::probe::{report, Probe, TcpProbe};
use futures::stream::{self, StreamExt};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default number of concurrent probes
const DEFAULT_CONCURRENCY: usize = 1;

/// Failures that stop a filter pass before any candidate is probed
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    UnknownProtocol(#[from] UnknownProtocol),
    #[error("{} doesn't exist", .0.display())]
    InputNotFound(PathBuf),
    #[error("{} already exists and overwrite is disabled", .0.display())]
    ResultsExist(PathBuf),
    #[error(
        "{} is a text list without a protocol; pass a single protocol or a default type",
        .0.display()
    )]
    UntypedList(PathBuf),
    #[error("failed to load candidates from {}: {source}", path.display())]
    Load { path: PathBuf, source: io::Error },
    #[error("failed to write results: {0}")]
    Io(#[from] io::Error),
}

/// Configuration for the proxy checker
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Timeout for each probe
    pub timeout: Duration,
    /// Number of probes in flight
    pub concurrency: usize,
    /// Vendor whose protocol vocabulary and result format apply
    pub vendor: Vendor,
    /// Layout of the candidate list
    pub list_format: ListFormat,
    /// Protocol assigned to candidates read from text lists
    pub default_type: Option<ProxyType>,
    /// Protocol names to restrict the pass to, empty for all
    pub protocols: Vec<String>,
    /// Replace an existing results file
    pub overwrite: bool,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        let vendor = Vendor::default();
        Self {
            timeout: vendor.default_timeout(),
            concurrency: DEFAULT_CONCURRENCY,
            vendor,
            list_format: vendor.list_format(),
            default_type: None,
            protocols: Vec::new(),
            overwrite: false,
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch vendor, resetting the timeout and list format to its defaults
    pub fn with_vendor(mut self, vendor: Vendor) -> Self {
        self.vendor = vendor;
        self.timeout = vendor.default_timeout();
        self.list_format = vendor.list_format();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_list_format(mut self, list_format: ListFormat) -> Self {
        self.list_format = list_format;
        self
    }

    pub fn with_default_type(mut self, proxy_type: ProxyType) -> Self {
        self.default_type = Some(proxy_type);
        self
    }

    pub fn with_protocols<S: Into<String>>(mut self, protocols: impl IntoIterator<Item = S>) -> Self {
        self.protocols = protocols.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// Counters from a completed filter pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterSummary {
    /// Candidates in the list
    pub total: usize,
    /// Candidates left after the protocol filter
    pub selected: usize,
    /// Candidates written to the results file
    pub reachable: usize,
}

/// Proxy checker driving a [`Probe`] over candidate lists
pub struct ProxyChecker<P: Probe = TcpProbe> {
    config: CheckerConfig,
    probe: P,
}

impl ProxyChecker<TcpProbe> {
    /// Create a new proxy checker with default configuration
    pub fn new() -> Self {
        Self::with_config(CheckerConfig::default())
    }

    /// Create a new proxy checker with custom configuration
    pub fn with_config(config: CheckerConfig) -> Self {
        let probe = TcpProbe::new(config.timeout);
        Self { config, probe }
    }
}

impl Default for ProxyChecker<TcpProbe> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Probe> ProxyChecker<P> {
    /// Create a proxy checker around an existing probe
    pub fn with_probe(config: CheckerConfig, probe: P) -> Self {
        Self { config, probe }
    }

    /// Protocol given to bare `host:port` lines
    ///
    /// Falls back to the `proxyspace-<p>-proxies.txt` file name, then to the
    /// only requested protocol. Several requested protocols over an untyped
    /// list cannot be matched and are rejected.
    fn text_list_type(
        &self,
        input: &Path,
        wanted: &[ProxyType],
    ) -> Result<Option<ProxyType>, CheckError> {
        if self.config.list_format != ListFormat::Text || self.config.default_type.is_some() {
            return Ok(self.config.default_type);
        }
        if let Some(proxy_type) = ProxyParser::type_from_file_name(input) {
            return Ok(Some(proxy_type));
        }
        match wanted {
            [] => Ok(None),
            [only] => Ok(Some(*only)),
            _ => Err(CheckError::UntypedList(input.to_path_buf())),
        }
    }

    /// Probe a single candidate and print the outcome
    pub async fn check_candidate(&self, candidate: Candidate) -> ProbeResult {
        let start = Instant::now();
        let result = self.probe.probe(&candidate.host, candidate.port).await;
        report(&candidate.host, candidate.port, &result, self.probe.timeout());

        match result {
            Ok(()) => {
                let elapsed = start.elapsed().as_millis() as u64;
                ProbeResult::reachable(candidate, elapsed)
            }
            Err(e) => ProbeResult::unreachable(candidate, e),
        }
    }

    /// Probe candidates with up to `concurrency` in flight.
    ///
    /// Results come back in input order.
    pub async fn check_candidates(&self, candidates: Vec<Candidate>) -> Vec<ProbeResult> {
        stream::iter(candidates)
            .map(|candidate| self.check_candidate(candidate))
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await
    }

    /// Keep only candidates advertising one of `wanted`, or all when empty
    pub fn select(candidates: Vec<Candidate>, wanted: &[ProxyType]) -> Vec<Candidate> {
        if wanted.is_empty() {
            return candidates;
        }
        candidates
            .into_iter()
            .filter(|candidate| candidate.supports_any(wanted))
            .collect()
    }

    /// Probe every candidate of `input` and write the reachable ones to `output`.
    ///
    /// Every reachable candidate is written and flushed as soon as its probe
    /// completes, in list order.
    pub async fn filter_file<I, O>(&self, input: I, output: O) -> Result<FilterSummary, CheckError>
    where
        I: AsRef<Path>,
        O: AsRef<Path>,
    {
        let input = input.as_ref();
        let output = output.as_ref();

        let wanted = self.config.vendor.parse_protocols(&self.config.protocols)?;

        if !input.exists() {
            return Err(CheckError::InputNotFound(input.to_path_buf()));
        }
        if output.exists() && !self.config.overwrite {
            return Err(CheckError::ResultsExist(output.to_path_buf()));
        }

        let default_type = self.text_list_type(input, &wanted)?;
        let candidates =
            ProxyParser::load_file(input, self.config.list_format, default_type)
                .map_err(|source| CheckError::Load {
                    path: input.to_path_buf(),
                    source,
                })?;
        let total = candidates.len();
        let selected = Self::select(candidates, &wanted);
        log::info!(
            "probing {} of {} candidates from {} (timeout {:?}, concurrency {})",
            selected.len(),
            total,
            input.display(),
            self.config.timeout,
            self.config.concurrency
        );

        let mut summary = FilterSummary {
            total,
            selected: selected.len(),
            reachable: 0,
        };

        let format = self.config.vendor.result_format();
        let mut file = File::create(output)?;
        let results = stream::iter(selected)
            .map(|candidate| self.check_candidate(candidate))
            .buffered(self.config.concurrency.max(1));
        futures::pin_mut!(results);

        while let Some(result) = results.next().await {
            if result.is_reachable() {
                writeln!(file, "{}", result.candidate.to_result_line(format))?;
                file.flush()?;
                summary.reachable += 1;
            }
        }

        Ok(summary)
    }
}
