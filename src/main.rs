use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use proxy_sieve::{
    proxy::{
        CheckerConfig, CrawlerConfig, ListFormat, ProxyChecker, ProxyCrawler, ProxyType,
        StopReason, Vendor,
    },
    Config,
};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fetches public proxy lists and keeps the ones that accept TCP connections
#[derive(Parser)]
#[command(name = "proxy-sieve")]
#[command(about = "Fetches public proxy lists and keeps the ones that accept TCP connections")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory for fetched lists and results
    #[arg(short, long, default_value = "log", global = true)]
    log_dir: PathBuf,

    /// Timeout in seconds for HTTP requests to the list vendors
    #[arg(long, default_value = "30", global = true)]
    http_timeout: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a candidate list from a vendor
    Fetch {
        #[command(subcommand)]
        source: FetchSource,
    },
    /// Probe a candidate list and save the reachable proxies
    Check {
        /// Candidate list to probe
        input: PathBuf,
        /// Output file for reachable proxies
        #[arg(short, long)]
        output: PathBuf,
        /// Vendor that produced the list (geonode, proxyscrape)
        #[arg(long, default_value = "geonode")]
        vendor: String,
        /// Only probe candidates advertising this protocol (repeatable)
        #[arg(short, long = "protocol")]
        protocols: Vec<String>,
        /// Protocol assigned to entries of a text list (http, socks4, socks5)
        #[arg(short = 't', long)]
        proxy_type: Option<String>,
        /// Layout of the candidate list (json, text) [default: per vendor]
        #[arg(long)]
        format: Option<String>,
        /// Timeout in seconds for each probe [default: 10]
        #[arg(long)]
        timeout: Option<u64>,
        /// Number of concurrent probes
        #[arg(short = 'n', long, default_value = "1")]
        threads: usize,
        /// Overwrite the output file without asking
        #[arg(short, long)]
        yes: bool,
    },
    /// Fetch a vendor list and probe it with the default file names
    Pipeline {
        /// Vendor to fetch from (geonode, proxyscrape)
        vendor: String,
        /// Protocols to fetch and probe (repeatable)
        #[arg(short, long = "protocol")]
        protocols: Vec<String>,
        /// Timeout in seconds for each probe [default: 10]
        #[arg(long)]
        timeout: Option<u64>,
        /// Number of concurrent probes
        #[arg(short = 'n', long, default_value = "1")]
        threads: usize,
        /// Overwrite result files without asking
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum FetchSource {
    /// Page through the geonode API into a JSON list
    Geonode {
        /// Protocols to request (repeatable)
        #[arg(short, long = "protocol")]
        protocols: Vec<String>,
        /// Output JSON file [default: <log-dir>/geonode-iplist-<protocols>.json]
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// First page to request
        #[arg(long, default_value = "1")]
        start_page: u32,
    },
    /// Download proxyscrape text lists, one per protocol
    Proxyscrape {
        /// Protocols to download (repeatable, all when omitted)
        #[arg(short, long = "protocol")]
        protocols: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = Config::new(cli.log_dir);
    let crawler_config = CrawlerConfig::new().with_timeout(Duration::from_secs(cli.http_timeout));

    match cli.command {
        Commands::Fetch { source } => match source {
            FetchSource::Geonode {
                protocols,
                output,
                start_page,
            } => {
                let wanted = Vendor::Geonode.parse_protocols(&protocols)?;
                let output = output.unwrap_or_else(|| config.geonode_list_path(&wanted));
                let crawler = ProxyCrawler::with_config(crawler_config.with_start_page(start_page))?;
                let report = crawler.fetch_geonode(&output, &protocols).await?;
                println!(
                    "Saved {} candidates from {} pages to {:?}",
                    report.candidates.len(),
                    report.pages,
                    output
                );
            }
            FetchSource::Proxyscrape { protocols } => {
                let crawler = ProxyCrawler::with_config(crawler_config)?;
                let report = crawler.fetch_proxyscrape(&config.log_dir, &protocols).await?;
                for (label, path) in &report.files {
                    println!("Saved {} list to {:?}", label, path);
                }
            }
        },
        Commands::Check {
            input,
            output,
            vendor,
            protocols,
            proxy_type,
            format,
            timeout,
            threads,
            yes,
        } => {
            let vendor: Vendor = vendor.parse()?;
            let mut checker_config = build_checker_config(vendor, &protocols, timeout, threads)?;
            if let Some(format) = format {
                checker_config = checker_config.with_list_format(format.parse::<ListFormat>()?);
            }
            if let Some(proxy_type) = proxy_type {
                checker_config = checker_config.with_default_type(parse_proxy_type(&proxy_type)?);
            }
            run_check(checker_config, &input, &output, yes).await?;
        }
        Commands::Pipeline {
            vendor,
            protocols,
            timeout,
            threads,
            yes,
        } => {
            let vendor: Vendor = vendor.parse()?;
            let wanted = vendor.parse_protocols(&protocols)?;
            fs::create_dir_all(&config.log_dir)
                .with_context(|| format!("failed to create {:?}", config.log_dir))?;

            match vendor {
                Vendor::Geonode => {
                    let list = config.geonode_list_path(&wanted);
                    let crawler = ProxyCrawler::with_config(crawler_config)?;
                    let report = crawler.fetch_geonode(&list, &protocols).await?;
                    warn_on_status(report.stop);

                    let checker_config = build_checker_config(vendor, &protocols, timeout, threads)?;
                    run_check(checker_config, &list, &config.geonode_results_path(&wanted), yes)
                        .await?;
                }
                Vendor::Proxyscrape => {
                    let crawler = ProxyCrawler::with_config(crawler_config)?;
                    let report = crawler.fetch_proxyscrape(&config.log_dir, &protocols).await?;
                    warn_on_status(report.stop);

                    for (label, list) in &report.files {
                        let mut checker_config = build_checker_config(vendor, &[], timeout, threads)?;
                        if let Ok(proxy_type) = label.parse::<ProxyType>() {
                            checker_config = checker_config.with_default_type(proxy_type);
                        }
                        run_check(
                            checker_config,
                            list,
                            &config.proxyscrape_results_path(label),
                            yes,
                        )
                        .await?;
                    }
                }
            }
        }
    }

    Ok(())
}

fn build_checker_config(
    vendor: Vendor,
    protocols: &[String],
    timeout: Option<u64>,
    threads: usize,
) -> Result<CheckerConfig> {
    if threads == 0 {
        return Err(anyhow!("Number of threads must be at least 1"));
    }

    let mut config = CheckerConfig::new()
        .with_vendor(vendor)
        .with_protocols(protocols.iter().cloned())
        .with_concurrency(threads);
    if let Some(timeout) = timeout {
        config = config.with_timeout(Duration::from_secs(timeout));
    }
    Ok(config)
}

async fn run_check(mut config: CheckerConfig, input: &Path, output: &Path, yes: bool) -> Result<()> {
    config.vendor.parse_protocols(&config.protocols)?;

    if input.exists() && output.exists() && !yes && !confirm_overwrite(output)? {
        println!("Aborted, {:?} left unchanged", output);
        return Ok(());
    }
    config = config.with_overwrite(true);

    println!("Loading candidates from {:?}", input);
    println!(
        "Checking with {} threads, timeout: {}s",
        config.concurrency,
        config.timeout.as_secs()
    );
    println!();

    let checker = ProxyChecker::with_config(config);
    let summary = checker.filter_file(input, output).await?;

    println!(
        "Results: {} reachable of {} probed ({} in list)",
        summary.reachable, summary.selected, summary.total
    );
    println!("Saved {} reachable proxies to {:?}", summary.reachable, output);
    Ok(())
}

fn confirm_overwrite(path: &Path) -> Result<bool> {
    print!("{:?} already exists, do you want to overwrite? [y/N]: ", path);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

fn warn_on_status(stop: StopReason) {
    if let StopReason::Status(status) = stop {
        eprintln!("Fetch stopped early with HTTP status {}, probing what was saved", status);
    }
}

fn parse_proxy_type(s: &str) -> Result<ProxyType> {
    s.parse::<ProxyType>()
        .map_err(|_| anyhow!("Invalid proxy type: {}. Use: http, https, socks4, socks5", s))
}
