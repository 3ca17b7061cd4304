use proxy_sieve::proxy::{
    Candidate, CheckerConfig, ProxyChecker, ProxyParser, ProxyType, TcpProbe, Vendor,
};
use std::fs;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

fn write_json_list(dir: &std::path::Path, candidates: &[Candidate]) -> std::path::PathBuf {
    let path = dir.join("geonode-iplist.json");
    ProxyParser::save_json(candidates, &path).expect("write list");
    path
}

#[tokio::test]
async fn nothing_listening_leaves_results_empty() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_json_list(
        dir.path(),
        &[Candidate::new("127.0.0.1".to_string(), 9).with_protocols(vec![ProxyType::Socks5])],
    );
    let output = dir.path().join("working.txt");

    let config = CheckerConfig::new().with_timeout(Duration::from_secs(1));
    let checker = ProxyChecker::with_config(config);

    let start = Instant::now();
    let summary = checker.filter_file(&input, &output).await.unwrap();
    assert!(start.elapsed() < Duration::from_secs(3));

    assert_eq!(summary.reachable, 0);
    assert_eq!(fs::read_to_string(&output).unwrap(), "");
}

#[tokio::test]
async fn open_listener_is_written_once() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let dir = tempfile::tempdir().unwrap();
    let input = write_json_list(
        dir.path(),
        &[Candidate::new("127.0.0.1".to_string(), port)
            .with_protocols(vec![ProxyType::Http])
            .with_location("US".to_string(), "elite".to_string())],
    );
    let output = dir.path().join("working.txt");

    let config = CheckerConfig::new()
        .with_timeout(Duration::from_secs(2))
        .with_protocols(["http"]);
    let checker = ProxyChecker::with_config(config);
    let summary = checker.filter_file(&input, &output).await.unwrap();
    assert_eq!(summary.reachable, 1);

    let content = fs::read_to_string(&output).unwrap();
    let lines: Vec<_> = content.lines().collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with(&format!("127.0.0.1:{}\t", port)));

    let entry = ProxyParser::parse_result_line(lines[0]).unwrap();
    assert_eq!(entry.port, port);
    assert_eq!(entry.metadata, vec!["http", "US", "elite"]);
}

#[tokio::test]
async fn text_list_mixes_open_and_closed_ports() {
    let open = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let open_port = open.local_addr().unwrap().port();
    let closed_port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("proxyspace-http-proxies.txt");
    fs::write(
        &input,
        format!("127.0.0.1:{}\n127.0.0.1:{}\n127.0.0.1:{}\n", closed_port, open_port, open_port),
    )
    .unwrap();
    let output = dir.path().join("proxyspace-http-working-proxies.txt");

    let config = CheckerConfig::new()
        .with_vendor(Vendor::Proxyscrape)
        .with_timeout(Duration::from_secs(2))
        .with_concurrency(3);
    let checker = ProxyChecker::with_config(config);
    let summary = checker.filter_file(&input, &output).await.unwrap();

    assert_eq!(summary.total, 3);
    assert_eq!(summary.reachable, 2);
    let expected = format!("127.0.0.1:{0}\n127.0.0.1:{0}\n", open_port);
    assert_eq!(fs::read_to_string(&output).unwrap(), expected);
}

#[tokio::test]
async fn bare_probe_reports_reachability() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let probe = TcpProbe::new(Duration::from_secs(1));
    assert!(probe.is_reachable("127.0.0.1", port).await);
    drop(listener);
    assert!(!probe.is_reachable("127.0.0.1", port).await);
}

#[tokio::test]
async fn untyped_text_list_honours_single_protocol() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("socks.txt");
    fs::write(&input, format!("127.0.0.1:{}\n", port)).unwrap();
    let output = dir.path().join("socks-working.txt");

    let config = CheckerConfig::new()
        .with_vendor(Vendor::Proxyscrape)
        .with_timeout(Duration::from_secs(2))
        .with_protocols(["socks5"]);
    let checker = ProxyChecker::with_config(config);
    let summary = checker.filter_file(&input, &output).await.unwrap();

    assert_eq!(summary.total, 1);
    assert_eq!(summary.selected, 1);
    assert_eq!(summary.reachable, 1);
    assert_eq!(fs::read_to_string(&output).unwrap(), format!("127.0.0.1:{}\n", port));
}

#[tokio::test]
async fn downloaded_text_list_is_typed_by_name() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("proxyspace-socks5-proxies.txt");
    fs::write(&input, format!("127.0.0.1:{}\n", port)).unwrap();
    let output = dir.path().join("proxyspace-socks5-working-proxies.txt");

    let config = CheckerConfig::new()
        .with_vendor(Vendor::Proxyscrape)
        .with_timeout(Duration::from_secs(2))
        .with_protocols(["socks4", "socks5"]);
    let checker = ProxyChecker::with_config(config);
    let summary = checker.filter_file(&input, &output).await.unwrap();

    assert_eq!(summary.reachable, 1);
    assert_eq!(fs::read_to_string(&output).unwrap(), format!("127.0.0.1:{}\n", port));
}
