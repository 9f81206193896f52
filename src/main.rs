use color_eyre::eyre::{Result, WrapErr, eyre};
use relaysrv::{CsvStatsWriter, Endpoint, RelayConfig, StatsCollector, Supervisor};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("relaysrv=info")
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut src_endpoints: Vec<Endpoint> = Vec::new();
    let mut dst_endpoints: Vec<Endpoint> = Vec::new();
    let mut cfg = RelayConfig::default();

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        let mut value = |name: &str| {
            iter.next()
                .ok_or_else(|| eyre!("{name} requires a value"))
        };
        match arg.as_str() {
            "-i" | "--input" => {
                src_endpoints.push(value("--input")?.parse()?);
            }
            "-o" | "--output" => {
                dst_endpoints.push(value("--output")?.parse()?);
            }
            "--msgsize" => {
                cfg.message_size = value("--msgsize")?
                    .parse()
                    .wrap_err("--msgsize expects a positive byte count")?;
            }
            "--bidir" => cfg.bidirectional = true,
            "--reconnect" => cfg.reconnect = true,
            "--statsfile" => {
                cfg.stats_file = Some(PathBuf::from(value("--statsfile")?));
            }
            "--statsfreq" => {
                let ms: u64 = value("--statsfreq")?
                    .parse()
                    .wrap_err("--statsfreq expects milliseconds")?;
                cfg.stats_interval = Some(Duration::from_millis(ms));
            }
            other => {
                usage(&args[0], &format!("unknown argument '{other}'"));
                std::process::exit(1);
            }
        }
    }

    if src_endpoints.is_empty() || dst_endpoints.is_empty() {
        usage(&args[0], "at least one --input and one --output are required");
        std::process::exit(1);
    }
    if cfg.message_size == 0 {
        usage(&args[0], "--msgsize must be positive");
        std::process::exit(1);
    }

    let mut supervisor = Supervisor::new(src_endpoints, dst_endpoints, cfg.clone());
    if cfg.stats_enabled() {
        let path = cfg.stats_file.as_ref().expect("checked by stats_enabled");
        let interval = cfg.stats_interval.expect("checked by stats_enabled");
        let writer = CsvStatsWriter::create(path, interval)
            .await
            .wrap_err("failed to create the stats report file")?;
        info!(path = %path.display(), "stats reporting enabled");
        supervisor = supervisor.with_stats(Arc::new(writer) as Arc<dyn StatsCollector>);
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received shutdown signal, stopping relay");
                cancel.cancel();
            }
        }
    });

    supervisor
        .run(cancel)
        .await
        .wrap_err("relay terminated with an error")?;

    Ok(())
}

fn usage(program: &str, problem: &str) {
    eprintln!("error: {problem}");
    eprintln!();
    eprintln!("Usage: {program} -i <endpoint> -o <endpoint> [options]");
    eprintln!("  -i, --input <endpoint>   Source endpoint, repeatable (tcp://host:port[?mode=listener], udp://...)");
    eprintln!("  -o, --output <endpoint>  Destination endpoint, repeatable");
    eprintln!("  --msgsize <bytes>        Buffer size for one read/write cycle (default: 1456)");
    eprintln!("  --bidir                  Relay in both directions");
    eprintln!("  --reconnect              Reconnect automatically after a relay cycle ends");
    eprintln!("  --statsfile <path>       Stats report filename");
    eprintln!("  --statsfreq <ms>         Stats report frequency in milliseconds");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {program} -i udp://0.0.0.0:4200?mode=listener -o tcp://10.0.0.5:9000 --reconnect");
    eprintln!("  {program} -i tcp://127.0.0.1:5000 -o tcp://127.0.0.1:6000 --bidir");
}
