use distributed_directory::node::types::NodeConfig;
use distributed_directory::transport;
use std::net::SocketAddr;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!(
            "Usage: {} --bind <addr:port> [--peer <addr:port>]... [options]",
            args[0]
        );
        eprintln!("Example: {} --bind 127.0.0.1:8888", args[0]);
        eprintln!(
            "Example: {} --bind 127.0.0.1:8889 --peer 127.0.0.1:8888",
            args[0]
        );
        eprintln!();
        eprintln!("Options:");
        eprintln!("  --name <server-name>     overlay name of this node");
        eprintln!("  --max-results <n>        server-wide search cap (0 = none)");
        eprintln!("  --max-shared <n>         per-user share cap (0 = none)");
        eprintln!("  --gc-secs <n>            garbage collection interval");
        eprintln!("  --library <path>         share library snapshot file");
        eprintln!("  --no-hash-index          disable the content-hash table");
        std::process::exit(1);
    }

    let mut config = NodeConfig::default();
    let mut bind_addr: Option<SocketAddr> = None;
    let mut peers: Vec<SocketAddr> = vec![];

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" => {
                bind_addr = Some(args[i + 1].parse()?);
                i += 2;
            }
            "--peer" => {
                peers.push(args[i + 1].parse()?);
                i += 2;
            }
            "--name" => {
                config.server_name = args[i + 1].clone();
                i += 2;
            }
            "--max-results" => {
                config.max_results = args[i + 1].parse()?;
                i += 2;
            }
            "--max-shared" => {
                config.max_shared = args[i + 1].parse()?;
                i += 2;
            }
            "--gc-secs" => {
                config.gc_interval = Duration::from_secs(args[i + 1].parse()?);
                i += 2;
            }
            "--library" => {
                config.library = Some(args[i + 1].clone().into());
                i += 2;
            }
            "--no-hash-index" => {
                config.index_hashes = false;
                i += 1;
            }
            _ => {
                i += 1;
            }
        }
    }

    let bind_addr = bind_addr.expect("--bind is required");

    tracing::info!("starting directory node \"{}\" on {}", config.server_name, bind_addr);
    if peers.is_empty() {
        tracing::info!("no peers configured, running standalone");
    } else {
        tracing::info!("peer nodes: {:?}", peers);
    }

    transport::run(config, bind_addr, peers).await
}
