//! Traffic generator for the load balancer.
//!
//! Sends `GET {url}/req/{i}` for i in 0..count, each carrying a random
//! IPv4 in `X-Forwarded-For` so source-IP hashing sees many clients.

use clap::{Parser, ValueEnum};
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::task::JoinSet;

use balancer_proxy::observability::logging;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Spawn each request without waiting for the previous one.
    Parallel,
    /// Wait for each response before sending the next request.
    Sequential,
}

#[derive(Parser, Debug)]
#[command(name = "lb-traffic", about = "Send test traffic through the load balancer")]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Number of requests to send.
    #[arg(short = 'n', long, default_value_t = 10)]
    count: usize,

    #[arg(short, long, value_enum, default_value_t = Mode::Parallel)]
    mode: Mode,

    /// Pause between sends, in milliseconds.
    #[arg(short, long, default_value_t = 1000)]
    jitter_ms: u64,

    /// Per-request timeout, in seconds.
    #[arg(short, long, default_value_t = 10)]
    timeout_secs: u64,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(cli.timeout_secs))
        .build()?;
    let base = cli.url.trim_end_matches('/').to_string();
    let jitter = Duration::from_millis(cli.jitter_ms);

    tracing::info!(url = %base, count = cli.count, mode = ?cli.mode, "Sending requests");

    match cli.mode {
        Mode::Parallel => {
            let mut tasks = JoinSet::new();
            for req_id in 0..cli.count {
                tasks.spawn(send_request(client.clone(), base.clone(), req_id));
                tokio::time::sleep(jitter).await;
            }
            while tasks.join_next().await.is_some() {}
        }
        Mode::Sequential => {
            for req_id in 0..cli.count {
                send_request(client.clone(), base.clone(), req_id).await;
                tokio::time::sleep(jitter).await;
            }
        }
    }

    tracing::info!("All requests sent");
    Ok(())
}

async fn send_request(client: reqwest::Client, base: String, req_id: usize) {
    let endpoint = format!("{}/req/{}", base, req_id);
    let fake_ip = fake_ipv4();

    let response = match client
        .get(&endpoint)
        .header("X-Forwarded-For", fake_ip.to_string())
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(req_id, error = %e, "Failed to send request");
            return;
        }
    };

    let status = response.status();
    match response.text().await {
        Ok(body) => tracing::info!(req_id, client_ip = %fake_ip, status = %status, "{}", body),
        Err(e) => tracing::error!(req_id, error = %e, "Failed to read response body"),
    }
}

fn fake_ipv4() -> Ipv4Addr {
    Ipv4Addr::new(
        fastrand::u8(1..=223),
        fastrand::u8(..),
        fastrand::u8(..),
        fastrand::u8(1..=254),
    )
}
