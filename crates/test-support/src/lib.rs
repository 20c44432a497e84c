//! Shared integration-test helpers: ephemeral ports, HTTP readiness polling,
//! and child processes that die with the test.

use anyhow::Context as _;
use std::net::TcpListener;
use std::process::Child;
use std::time::{Duration, Instant};

/// A spawned child process that is killed and reaped when dropped, so a
/// failing test never leaks a running server.
pub struct KillOnDrop(pub Child);

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

/// Pick a free TCP port on localhost.
///
/// The port is not reserved; another process may grab it between this call
/// and the actual bind. Good enough for tests.
///
/// # Errors
///
/// Returns an error if an ephemeral localhost port cannot be bound or its
/// address cannot be read.
pub fn pick_unused_port() -> anyhow::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("bind ephemeral port")?;
    Ok(listener.local_addr()?.port())
}

/// Poll a URL until it answers with a success status.
///
/// # Errors
///
/// Returns an error when `timeout` elapses without a 2xx/3xx response.
pub async fn wait_http_ok(url: &str, timeout: Duration) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let deadline = Instant::now() + timeout;
    loop {
        match client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            _ if Instant::now() >= deadline => {
                anyhow::bail!("timed out after {timeout:?} waiting for {url}")
            }
            _ => tokio::time::sleep(Duration::from_millis(100)).await,
        }
    }
}
