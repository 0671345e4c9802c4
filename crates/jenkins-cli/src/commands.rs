//! Subcommand implementations

use crate::cli::{ServerArgs, Transport};
use crate::utils::{format_duration, ColoredOutput};
use anyhow::{Context, Result};
use jenkins_connector::{JenkinsClient, JenkinsExecutor};
use jenkins_mcp::{serve_http, serve_stdio};
use jenkins_resources::{health, HealthStatus};
use std::time::Instant;
use tracing::info;

pub async fn serve(client: JenkinsClient, args: &ServerArgs) -> Result<()> {
    let governance = args.governance();
    match args.transport {
        Transport::Stdio => serve_stdio(client, governance)
            .await
            .context("stdio transport failed")?,
        Transport::Http => serve_http(client, governance, &args.addr)
            .await
            .context("HTTP transport failed")?,
    }
    Ok(())
}

/// Contact the controller once: token negotiation, version and health.
pub async fn check(executor: &JenkinsExecutor, client: &JenkinsClient) -> Result<()> {
    let started = Instant::now();
    info!("Checking {}", executor.base_url());

    let info = client
        .server_info()
        .await
        .context("could not read server information")?;
    let crumb = executor
        .prime_crumb()
        .await
        .context("could not negotiate an anti-forgery token")?;
    let summary = health::check(client)
        .await
        .context("could not compute the health summary")?;

    let status = match summary.status {
        HealthStatus::Healthy => ColoredOutput::success("healthy"),
        HealthStatus::Degraded => ColoredOutput::warning("degraded"),
    };
    println!(
        "{} Jenkins {} is {}",
        ColoredOutput::success("✓"),
        info.version.as_deref().unwrap_or("(unknown version)"),
        status
    );
    println!(
        "  nodes: {} online / {} total, executors busy: {}/{}, queue: {}",
        summary.nodes.online,
        summary.nodes.total,
        summary.busy_executors,
        summary.total_executors,
        summary.queue_length
    );
    println!(
        "  anti-forgery token: {}, trust: {}",
        if crumb { "issued" } else { "not required" },
        executor.trust().mode().as_str()
    );
    println!(
        "{}",
        ColoredOutput::dim(&format!("checked in {}", format_duration(started.elapsed())))
    );
    Ok(())
}
