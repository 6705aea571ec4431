//! `PortProbe` implementation — free ports from the OS, running-service
//! ports from `docker compose port`.

use anyhow::{Context, Result};

use crate::application::ports::{CommandRunner, PortProbe};
use crate::domain::INTERNAL_API_PORT;
use crate::infra::compose::project_name;

/// Production port probe.
pub struct DockerPortProbe<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> DockerPortProbe<R> {
    #[must_use]
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

impl<R: CommandRunner> PortProbe for DockerPortProbe<R> {
    async fn running_service_port(&self, deployment: &str, service: &str) -> Result<Option<u16>> {
        let project = project_name(deployment);
        let port = INTERNAL_API_PORT.to_string();
        let output = self
            .runner
            .run("docker", &["compose", "-p", &project, "port", service, &port])
            .await
            .context("querying running service port")?;
        if !output.status.success() {
            // No such project or service — nothing to reuse.
            return Ok(None);
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_published_port(stdout.trim()))
    }

    async fn free_port(&self) -> Result<u16> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("binding ephemeral port")?;
        let port = listener
            .local_addr()
            .context("reading ephemeral port")?
            .port();
        Ok(port)
    }
}

/// Parse `0.0.0.0:15001` (or `[::]:15001`) into the published port.
fn parse_published_port(line: &str) -> Option<u16> {
    line.rsplit_once(':')
        .and_then(|(_, port)| port.parse::<u16>().ok())
}
