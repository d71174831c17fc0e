//! rawreg: MCP server for browsing registry hives through virtual
//! filesystem accessors. Communicates via stdio transport.

use rawreg::accessor::{self, AccessorRegistry};
use rawreg::server::RawRegServer;
use rmcp::transport::stdio;
use rmcp::ServiceExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays clean for MCP
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    accessor::init();
    tracing::info!(
        "rawreg MCP server starting (accessors: {:?})",
        AccessorRegistry::global().schemes()
    );

    let service = RawRegServer::new(AccessorRegistry::global())
        .serve(stdio())
        .await
        .inspect_err(|e| tracing::error!("Server error: {}", e))?;

    service.waiting().await?;

    tracing::info!("rawreg MCP server shutting down");
    Ok(())
}
