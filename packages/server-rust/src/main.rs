//! `robot-mcp-server` binary: wires configuration, tenant registry, pipeline
//! and the selected transport.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use robot_mcp_server::cli::{self, Cli, Command};
use robot_mcp_server::clients::{CompletionClient, RobotClient};
use robot_mcp_server::mcp::RobotMcpServer;
use robot_mcp_server::network::{NetworkModule, ShutdownController};
use robot_mcp_server::service::domain::{domain_router, ChatRoomSummaryService, WebhookService};
use robot_mcp_server::service::build_operation_pipeline;
use robot_mcp_server::storage::MySqlStoreProvider;
use robot_mcp_server::tenant::{
    MySqlConnector, PoolConnector, PoolPolicy, TenantConnectionRegistry, TenantResolver,
};

const STDIO_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dev_env = cli::load_dev_env();
    let cli = Cli::parse();
    cli::init_tracing(cli.log_format);
    dev_env.report();
    cli.validate()?;

    let connector: Arc<dyn PoolConnector> = Arc::new(MySqlConnector::new(
        cli.mysql_settings(),
        PoolPolicy::default(),
    ));
    let registry = Arc::new(TenantConnectionRegistry::new(
        connector,
        cli.tenant_connect_timeout(),
    ));

    let summary = Arc::new(ChatRoomSummaryService::new(
        Arc::new(MySqlStoreProvider),
        CompletionClient::new(cli.operation_timeout())?,
        RobotClient::new(cli.robot_client_url_template.clone(), cli.operation_timeout())?,
    ));
    let router = domain_router(summary, Arc::new(WebhookService));
    let server_config = cli.server_config();
    let pipeline = build_operation_pipeline(
        router,
        TenantResolver::new(Arc::clone(&registry)),
        &server_config,
    );

    match cli.command() {
        Command::Stdio => {
            let shutdown = Arc::new(ShutdownController::new());
            let server = RobotMcpServer::new(
                pipeline,
                Arc::clone(&shutdown),
                server_config.operation_timeout_ms,
            );
            shutdown.set_ready();

            tokio::select! {
                result = server.serve_stdio() => result?,
                () = shutdown_signal() => {}
            }

            shutdown.trigger_shutdown();
            if !shutdown.wait_for_drain(STDIO_DRAIN_TIMEOUT).await {
                warn!(
                    in_flight = shutdown.in_flight_count(),
                    "drain timeout expired with operations still running"
                );
            }
            registry.close_all().await;
        }
        Command::Http => {
            let mut network =
                NetworkModule::new(cli.network_config()?, registry, pipeline, server_config);
            let port = network.start().await?;
            info!(port, "HTTP server ready");
            network.serve(shutdown_signal()).await?;
        }
    }

    info!("server stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("received SIGINT, shutting down"),
                    _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                let _ = ctrl_c.await;
                info!("received SIGINT, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        info!("received Ctrl-C, shutting down");
    }
}
