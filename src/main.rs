use std::sync::Arc;

use anyhow::Context;

use mail_handoff::config::GatewayConfig;
use mail_handoff::crypto::ApiKeyCipher;
use mail_handoff::handoff::build_dispatcher;
use mail_handoff::inbound::gateway_routes;
use mail_handoff::mailer::SmtpMailer;
use mail_handoff::pipeline::{PipelineDeps, PipelineSettings, ReceivePipeline};
use mail_handoff::scheduling::HttpSchedulingApi;
use mail_handoff::store::LibSqlAccountStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("Failed to install rustls crypto provider");
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = GatewayConfig::from_env().context("Invalid configuration")?;

    eprintln!("📨 mail-handoff v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Receive: http://0.0.0.0:{}/api/receive", config.port);
    eprintln!("   App id: {}", config.app_id);
    eprintln!("   Backend: {}", config.backend_url);
    eprintln!(
        "   Agent: {} ({:?}, grace {}ms)",
        config
            .handoff
            .agent_url
            .as_deref()
            .unwrap_or("<request origin>"),
        config.handoff.mode,
        config.handoff.grace_period.as_millis()
    );

    // ── Collaborators ───────────────────────────────────────────────────
    let accounts = Arc::new(
        LibSqlAccountStore::new_local(&config.database_path)
            .await
            .with_context(|| {
                format!("Failed to open database at {}", config.database_path.display())
            })?,
    );
    eprintln!("   Database: {}", config.database_path.display());

    let cipher = Arc::new(
        ApiKeyCipher::from_hex_key(&config.encryption_key).context("Invalid ENCRYPTION_KEY")?,
    );

    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let scheduling = Arc::new(HttpSchedulingApi::new(
        http.clone(),
        &config.backend_url,
        Arc::clone(&cipher),
    ));
    let mailer = Arc::new(SmtpMailer::new(&config.smtp).context("Invalid SMTP configuration")?);
    eprintln!("   SMTP: {}:{}", config.smtp.host, config.smtp.port);

    let (dispatcher, _worker) = build_dispatcher(&config.handoff, http);

    // ── Pipeline + server ───────────────────────────────────────────────
    let pipeline = ReceivePipeline::new(
        PipelineSettings {
            app_id: config.app_id.clone(),
            app_url: config.app_url.clone(),
            api_key: config.api_key.clone(),
            agent_url: config.handoff.agent_url.clone(),
            grace_period: config.handoff.grace_period,
        },
        PipelineDeps {
            accounts,
            scheduling,
            mailer,
            dispatcher,
            cipher,
        },
    );
    let app = gateway_routes(Arc::new(pipeline), config.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "Gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
