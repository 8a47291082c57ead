// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `sightline serve`: wires storage, vault, Slack and the workflow together
//! and runs the HTTP gateway alongside the agent worker.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sightline_config::SightlineConfig;
use sightline_config::model::LogFormat;
use sightline_core::SightlineError;
use sightline_gateway::{AppState, ServerConfig, SlackIntegrationHandle, WebhookConfig};
use sightline_integrations::{
    DatabaseValueSearch, DatabaseWorkflowStore, SlackAgentWorker, SlackAuthenticator,
    SlackEventDispatcher, SlackNotifier, SlackOAuthService,
};
use sightline_llm::LlmGateway;
use sightline_slack::SlackClient;
use sightline_storage::Database;
use sightline_vault::{TokenStorage, Vault};
use sightline_workflow::AnalystWorkflow;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How often expired pending installs are swept.
const PENDING_CLEANUP_INTERVAL: Duration = Duration::from_secs(600);

/// Slack services, present only when the integration is enabled and
/// fully configured.
struct SlackServices {
    oauth: Arc<SlackOAuthService>,
    slack: Arc<SlackClient>,
    dispatcher: Arc<SlackEventDispatcher>,
}

/// Runs the `serve` command.
pub async fn run_serve(config: SightlineConfig) -> Result<(), SightlineError> {
    init_tracing(&config.server.log_level, config.server.log_format);

    info!("starting sightline serve");

    let db = Database::from_config(&config.storage).await?;
    let vault = Arc::new(Vault::startup(db.connection().clone(), &config.vault).await?);
    let tokens = TokenStorage::new(vault);

    let services = build_slack_services(&config, &db, &tokens)?;
    let cancel = install_signal_handler();

    let mut background = Vec::new();
    if let Some(services) = &services {
        background.push(tokio::spawn(sweep_pending_installs(
            services.oauth.clone(),
            cancel.clone(),
        )));

        if config.worker.enabled {
            let llm = Arc::new(LlmGateway::from_config(&config.llm)?);
            let store = Arc::new(DatabaseWorkflowStore::new(db.clone()));
            let workflow = AnalystWorkflow::new(llm.clone(), llm, store.clone(), store)
                .with_retry_config(&config.retry)
                .with_value_search(Arc::new(DatabaseValueSearch::new(db.clone())));
            let worker = SlackAgentWorker::new(
                db.clone(),
                services.oauth.clone(),
                services.slack.clone(),
                Arc::new(workflow),
                &config.worker,
            )
            .with_notifier(Arc::new(SlackNotifier::new(
                db.clone(),
                services.oauth.clone(),
                services.slack.clone(),
                config.server.app_base_url.clone(),
            )));
            let worker_cancel = cancel.clone();
            background.push(tokio::spawn(async move { worker.run(worker_cancel).await }));
        } else {
            info!("agent worker disabled");
        }
    }

    let state = AppState {
        db,
        slack: match &services {
            Some(services) => SlackIntegrationHandle::Configured(services.oauth.clone()),
            None => SlackIntegrationHandle::Unconfigured,
        },
        events: services.as_ref().map(|s| s.dispatcher.clone()),
        webhook: WebhookConfig {
            signing_secret: config.slack.signing_secret.clone(),
            tolerance_secs: config.slack.signature_tolerance_secs,
        },
        app_base_url: config.server.app_base_url.clone(),
        start_time: Instant::now(),
    };
    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };

    let served = sightline_gateway::start_server(&server_config, state, cancel.clone()).await;
    cancel.cancel();
    for handle in background {
        if let Err(e) = handle.await {
            warn!(error = %e, "background task ended abnormally");
        }
    }
    info!("sightline stopped");
    served
}

fn build_slack_services(
    config: &SightlineConfig,
    db: &Database,
    tokens: &TokenStorage,
) -> Result<Option<SlackServices>, SightlineError> {
    if !config.slack.enabled {
        info!("slack integration disabled");
        return Ok(None);
    }
    let settings = match config.slack.oauth() {
        Ok(settings) => settings,
        Err(e) => {
            warn!(error = %e, "slack integration enabled but not configured, disabling");
            return Ok(None);
        }
    };
    if config.slack.signing_secret.is_none() {
        warn!("slack signing secret missing, the events webhook will reject every request");
    }

    let slack = Arc::new(SlackClient::from_config(&config.slack)?);
    let oauth = Arc::new(SlackOAuthService::new(
        settings,
        db.clone(),
        tokens.clone(),
        slack.clone(),
    ));
    let authenticator = Arc::new(SlackAuthenticator::new(db.clone(), oauth.clone(), slack.clone()));
    let dispatcher = Arc::new(SlackEventDispatcher::new(db.clone(), authenticator, slack.clone()));
    info!("slack integration enabled");
    Ok(Some(SlackServices {
        oauth,
        slack,
        dispatcher,
    }))
}

async fn sweep_pending_installs(oauth: Arc<SlackOAuthService>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(PENDING_CLEANUP_INTERVAL);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = oauth.cleanup_expired_pending().await {
                    warn!(error = %e, "pending install cleanup failed");
                }
            }
        }
    }
    debug!("pending install sweeper stopped");
}

/// Cancels the returned token on SIGINT or SIGTERM.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!("received SIGINT (Ctrl+C), initiating shutdown"),
                        _ = sigterm.recv() => info!("received SIGTERM, initiating shutdown"),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to install SIGTERM handler, listening for Ctrl+C only");
                    let _ = ctrl_c.await;
                    info!("received Ctrl+C, initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
    });

    token
}

fn init_tracing(log_level: &str, format: LogFormat) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sightline={log_level},warn")));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false);
    let installed = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
    if let Err(e) = installed {
        eprintln!("sightline: tracing already initialised: {e}");
    }
}
