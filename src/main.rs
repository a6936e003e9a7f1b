use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;

use bastion::auth::{AuthorizationClient, AuthorizationResolver, StaticAuthorizations};
use bastion::config::BastionSettings;
use bastion::config::paths;
use bastion::ssh::BastionServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings_path = std::env::args_os().nth(1).map(PathBuf::from);
    let settings = BastionSettings::load(settings_path.as_deref())
        .context("failed to load bastion settings")?;

    let log_dir = paths::log_dir_override().or_else(|| settings.logging.log_dir.clone());
    let log_dir = log_dir.filter(|dir| match paths::ensure_log_dir(dir) {
        Ok(()) => true,
        Err(e) => {
            eprintln!("Cannot use log directory {}: {}", dir.display(), e);
            false
        }
    });
    let _guards = bastion::logging::init_logging(log_dir.clone());

    tracing::info!("Starting SSH bastion");
    if let Some(dir) = &log_dir {
        tracing::info!("Logging to {}", dir.display());
    }

    let host_key = settings.read_host_key()?;

    let store = match &settings.authorizations_path {
        Some(path) => StaticAuthorizations::load(path)
            .with_context(|| format!("failed to load authorizations from {}", path.display()))?,
        None => {
            tracing::warn!("no authorizations_path configured, every public key will be rejected");
            StaticAuthorizations::new()
        }
    };
    tracing::info!(models = store.models.len(), "loaded static authorizations");
    let store = Arc::new(store);
    let auth_client: Arc<dyn AuthorizationClient> =
        Arc::new(AuthorizationResolver::new(store.clone(), store));

    let listener = TcpListener::bind(&settings.listen_address)
        .await
        .with_context(|| format!("failed to listen on {}", settings.listen_address))?;

    let handle = BastionServer::start(settings.bastion_config(host_key, listener, auth_client))?;

    let stopper = handle.stopper();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("interrupt received, shutting down"),
            Err(e) => tracing::error!("failed to listen for ctrl-c: {}", e),
        }
        stopper.stop();
    });

    if let Err(e) = handle.wait().await {
        tracing::error!("SSH bastion failed: {}", e);
        anyhow::bail!("SSH bastion failed: {}", e);
    }
    tracing::info!("SSH bastion stopped");
    Ok(())
}
