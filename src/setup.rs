use std::sync::Arc;

use color_eyre::eyre::Context;

use crate::config::Config;
use crate::mid::{MidRestConnector, ResponseValidator};
use crate::server::AppState;
use crate::session::{ExpiredDeletion, MemoryStore, RedisStore, SessionStore};

const EXPIRED_DELETION_PERIOD: tokio::time::Duration = tokio::time::Duration::from_secs(60);

/// Wires the session store, the Mobile-ID connector and the response
/// validator into the application state.
pub async fn setup(config: &Config) -> color_eyre::Result<AppState> {
    let store: Arc<dyn SessionStore> = if let Some(redis_config) = &config.redis {
        tracing::info!("Redis URI provided, using Redis for session storage.");
        let redis_conn = redis_config
            .start()
            .await
            .wrap_err("Failed to start Redis")?;
        Arc::new(RedisStore::new(redis_conn))
    } else {
        tracing::info!("No Redis URI, using in-memory session storage.");
        let store = MemoryStore::new();
        tokio::spawn(
            store
                .clone()
                .delete_expired_sessions(EXPIRED_DELETION_PERIOD),
        );
        Arc::new(store)
    };

    let connector =
        MidRestConnector::from_config(&config.mid).wrap_err("Failed to build Mobile-ID client")?;
    let validator = ResponseValidator::from_pem_files(&config.mid.trusted_certificates)
        .wrap_err("Failed to load trusted certificates")?;

    tracing::info!(
        host_url = %config.mid.host_url,
        relying_party_name = %config.mid.relying_party_name,
        "Mobile-ID client configured"
    );

    Ok(AppState::new(Arc::new(connector), store, validator, config))
}
