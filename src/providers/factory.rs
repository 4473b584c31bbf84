use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{AppConfig, ProviderConfig, ProviderKind};
use crate::error::Result;

use super::market::AlpacaCredentials;
use super::{
    DepartmentActivityProvider, MarketPriceProvider, MetricProvider, PositionsProvider,
    StaticProvider,
};

/// Instantiate every configured provider, in configuration order
pub fn build_providers(config: &AppConfig) -> Result<Vec<Arc<dyn MetricProvider>>> {
    config.providers.iter().map(build_provider).collect()
}

fn build_provider(cfg: &ProviderConfig) -> Result<Arc<dyn MetricProvider>> {
    let provider: Arc<dyn MetricProvider> = match &cfg.kind {
        ProviderKind::Positions {
            database_path,
            table,
        } => Arc::new(PositionsProvider::new(&cfg.id, database_path, table)?),
        ProviderKind::MarketPrice {
            symbols,
            base_url,
            key_id_env,
            secret_key_env,
        } => {
            let credentials = AlpacaCredentials::from_env(key_id_env, secret_key_env);
            if credentials.is_none() {
                warn!(
                    source = %cfg.id,
                    "{} / {} not set; market source will report no data",
                    key_id_env,
                    secret_key_env
                );
            }
            Arc::new(MarketPriceProvider::new(
                &cfg.id,
                base_url,
                symbols.clone(),
                credentials,
            ))
        }
        ProviderKind::DepartmentActivity {
            department,
            directory,
        } => Arc::new(DepartmentActivityProvider::new(
            &cfg.id,
            department,
            directory.clone(),
        )),
        ProviderKind::Static { payload, status } => {
            let provider = StaticProvider::new(&cfg.id, payload.clone());
            Arc::new(match status {
                Some(status) => provider.with_status(*status),
                None => provider,
            })
        }
    };

    info!(source = %cfg.id, kind = cfg.kind.name(), "provider configured");
    Ok(provider)
}
