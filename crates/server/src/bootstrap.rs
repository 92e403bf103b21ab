use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};

use pricelog_core::config::{AppConfig, ConfigError, LoadOptions};
use pricelog_core::dialogs::standard_dispatcher;
use pricelog_core::store::EntryStore;
use pricelog_store::SheetStore;
use pricelog_telegram::{
    BotApi, LongPollSource, PollingRunner, ReconnectPolicy, TelegramTransport,
};

pub struct Application {
    pub config: AppConfig,
    pub runner: PollingRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Wires the store, transport and dispatcher together. A spreadsheet that
/// cannot be reached at startup does not abort the bot; dialogs degrade
/// gracefully against an offline store until the next restart.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!("starting application bootstrap");

    let store: Arc<dyn EntryStore> = match SheetStore::connect(&config.sheets).await {
        Ok(store) => {
            info!("spreadsheet store ready");
            Arc::new(store)
        }
        Err(connect_error) => {
            error!(
                error = %connect_error,
                "spreadsheet connection failed, continuing with a degraded store"
            );
            Arc::new(SheetStore::offline())
        }
    };

    let api = Arc::new(BotApi::new(&config.telegram));
    let transport = Arc::new(TelegramTransport::new(api.clone()));
    let source = Arc::new(LongPollSource::new(api, config.telegram.poll_timeout_secs));

    let runner = PollingRunner::new(
        source,
        transport,
        store,
        standard_dispatcher(),
        config.view.entries_per_page,
        ReconnectPolicy::default(),
    );

    Ok(Application { config, runner })
}

#[cfg(test)]
mod tests {
    use pricelog_core::config::{ConfigOverrides, LoadOptions};

    use super::bootstrap;

    #[tokio::test]
    async fn bootstrap_fails_fast_on_invalid_bot_token() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                telegram_bot_token: Some("not-a-token".to_string()),
                sheets_spreadsheet_id: Some("sheet-1".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("telegram.bot_token"));
    }
}
