use anyhow::Context as _;
use band_core::{Messenger, Services};
use flow_engine::{AuditSink, ChannelAudit, Dispatcher, LogAudit};
use session_store::{
    FileSessionStorage, MemorySessionStorage, SessionManager, SessionStorage,
    SqliteSessionStorage,
};
use std::sync::Arc;

use crate::config::{BotConfig, SessionBackend};
use crate::library::LocalFileHosting;
use crate::outbox::OutboxMessenger;

pub struct AppState {
    pub dispatcher: Dispatcher,
    pub outbox: Arc<OutboxMessenger>,
}

impl AppState {
    /// Wire storage, collaborators and flows from the configuration.
    pub async fn build(config: &BotConfig) -> anyhow::Result<Self> {
        let storage = open_storage(config).await?;
        let outbox = Arc::new(OutboxMessenger::new());
        let files = Arc::new(LocalFileHosting::new(&config.library_dir));
        tracing::info!("Serving library from: {:?}", config.library_dir);

        Self::with_parts(config, storage, files, outbox)
    }

    /// Assemble the state around already constructed collaborators.
    pub fn with_parts(
        config: &BotConfig,
        storage: Arc<dyn SessionStorage>,
        files: Arc<dyn band_core::FileHosting>,
        outbox: Arc<OutboxMessenger>,
    ) -> anyhow::Result<Self> {
        let messenger: Arc<dyn Messenger> = outbox.clone();
        let services = Arc::new(Services::in_memory(files, messenger.clone()));
        let registry = band_flows::registry().context("invalid flow registry")?;
        tracing::info!("Registered {} flows", registry.flow_names().len());

        let audit: Arc<dyn AuditSink> = match config.log_channel() {
            Some(channel) => Arc::new(ChannelAudit::new(messenger, channel)),
            None => Arc::new(LogAudit),
        };

        let dispatcher = Dispatcher::new(
            Arc::new(SessionManager::new(storage)),
            services,
            Arc::new(registry),
        )
        .with_interceptor(band_flows::cancel_interceptor())
        .with_interceptor(band_flows::capture_interceptor())
        .with_audit(audit)
        .with_failure_notice(config.failure_notice.clone());

        Ok(Self { dispatcher, outbox })
    }
}

async fn open_storage(config: &BotConfig) -> anyhow::Result<Arc<dyn SessionStorage>> {
    let storage: Arc<dyn SessionStorage> = match config.session_backend {
        SessionBackend::Memory => {
            tracing::warn!("Sessions are kept in memory and lost on restart");
            Arc::new(MemorySessionStorage::new())
        }
        SessionBackend::File => {
            let dir = config.data_dir.join("sessions");
            tracing::info!("Storing sessions as JSON files in: {:?}", dir);
            Arc::new(FileSessionStorage::new(dir))
        }
        SessionBackend::Sqlite => {
            let path = config.data_dir.join("sessions.db");
            tracing::info!("Storing sessions in SQLite database: {:?}", path);
            let storage = SqliteSessionStorage::new(&path);
            storage
                .init()
                .await
                .with_context(|| format!("failed to initialise {}", path.display()))?;
            Arc::new(storage)
        }
    };
    Ok(storage)
}
