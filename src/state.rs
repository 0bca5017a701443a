use std::sync::Arc;
use tower_sessions::MemoryStore;

use crate::auth::{Clock, DefaultClock, LoginThrottle};
use crate::config::{AppConfig, AppFile, ConfigError};
use crate::database::{Database, MappingResolver, SchemaCache};

/// Everything a request needs, built once in `main` and cloned into handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<AppConfig>,
    pub app: Arc<AppFile>,
    pub mappings: Arc<MappingResolver>,
    pub schemas: Arc<SchemaCache>,
    /// Backing store of the cookie session layer.
    pub sessions: MemoryStore,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let app = AppFile::load(&config.server.app_config_path)?;
        let url = app.database_url()?;
        let db = Database::connect(&url, config.server.max_connections).await?;
        Ok(Self::from_parts(db, config, app, Arc::new(DefaultClock))?)
    }

    pub fn from_parts(
        db: Database,
        config: AppConfig,
        app: AppFile,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let mappings = MappingResolver::from_app_file(&app)?;
        Ok(Self {
            db,
            config: Arc::new(config),
            app: Arc::new(app),
            mappings: Arc::new(mappings),
            schemas: Arc::new(SchemaCache::new()),
            sessions: MemoryStore::default(),
            clock,
        })
    }

    pub fn throttle(&self) -> LoginThrottle {
        LoginThrottle::new(
            self.config.auth.max_login_attempts,
            self.config.auth.lockout_window_secs,
        )
    }
}
