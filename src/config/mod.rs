pub mod app_file;

use serde::{Deserialize, Serialize};
use std::env;

pub use app_file::{AccountConfig, AppFile, ConfigError, ExportConfig, MappingDetail, MappingEntry};

/// Process configuration: environment presets plus `APP_*`-style overrides.
/// Built once in `main` and handed to `AppState`; nothing reads it globally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub filter: FilterConfig,
    pub auth: AuthConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Path of the application file (mappings, database, setup SQL).
    pub app_config_path: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub max_limit: i64,
    pub default_history_limit: i64,
    pub debug_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub max_login_attempts: i64,
    pub lockout_window_secs: i64,
    pub min_password_length: usize,
    pub session_idle_minutes: i64,
    pub remember_days: i64,
    pub token_ttl_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub session_cookie: String,
    pub secure_cookies: bool,
    pub cors_origins: Vec<String>,
    /// Honour `X-Forwarded-For` when deriving the client address for throttling.
    pub trust_proxy_headers: bool,
    pub setup_enabled: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment, Environment::Production)
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("APP_HOST") {
            self.server.host = v;
        }
        if let Some(v) = env::var("APP_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("APP_CONFIG_PATH") {
            self.server.app_config_path = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.server.max_connections = v.parse().unwrap_or(self.server.max_connections);
        }

        // Filter overrides
        if let Ok(v) = env::var("FILTER_MAX_LIMIT") {
            self.filter.max_limit = v.parse().unwrap_or(self.filter.max_limit);
        }
        if let Ok(v) = env::var("FILTER_DEFAULT_HISTORY_LIMIT") {
            self.filter.default_history_limit = v.parse().unwrap_or(self.filter.default_history_limit);
        }
        if let Ok(v) = env::var("FILTER_DEBUG_LOGGING") {
            self.filter.debug_logging = v.parse().unwrap_or(self.filter.debug_logging);
        }

        // Auth overrides
        if let Ok(v) = env::var("AUTH_MAX_LOGIN_ATTEMPTS") {
            self.auth.max_login_attempts = v.parse().unwrap_or(self.auth.max_login_attempts);
        }
        if let Ok(v) = env::var("AUTH_LOCKOUT_WINDOW_SECS") {
            self.auth.lockout_window_secs = v.parse().unwrap_or(self.auth.lockout_window_secs);
        }
        if let Ok(v) = env::var("AUTH_MIN_PASSWORD_LENGTH") {
            self.auth.min_password_length = v.parse().unwrap_or(self.auth.min_password_length);
        }
        if let Ok(v) = env::var("AUTH_SESSION_IDLE_MINUTES") {
            self.auth.session_idle_minutes = v.parse().unwrap_or(self.auth.session_idle_minutes);
        }
        if let Ok(v) = env::var("AUTH_TOKEN_TTL_DAYS") {
            self.auth.token_ttl_days = v.parse().unwrap_or(self.auth.token_ttl_days);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_SESSION_COOKIE") {
            self.security.session_cookie = v;
        }
        if let Ok(v) = env::var("SECURITY_SECURE_COOKIES") {
            self.security.secure_cookies = v.parse().unwrap_or(self.security.secure_cookies);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("SECURITY_TRUST_PROXY_HEADERS") {
            self.security.trust_proxy_headers = v.parse().unwrap_or(self.security.trust_proxy_headers);
        }
        if let Ok(v) = env::var("SECURITY_SETUP_ENABLED") {
            self.security.setup_enabled = v.parse().unwrap_or(self.security.setup_enabled);
        }

        self
    }

    fn base_auth() -> AuthConfig {
        AuthConfig {
            max_login_attempts: 5,
            lockout_window_secs: 15 * 60,
            min_password_length: 6,
            session_idle_minutes: 24 * 60,
            remember_days: 30,
            token_ttl_days: 365,
        }
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                app_config_path: "app-config.json".to_string(),
                max_connections: 5,
            },
            filter: FilterConfig {
                max_limit: 1000,
                default_history_limit: 7,
                debug_logging: true,
            },
            auth: Self::base_auth(),
            security: SecurityConfig {
                session_cookie: "formbase_session".to_string(),
                secure_cookies: false,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                trust_proxy_headers: false,
                setup_enabled: true,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                app_config_path: "app-config.json".to_string(),
                max_connections: 10,
            },
            filter: FilterConfig {
                max_limit: 500,
                default_history_limit: 7,
                debug_logging: false,
            },
            auth: Self::base_auth(),
            security: SecurityConfig {
                session_cookie: "formbase_session".to_string(),
                secure_cookies: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
                trust_proxy_headers: true,
                setup_enabled: true,
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                app_config_path: "app-config.json".to_string(),
                max_connections: 20,
            },
            filter: FilterConfig {
                max_limit: 100,
                default_history_limit: 7,
                debug_logging: false,
            },
            auth: Self::base_auth(),
            security: SecurityConfig {
                session_cookie: "formbase_session".to_string(),
                secure_cookies: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                trust_proxy_headers: true,
                setup_enabled: false,
            },
        }
    }
}
