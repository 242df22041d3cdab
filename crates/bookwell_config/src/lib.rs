use bookwell_common::{config_error, BookwellError};
use config::{Config, Environment, File};
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::env;
use std::path::PathBuf;
use tracing::{debug, warn};

pub mod models;
pub use models::*;

/// Marker value that is swapped for an environment variable at load time.
pub const SECRET_MARKER: &str = "secret_from_env";

/// Loads the layered application configuration.
///
/// Sources, later ones winning:
/// 1. `{CONFIG_DIR}/default.{toml,yaml,json}`
/// 2. `{CONFIG_DIR}/{RUN_ENV}.{toml,yaml,json}`
/// 3. `{PREFIX}__SECTION__KEY` environment variables (prefix defaults to `BOOKWELL`)
///
/// `CONFIG_DIR` defaults to `config` and `RUN_ENV` to `debug`. All files are
/// optional, so an empty environment yields [`AppConfig::default`].
pub fn load_config() -> Result<AppConfig, BookwellError> {
    ensure_dotenv_loaded();

    let run_env = env::var("RUN_ENV").unwrap_or_else(|_| "debug".to_string());
    let prefix = env::var("PREFIX").unwrap_or_else(|_| "BOOKWELL".to_string());
    let config_dir = PathBuf::from(env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string()));

    let default_path = config_dir.join("default");
    let env_path = config_dir.join(&run_env);
    debug!(
        "Loading config from {} and {} (prefix {})",
        default_path.display(),
        env_path.display(),
        prefix
    );

    let builder = Config::builder()
        .add_source(File::with_name(&default_path.to_string_lossy()).required(false))
        .add_source(File::with_name(&env_path.to_string_lossy()).required(false))
        .add_source(Environment::with_prefix(&prefix).separator("__"));

    let raw_config: AppConfig = builder
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|err| config_error(format!("failed to load config: {err}")))?;

    apply_env_overrides_from_marker(raw_config)
}

/// Recursively replaces all "secret_from_env" string values with environment variable values.
///
/// The variable name is the value's path joined with `_`, upper-cased:
/// `database.url` reads `DATABASE_URL`.
fn inject_env_secrets(value: &mut Value) {
    fn walk(path: Vec<String>, obj: &mut Value) {
        match obj {
            Value::Object(map) => {
                for (k, v) in map.iter_mut() {
                    let mut new_path = path.clone();
                    new_path.push(k.to_string());
                    walk(new_path, v);
                }
            }
            Value::String(s) if s == SECRET_MARKER => {
                let env_key = path.join("_").to_uppercase();
                if let Ok(env_val) = env::var(&env_key) {
                    *obj = Value::String(env_val);
                } else {
                    warn!("env var {} not found for {}", env_key, SECRET_MARKER);
                }
            }
            _ => {}
        }
    }

    walk(vec![], value);
}

/// Applies environment overrides based on "secret_from_env" markers in serialized config.
///
/// Fails if a marker is still unresolved afterwards, so a missing secret is
/// reported at startup rather than as a confusing connection error later.
pub fn apply_env_overrides_from_marker(config: AppConfig) -> Result<AppConfig, BookwellError> {
    let mut json = serde_json::to_value(&config)
        .map_err(|err| config_error(format!("config is not serializable: {err}")))?;
    inject_env_secrets(&mut json);
    let resolved: AppConfig = serde_json::from_value(json)
        .map_err(|err| config_error(format!("config is not deserializable: {err}")))?;

    if let Some(db) = &resolved.database {
        if db.url == SECRET_MARKER {
            return Err(config_error("database.url requires the DATABASE_URL environment variable"));
        }
    }
    Ok(resolved)
}

static INIT_DOTENV: OnceCell<()> = OnceCell::new();

/// Ensures that the dotenv file is loaded into the environment variables.
///
/// Loads `DOTENV_OVERRIDE` if set, else the first CLI argument when it looks
/// like `.env*`, else `.env`. Only the first call has an effect. Returns the
/// path that was (or would have been) used.
pub fn ensure_dotenv_loaded() -> String {
    let dotenv_path_override = env::var("DOTENV_OVERRIDE").ok();
    let dotenv_path_arg = env::args().nth(1).filter(|s| s.starts_with(".env"));

    let dotenv_path = dotenv_path_override
        .or(dotenv_path_arg)
        .unwrap_or_else(|| ".env".to_string());

    INIT_DOTENV.get_or_init(|| {
        dotenv::from_filename(&dotenv_path).ok();
    });

    dotenv_path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_marker_is_resolved_from_path_named_variable() {
        env::set_var("DATABASE_URL", "sqlite::memory:");
        let config = AppConfig {
            database: Some(DatabaseConfig {
                url: SECRET_MARKER.to_string(),
                max_connections: 1,
            }),
            ..AppConfig::default()
        };

        let resolved = apply_env_overrides_from_marker(config).unwrap();
        assert_eq!(resolved.database.unwrap().url, "sqlite::memory:");
    }

    #[test]
    fn defaults_apply_without_any_source() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.engine.max_write_retries, 2);
        assert_eq!(config.logging.level, "info");
        assert!(config.database.is_none());
    }

    #[test]
    fn engine_section_accepts_partial_values() {
        let json = r#"{ "engine": { "retry_backoff_ms": 5 } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.engine.retry_backoff_ms, 5);
        assert_eq!(config.engine.max_write_retries, 2);
    }
}
