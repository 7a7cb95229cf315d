use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use config::{Config, ConfigError, Environment};

/// Таймаут блокирующего `receive` по умолчанию (5 минут).
pub const RECEIVE_TIMEOUT_SECS: u64 = 5 * 60;

/// Адрес одного backing-шарда.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardAddr {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Settings {
    /// Карта shard id -> адрес backing-инстанса.
    #[serde(default)]
    pub shards: HashMap<String, ShardAddr>,
    pub environment: String,
    pub receive_timeout_secs: u64,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let cfg = Config::builder()
            // Добавляем значения по умолчанию
            .set_default("environment", "development")?
            .set_default("receive_timeout_secs", RECEIVE_TIMEOUT_SECS as i64)?
            // Добавляем переменные окружения с префиксом PULSIC_
            .add_source(
                Environment::with_prefix("PULSIC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        // Десериализуем конфигурацию в нашу структуру
        let mut settings: Settings = cfg.try_deserialize()?;

        // Карта шардов через окружение задаётся одной JSON-строкой:
        // PULSIC_SHARD_MAP='{"redis1":{"host":"127.0.0.1","port":6379}}'
        if settings.shards.is_empty() {
            if let Ok(raw) = std::env::var("PULSIC_SHARD_MAP") {
                settings.shards = serde_json::from_str(&raw)
                    .map_err(|e| ConfigError::Message(e.to_string()))?;
            }
        }

        if settings.shards.is_empty() {
            tracing::warn!("no shard configuration found, pub/sub operations will fail");
        }

        Ok(settings)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            shards: HashMap::new(),
            environment: "development".to_string(),
            receive_timeout_secs: RECEIVE_TIMEOUT_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    /// Тест проверяет, что без переменных окружения загружаются
    /// значения по умолчанию и пустая карта шардов.
    #[test]
    #[serial]
    fn test_load_defaults() {
        std::env::remove_var("PULSIC_ENVIRONMENT");
        std::env::remove_var("PULSIC_SHARD_MAP");

        let settings = Settings::load().unwrap();
        assert_eq!(settings.environment, "development");
        assert_eq!(settings.receive_timeout_secs, RECEIVE_TIMEOUT_SECS);
        assert!(settings.shards.is_empty());
        assert!(!settings.is_production());
    }

    /// Тест проверяет разбор карты шардов из PULSIC_SHARD_MAP.
    #[test]
    #[serial]
    fn test_load_shard_map_from_env() {
        std::env::set_var(
            "PULSIC_SHARD_MAP",
            r#"{"redis1":{"host":"10.0.0.1","port":6379},"redis2":{"host":"10.0.0.2","port":6380}}"#,
        );

        let settings = Settings::load().unwrap();
        assert_eq!(settings.shards.len(), 2);
        assert_eq!(
            settings.shards["redis2"],
            ShardAddr {
                host: "10.0.0.2".into(),
                port: 6380
            }
        );

        std::env::remove_var("PULSIC_SHARD_MAP");
    }

    /// Тест проверяет определение production-окружения.
    #[test]
    #[serial]
    fn test_production_flag() {
        std::env::set_var("PULSIC_ENVIRONMENT", "production");
        let settings = Settings::load().unwrap();
        assert!(settings.is_production());
        std::env::remove_var("PULSIC_ENVIRONMENT");
    }
}
