//! Инициализация логирования через `tracing`.
//!
//! Консольный вывод с фильтром уровней; переменная окружения
//! `PULSIC_LOG` переопределяет уровень из конфигурации.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Конфигурация логирования.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Базовый уровень (`trace`..`error`).
    pub level: String,
    /// Включить ANSI-цвета в консоли.
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: true,
        }
    }
}

/// Инициализация логирования с конфигурацией.
///
/// Повторный вызов возвращает ошибку: глобальный subscriber
/// устанавливается один раз на процесс.
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_env("PULSIC_LOG")
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_ansi(config.ansi)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_level = %config.level,
        "logging initialized"
    );

    Ok(())
}
