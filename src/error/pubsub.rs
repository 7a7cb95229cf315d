use thiserror::Error;

use crate::pubsub::PublishReport;

pub type PubSubResult<T> = Result<T, PubSubError>;

/// Ошибки движка pub/sub.
///
/// Таймаут `receive` и удаление отсутствующей подписки ошибками
/// не считаются: они возвращаются как `None` / `false`.
#[derive(Error, Debug)]
pub enum PubSubError {
    // ==== Configuration ====
    #[error("unknown shard id: {0}")]
    UnknownShard(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    // ==== Transport ====
    #[error("shard transport error: {0}")]
    Transport(String),

    // ==== Validation ====
    #[error("invalid filter: {0}")]
    Validation(String),

    // ==== Serialization ====
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ==== Aggregated publish outcome ====
    #[error("publish failed on {} of {} shards", .report.failed_shards().len(), .report.outcomes.len())]
    PublishFailed { report: PublishReport },
}

impl PubSubError {
    /// `true`, если ошибка вызвана отсутствием шарда в конфигурации.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PubSubError::UnknownShard(_) | PubSubError::Configuration(_)
        )
    }
}
