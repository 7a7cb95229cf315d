use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::filter::Filter;
use crate::error::PubSubResult;

/// Сериализуемая форма подписки в реестре шарда.
///
/// Ровно `{id, type, filter}` в фиксированном порядке полей: удаление
/// по значению обязано байт-в-байт совпасть с тем, что было
/// зарегистрировано. Транзитные поля (отображаемое имя) сюда не входят.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub filter: Filter,
}

impl SubscriptionRecord {
    pub fn encode(&self) -> PubSubResult<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    pub fn decode(raw: &[u8]) -> PubSubResult<Self> {
        Ok(serde_json::from_slice(raw)?)
    }

    /// Ключ приватной очереди доставки подписки на её шарде.
    pub fn queue_key(&self) -> &str {
        &self.id
    }
}

/// Активная подписка.
///
/// `assignment` выбирается при создании и не меняется: подписка
/// зарегистрирована ровно в одном реестре, и её очередь живёт на том
/// же шарде. Миграция — только через удаление и пересоздание.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub id: String,
    pub event_type: String,
    pub filter: Filter,
    /// Shard id, выбранный стратегией назначения.
    pub assignment: String,
    /// Отображаемое имя для логов; в реестр не сериализуется.
    pub name: Option<String>,
}

impl Subscription {
    pub fn record(&self) -> SubscriptionRecord {
        SubscriptionRecord {
            id: self.id.clone(),
            event_type: self.event_type.clone(),
            filter: self.filter.clone(),
        }
    }

    pub fn queue_key(&self) -> &str {
        &self.id
    }
}

/// Заявка на подписку от потребителя.
///
/// Без `id` движок присвоит новый UUID: одинаковые `(type, filter)`
/// дают независимые подписки с независимыми очередями.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionDescriptor {
    pub id: Option<String>,
    pub event_type: String,
    pub filter: Filter,
    pub name: Option<String>,
}

impl SubscriptionDescriptor {
    pub fn new(event_type: impl Into<String>, filter: Filter) -> Self {
        Self {
            id: None,
            event_type: event_type.into(),
            filter,
            name: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}
