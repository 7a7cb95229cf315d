use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PubSubResult;

/// Публикуемое событие.
///
/// Идентификатор присваивает внешний продюсер; `type` — категория,
/// по которой событие сопоставляется с подписками. Остальные поля
/// произвольны и видны фильтрам подписок. Событие неизменяемо:
/// движок только сериализует его копию в очереди доставки.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Event {
    pub fn new(id: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            event_type: event_type.into(),
            fields: Map::new(),
        }
    }

    /// Добавляет поле события (builder-стиль).
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Значение атрибута по имени; `id` и `type` видны наравне
    /// с остальными полями.
    pub fn field_value(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::String(self.id.clone())),
            "type" => Some(Value::String(self.event_type.clone())),
            _ => self.fields.get(name).cloned(),
        }
    }

    /// Сериализованная копия события для очереди доставки.
    pub fn to_payload(&self) -> PubSubResult<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    pub fn from_payload(payload: &[u8]) -> PubSubResult<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}
