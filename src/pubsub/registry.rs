use std::sync::Arc;

use super::subscription::{Subscription, SubscriptionRecord};
use crate::{error::PubSubResult, store::ShardPool};

/// Ключ реестрового множества подписок на каждом шарде.
pub const SUBSCRIPTIONS_KEY: &str = "pubsub.subscriptions";

/// Реестр подписок поверх пула шардов.
///
/// Каждая операция — одна атомарная set-команда на шарде подписки;
/// `list` — снимок без гарантий изоляции сильнее атомарности команды.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    pool: Arc<ShardPool>,
}

impl SubscriptionRegistry {
    pub fn new(pool: Arc<ShardPool>) -> Self {
        Self { pool }
    }

    /// Регистрирует подписку в реестре её шарда. Повторная регистрация
    /// идентичного содержимого не создаёт дубликата (set-семантика).
    pub async fn register(&self, subscription: &Subscription) -> PubSubResult<()> {
        let client = self.pool.client_for(&subscription.assignment)?;
        let encoded = subscription.record().encode()?;
        client.set_add(SUBSCRIPTIONS_KEY, encoded).await?;
        Ok(())
    }

    /// Снимок подписок шарда. Нечитаемые записи пропускаются
    /// с предупреждением, а не валят весь снимок.
    pub async fn list(&self, shard_id: &str) -> PubSubResult<Vec<SubscriptionRecord>> {
        let client = self.pool.client_for(shard_id)?;
        let members = client.set_members(SUBSCRIPTIONS_KEY).await?;

        let mut records = Vec::with_capacity(members.len());
        for member in members {
            match SubscriptionRecord::decode(&member) {
                Ok(record) => records.push(record),
                Err(err) => {
                    tracing::warn!(shard = shard_id, error = %err, "skipping undecodable registry member");
                }
            }
        }
        Ok(records)
    }

    /// Удаляет подписку по точному сериализованному значению.
    /// Отсутствие в реестре — не ошибка: возвращается `false`.
    pub async fn remove(&self, subscription: &Subscription) -> PubSubResult<bool> {
        let client = self.pool.client_for(&subscription.assignment)?;
        let encoded = subscription.record().encode()?;
        client.set_remove(SUBSCRIPTIONS_KEY, &encoded).await
    }
}
