use std::{
    collections::{HashSet, VecDeque},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::shard::ShardStore;
use crate::error::PubSubResult;

/// Одна очередь доставки: элементы под коротким мьютексом плюс
/// уведомление для разблокировки ожидающих потребителей.
struct QueueSlot {
    items: Mutex<VecDeque<Bytes>>,
    notify: Notify,
}

impl QueueSlot {
    fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }
}

/// Внутрипроцессный backing-шард.
///
/// Реестровые множества и очереди доставки живут в `DashMap`, каждая
/// операция трейта — одна атомарная команда над одним ключом.
pub struct MemoryShard {
    sets: DashMap<String, HashSet<Bytes>>,
    queues: DashMap<String, Arc<QueueSlot>>,
}

impl MemoryShard {
    pub fn new() -> Self {
        Self {
            sets: DashMap::new(),
            queues: DashMap::new(),
        }
    }

    fn queue_slot(&self, key: &str) -> Arc<QueueSlot> {
        self.queues
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(QueueSlot::new()))
            .clone()
    }
}

impl Default for MemoryShard {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShardStore for MemoryShard {
    async fn set_add(&self, key: &str, member: Bytes) -> PubSubResult<bool> {
        Ok(self.sets.entry(key.to_string()).or_default().insert(member))
    }

    async fn set_remove(&self, key: &str, member: &[u8]) -> PubSubResult<bool> {
        match self.sets.get_mut(key) {
            Some(mut set) => Ok(set.remove(member)),
            None => Ok(false),
        }
    }

    async fn set_members(&self, key: &str) -> PubSubResult<Vec<Bytes>> {
        Ok(self
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn queue_push(&self, key: &str, item: Bytes) -> PubSubResult<u64> {
        let slot = self.queue_slot(key);
        let len = {
            let mut items = slot.items.lock();
            items.push_back(item);
            items.len() as u64
        };
        slot.notify.notify_one();
        Ok(len)
    }

    async fn queue_pop(&self, key: &str, timeout: Duration) -> PubSubResult<Option<Bytes>> {
        let deadline = tokio::time::Instant::now() + timeout;
        let slot = self.queue_slot(key);

        loop {
            // Notified создаётся до проверки очереди: push между проверкой
            // и ожиданием оставит permit, и await вернётся сразу.
            let notified = slot.notify.notified();

            if let Some(item) = slot.items.lock().pop_front() {
                return Ok(Some(item));
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn queue_delete(&self, key: &str) -> PubSubResult<bool> {
        Ok(self.queues.remove(key).is_some())
    }

    async fn flush(&self) -> PubSubResult<()> {
        self.sets.clear();
        self.queues.clear();
        Ok(())
    }
}
