use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Во сколько таймаутов `receive` молчания подписка считается брошенной.
pub const STALE_TIMEOUT_FACTOR: u64 = 4;

/// Порог давности: подписка с последней активностью раньше порога
/// подлежит удалению внешним sweeper'ом. Сам движок по порогу ничего
/// не удаляет.
pub fn stale_cutoff(now: DateTime<Utc>, receive_timeout: Duration) -> DateTime<Utc> {
    let window = chrono::Duration::seconds((STALE_TIMEOUT_FACTOR * receive_timeout.as_secs()) as i64);
    now - window
}

/// Учёт последней активности подписок.
///
/// Отметка ставится при создании и обновляется при каждом успешном
/// `receive`; удаление подписки убирает запись. Без этих отметок
/// порог давности непроверяем.
#[derive(Default)]
pub struct ActivityTracker {
    last_active: DashMap<String, DateTime<Utc>>,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn touch(&self, subscription_id: &str) {
        self.touch_at(subscription_id, Utc::now());
    }

    pub fn touch_at(&self, subscription_id: &str, when: DateTime<Utc>) {
        self.last_active.insert(subscription_id.to_string(), when);
    }

    pub fn forget(&self, subscription_id: &str) {
        self.last_active.remove(subscription_id);
    }

    pub fn last_active(&self, subscription_id: &str) -> Option<DateTime<Utc>> {
        self.last_active.get(subscription_id).map(|e| *e.value())
    }

    /// Подписки, чья последняя активность раньше порога.
    pub fn stale_ids(&self, cutoff: DateTime<Utc>) -> Vec<String> {
        self.last_active
            .iter()
            .filter(|entry| *entry.value() < cutoff)
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn clear(&self) {
        self.last_active.clear();
    }
}
