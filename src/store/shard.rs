use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::PubSubResult;

/// Командный интерфейс одного backing-шарда.
///
/// Каждый метод — одна атомарная команда хранилища; движок никогда не
/// строит из них многошаговых транзакций и не держит собственных блокировок
/// поверх подключения. Подключение безопасно делить между задачами.
#[async_trait]
pub trait ShardStore: Send + Sync {
    /// Добавляет элемент в множество под ключом `key`.
    /// Возвращает `true`, если элемент новый.
    async fn set_add(&self, key: &str, member: Bytes) -> PubSubResult<bool>;

    /// Удаляет элемент множества по точному значению.
    /// Отсутствующий элемент — не ошибка, возвращается `false`.
    async fn set_remove(&self, key: &str, member: &[u8]) -> PubSubResult<bool>;

    /// Снимок всех элементов множества на момент вызова.
    async fn set_members(&self, key: &str) -> PubSubResult<Vec<Bytes>>;

    /// Добавляет элемент в хвост очереди. Возвращает новую длину очереди.
    async fn queue_push(&self, key: &str, item: Bytes) -> PubSubResult<u64>;

    /// Снимает элемент с головы очереди, блокируясь не дольше `timeout`.
    ///
    /// Истечение таймаута — не ошибка: возвращается `None`.
    /// Нулевой таймаут — немедленный неблокирующий опрос.
    async fn queue_pop(&self, key: &str, timeout: Duration) -> PubSubResult<Option<Bytes>>;

    /// Удаляет очередь вместе с недоставленными элементами.
    async fn queue_delete(&self, key: &str) -> PubSubResult<bool>;

    /// Полная очистка шарда (только для тестов/обслуживания).
    async fn flush(&self) -> PubSubResult<()>;
}
