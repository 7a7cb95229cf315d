use std::{collections::HashSet, sync::Arc, time::Duration};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{
    assign::{RandomAssigner, ShardAssigner},
    event::Event,
    liveness::{self, ActivityTracker},
    registry::SubscriptionRegistry,
    subscription::{Subscription, SubscriptionDescriptor},
};
use crate::{
    config::Settings,
    error::{PubSubError, PubSubResult},
    store::{MemoryConnector, ShardConnector, ShardPool},
};

/// Итог fanout'а на одном шарде: число поставленных в очереди копий
/// события либо ошибка этого шарда.
#[derive(Debug)]
pub struct ShardOutcome {
    pub shard_id: String,
    pub result: PubSubResult<usize>,
}

/// Агрегированный итог публикации по всем шардам.
///
/// Ошибка одного шарда не откатывает доставку на остальных: частичный
/// успех всегда доступен вызывающему, даже когда `publish` в целом
/// завершился ошибкой.
#[derive(Debug, Default)]
pub struct PublishReport {
    pub outcomes: Vec<ShardOutcome>,
}

impl PublishReport {
    /// Сколько копий события встало в очереди по всем шардам.
    pub fn enqueued(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .sum()
    }

    /// Шарды, на которых fanout завершился ошибкой.
    pub fn failed_shards(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_err())
            .map(|o| o.shard_id.as_str())
            .collect()
    }

    pub fn is_total_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }
}

/// Движок подписочного pub/sub поверх шардированных backing-инстансов.
///
/// Продюсеры зовут `publish`; потребители создают подписку, крутят
/// блокирующий `receive` и удаляют подписку (или её снимает внешний
/// sweeper по порогу давности). Пул подключений передаётся при
/// конструировании и живёт столько же, сколько движок.
pub struct PubSubEngine {
    pool: Arc<ShardPool>,
    registry: SubscriptionRegistry,
    assigner: Box<dyn ShardAssigner>,
    activity: ActivityTracker,
    receive_timeout: Duration,
    production: bool,
}

impl PubSubEngine {
    /// Движок на настройках из окружения и выбранном транспорте.
    pub fn new(settings: &Settings, connector: Box<dyn ShardConnector>) -> Self {
        let pool = Arc::new(ShardPool::new(settings.shards.clone(), connector));
        Self::with_pool(
            pool,
            Duration::from_secs(settings.receive_timeout_secs),
            settings.is_production(),
        )
    }

    /// Движок с внутрипроцессными шардами (встраиваемый и тестовый
    /// режим).
    pub fn in_memory(settings: &Settings) -> Self {
        Self::new(settings, Box::new(MemoryConnector))
    }

    /// Движок поверх готового пула подключений.
    pub fn with_pool(pool: Arc<ShardPool>, receive_timeout: Duration, production: bool) -> Self {
        if pool.is_empty() {
            tracing::warn!("no shards configured, every pub/sub operation will fail");
        }
        Self {
            registry: SubscriptionRegistry::new(pool.clone()),
            pool,
            assigner: Box::new(RandomAssigner),
            activity: ActivityTracker::new(),
            receive_timeout,
            production,
        }
    }

    /// Подменяет стратегию назначения шарда.
    pub fn with_assigner(mut self, assigner: Box<dyn ShardAssigner>) -> Self {
        self.assigner = assigner;
        self
    }

    /// Подписки переживают перезапуск потребителя: они лежат в реестре
    /// шарда, а не в состоянии соединения.
    pub fn supports_durable_subscriptions(&self) -> bool {
        true
    }

    pub fn receive_timeout(&self) -> Duration {
        self.receive_timeout
    }

    /// Учёт последней активности — для внешнего sweeper'а.
    pub fn activity(&self) -> &ActivityTracker {
        &self.activity
    }

    /// Создаёт подписку: валидирует фильтр, выбирает шард и пишет
    /// запись в реестр этого шарда. Назначение неизменно до удаления.
    pub async fn create_subscription(
        &self,
        descriptor: SubscriptionDescriptor,
    ) -> PubSubResult<Subscription> {
        descriptor.filter.validate()?;

        let shard_ids = self.pool.shard_ids();
        let assignment = self.assigner.assign(&shard_ids).ok_or_else(|| {
            PubSubError::Configuration("no shards configured for assignment".to_string())
        })?;

        let subscription = Subscription {
            id: descriptor
                .id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            event_type: descriptor.event_type,
            filter: descriptor.filter,
            assignment,
            name: descriptor.name,
        };

        self.registry.register(&subscription).await?;
        self.activity.touch(&subscription.id);

        tracing::info!(
            subscription = %subscription.id,
            event_type = %subscription.event_type,
            shard = %subscription.assignment,
            "subscription created"
        );
        Ok(subscription)
    }

    /// Удаляет подписку из реестра её шарда и чистит очередь
    /// недоставленных событий. Отсутствующая подписка — no-op.
    pub async fn remove_subscription(&self, subscription: &Subscription) -> PubSubResult<bool> {
        tracing::info!(subscription = %subscription.id, "removing subscription");

        let removed = self.registry.remove(subscription).await?;
        let client = self.pool.client_for(&subscription.assignment)?;
        client.queue_delete(subscription.queue_key()).await?;
        self.activity.forget(&subscription.id);

        Ok(removed)
    }

    /// Fanout события по всем шардам.
    ///
    /// Шарды обрабатываются независимыми параллельными задачами:
    /// медленный или упавший шард не задерживает и не блокирует
    /// остальные. Итоги собираются в `PublishReport`; при ошибке хотя
    /// бы одного шарда вызов завершается `PublishFailed` с тем же
    /// отчётом внутри.
    pub async fn publish(&self, event_type: &str, event: &Event) -> PubSubResult<PublishReport> {
        tracing::info!(event_type, event_id = %event.id, "publishing event");

        let payload = event.to_payload()?;
        let shared = Arc::new(event.clone());

        let mut tasks: Vec<(String, JoinHandle<PubSubResult<usize>>)> = Vec::new();
        for shard_id in self.pool.shard_ids() {
            let task = fanout_shard(
                self.registry.clone(),
                self.pool.clone(),
                shard_id.clone(),
                event_type.to_string(),
                shared.clone(),
                payload.clone(),
            );
            tasks.push((shard_id, tokio::spawn(task)));
        }

        let mut report = PublishReport::default();
        for (shard_id, handle) in tasks {
            let result = match handle.await {
                Ok(result) => result,
                Err(err) => Err(PubSubError::Transport(format!("fanout task failed: {err}"))),
            };
            if let Err(err) = &result {
                tracing::warn!(shard = %shard_id, error = %err, "fanout failed on shard");
            }
            report.outcomes.push(ShardOutcome { shard_id, result });
        }

        if report.is_total_success() {
            Ok(report)
        } else {
            Err(PubSubError::PublishFailed { report })
        }
    }

    /// Блокирующее получение следующего события подписки.
    ///
    /// Подвешивает только вызывающую задачу, не дольше `timeout`.
    /// Истечение таймаута — штатный результат `None`, не ошибка.
    /// Событие снимается с очереди ровно один раз, redelivery нет.
    pub async fn receive(
        &self,
        subscription: &Subscription,
        timeout: Duration,
    ) -> PubSubResult<Option<Event>> {
        tracing::debug!(
            subscription = %subscription.id,
            shard = %subscription.assignment,
            "receiving on subscription queue"
        );

        let client = self.pool.client_for(&subscription.assignment)?;
        match client.queue_pop(subscription.queue_key(), timeout).await? {
            Some(payload) => {
                let event = Event::from_payload(&payload)?;
                self.activity.touch(&subscription.id);
                tracing::debug!(
                    subscription = %subscription.id,
                    event_id = %event.id,
                    "received event"
                );
                Ok(Some(event))
            }
            None => Ok(None),
        }
    }

    /// `receive` с таймаутом по умолчанию.
    pub async fn receive_default(&self, subscription: &Subscription) -> PubSubResult<Option<Event>> {
        self.receive(subscription, self.receive_timeout).await
    }

    /// Порог давности для текущего таймаута `receive`.
    pub fn stale_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        liveness::stale_cutoff(now, self.receive_timeout)
    }

    /// Подписки, брошенные относительно `now`.
    pub fn stale_subscription_ids(&self, now: DateTime<Utc>) -> Vec<String> {
        self.activity.stale_ids(self.stale_cutoff(now))
    }

    /// Снимает брошенные подписки из реестров. Запуск по расписанию —
    /// забота внешнего планировщика.
    pub async fn sweep_stale(&self, now: DateTime<Utc>) -> PubSubResult<usize> {
        let stale: HashSet<String> = self.stale_subscription_ids(now).into_iter().collect();
        if stale.is_empty() {
            return Ok(0);
        }

        let mut removed = 0;
        for shard_id in self.pool.shard_ids() {
            for record in self.registry.list(&shard_id).await? {
                if !stale.contains(&record.id) {
                    continue;
                }
                let subscription = Subscription {
                    id: record.id,
                    event_type: record.event_type,
                    filter: record.filter,
                    assignment: shard_id.clone(),
                    name: None,
                };
                if self.remove_subscription(&subscription).await? {
                    removed += 1;
                }
            }
        }

        tracing::info!(removed, "stale subscription sweep finished");
        Ok(removed)
    }

    /// Полный сброс состояния всех шардов — только для тестов.
    ///
    /// В production-окружении успешный no-op: частичного сброса не
    /// бывает.
    pub async fn reset_for_test(&self) -> PubSubResult<()> {
        if self.production {
            return Ok(());
        }

        tracing::info!("resetting all shard state for test");
        for shard_id in self.pool.shard_ids() {
            self.pool.client_for(&shard_id)?.flush().await?;
        }
        self.activity.clear();
        Ok(())
    }
}

/// Fanout одного шарда: снимок реестра, отбор по типу (без вызова
/// матчера), проверка фильтра, постановка копии события в хвост
/// очереди каждого совпадения. Не больше одной постановки на подписку
/// за публикацию.
async fn fanout_shard(
    registry: SubscriptionRegistry,
    pool: Arc<ShardPool>,
    shard_id: String,
    event_type: String,
    event: Arc<Event>,
    payload: Bytes,
) -> PubSubResult<usize> {
    let client = pool.client_for(&shard_id)?;
    let records = registry.list(&shard_id).await?;

    let mut enqueued = 0;
    for record in records {
        if record.event_type != event_type {
            continue;
        }
        if !record.filter.matches(&event) {
            continue;
        }

        tracing::debug!(
            subscription = %record.id,
            shard = %shard_id,
            event_id = %event.id,
            "subscription matched"
        );
        client.queue_push(record.queue_key(), payload.clone()).await?;
        enqueued += 1;
    }

    Ok(enqueued)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ShardAddr,
        pubsub::filter::{Filter, FilterOp},
    };

    fn settings(shard_ids: &[&str]) -> Settings {
        Settings {
            shards: shard_ids
                .iter()
                .enumerate()
                .map(|(i, id)| {
                    (
                        id.to_string(),
                        ShardAddr {
                            host: "127.0.0.1".into(),
                            port: 6379 + i as u16,
                        },
                    )
                })
                .collect(),
            environment: "test".to_string(),
            receive_timeout_secs: 300,
        }
    }

    fn temperature(device: &str, value: f64) -> Event {
        Event::new(Uuid::new_v4().to_string(), "temperature")
            .with_field("deviceId", device)
            .with_field("value", value)
    }

    /// Тест проверяет полный цикл: подписка, публикация, получение.
    #[tokio::test]
    async fn test_publish_receive_cycle() {
        let engine = PubSubEngine::in_memory(&settings(&["redis1"]));
        let sub = engine
            .create_subscription(SubscriptionDescriptor::new(
                "temperature",
                Filter::empty().with("deviceId", FilterOp::Eq, "d1"),
            ))
            .await
            .unwrap();

        let event = temperature("d1", 21.5);
        let report = engine.publish("temperature", &event).await.unwrap();
        assert_eq!(report.enqueued(), 1);
        assert!(report.is_total_success());

        let received = engine.receive(&sub, Duration::ZERO).await.unwrap();
        assert_eq!(received, Some(event));
    }

    /// Тест проверяет, что событие чужого устройства не доставляется.
    #[tokio::test]
    async fn test_filtered_out_event_is_not_delivered() {
        let engine = PubSubEngine::in_memory(&settings(&["redis1"]));
        let sub = engine
            .create_subscription(SubscriptionDescriptor::new(
                "temperature",
                Filter::empty().with("deviceId", FilterOp::Eq, "d1"),
            ))
            .await
            .unwrap();

        let report = engine
            .publish("temperature", &temperature("d2", 99.0))
            .await
            .unwrap();
        assert_eq!(report.enqueued(), 0);

        let received = engine.receive(&sub, Duration::ZERO).await.unwrap();
        assert_eq!(received, None);
    }

    /// Тест проверяет отбор по типу события до вызова матчера.
    #[tokio::test]
    async fn test_type_mismatch_short_circuits() {
        let engine = PubSubEngine::in_memory(&settings(&["redis1"]));
        let sub = engine
            .create_subscription(SubscriptionDescriptor::new("humidity", Filter::empty()))
            .await
            .unwrap();

        engine
            .publish("temperature", &temperature("d1", 21.5))
            .await
            .unwrap();

        assert_eq!(engine.receive(&sub, Duration::ZERO).await.unwrap(), None);
    }

    /// Тест проверяет, что подписка с невалидным фильтром отклоняется
    /// на этапе создания.
    #[tokio::test]
    async fn test_create_rejects_malformed_filter() {
        let engine = PubSubEngine::in_memory(&settings(&["redis1"]));
        let err = engine
            .create_subscription(SubscriptionDescriptor::new(
                "temperature",
                Filter::empty().with("value", FilterOp::Gt, "not-a-number"),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, PubSubError::Validation(_)));
    }

    /// Тест проверяет FIFO внутри очереди одной подписки.
    #[tokio::test]
    async fn test_fifo_within_subscription() {
        let engine = PubSubEngine::in_memory(&settings(&["redis1"]));
        let sub = engine
            .create_subscription(SubscriptionDescriptor::new("temperature", Filter::empty()))
            .await
            .unwrap();

        for value in [1.0, 2.0, 3.0] {
            engine
                .publish("temperature", &temperature("d1", value))
                .await
                .unwrap();
        }

        for expected in [1.0, 2.0, 3.0] {
            let event = engine
                .receive(&sub, Duration::ZERO)
                .await
                .unwrap()
                .expect("event in order");
            assert_eq!(event.field_value("value"), Some(serde_json::json!(expected)));
        }
    }

    /// Тест проверяет, что create без id каждый раз даёт новую
    /// независимую подписку (id не выводится из содержимого).
    #[tokio::test]
    async fn test_identical_descriptors_are_independent() {
        let engine = PubSubEngine::in_memory(&settings(&["redis1"]));
        let descriptor = SubscriptionDescriptor::new("temperature", Filter::empty());

        let a = engine.create_subscription(descriptor.clone()).await.unwrap();
        let b = engine.create_subscription(descriptor).await.unwrap();
        assert_ne!(a.id, b.id);

        engine
            .publish("temperature", &temperature("d1", 5.0))
            .await
            .unwrap();

        assert!(engine.receive(&a, Duration::ZERO).await.unwrap().is_some());
        assert!(engine.receive(&b, Duration::ZERO).await.unwrap().is_some());
    }

    /// Тест проверяет отсутствие доставки после удаления подписки.
    #[tokio::test]
    async fn test_no_delivery_after_removal() {
        let engine = PubSubEngine::in_memory(&settings(&["redis1"]));
        let sub = engine
            .create_subscription(SubscriptionDescriptor::new("temperature", Filter::empty()))
            .await
            .unwrap();

        assert!(engine.remove_subscription(&sub).await.unwrap());
        // повторное удаление — no-op
        assert!(!engine.remove_subscription(&sub).await.unwrap());

        engine
            .publish("temperature", &temperature("d1", 21.5))
            .await
            .unwrap();
        assert_eq!(engine.receive(&sub, Duration::ZERO).await.unwrap(), None);
    }

    /// Тест проверяет sweep брошенных подписок и то, что свежие
    /// подписки sweep не трогает.
    #[tokio::test]
    async fn test_sweep_stale_removes_only_abandoned() {
        let engine = PubSubEngine::in_memory(&settings(&["redis1"]));
        let stale = engine
            .create_subscription(SubscriptionDescriptor::new("temperature", Filter::empty()))
            .await
            .unwrap();
        let fresh = engine
            .create_subscription(SubscriptionDescriptor::new("temperature", Filter::empty()))
            .await
            .unwrap();

        let now = Utc::now();
        engine
            .activity()
            .touch_at(&stale.id, now - chrono::Duration::seconds(5000));

        assert_eq!(engine.stale_subscription_ids(now), vec![stale.id.clone()]);
        assert_eq!(engine.sweep_stale(now).await.unwrap(), 1);

        engine
            .publish("temperature", &temperature("d1", 1.0))
            .await
            .unwrap();
        assert_eq!(engine.receive(&stale, Duration::ZERO).await.unwrap(), None);
        assert!(engine.receive(&fresh, Duration::ZERO).await.unwrap().is_some());
    }

    /// Тест проверяет, что в production сброс — успешный no-op.
    #[tokio::test]
    async fn test_reset_is_noop_in_production() {
        let mut prod = settings(&["redis1"]);
        prod.environment = "production".to_string();
        let engine = PubSubEngine::in_memory(&prod);

        let sub = engine
            .create_subscription(SubscriptionDescriptor::new("temperature", Filter::empty()))
            .await
            .unwrap();
        engine
            .publish("temperature", &temperature("d1", 3.0))
            .await
            .unwrap();

        engine.reset_for_test().await.unwrap();

        // состояние нетронуто
        assert!(engine.receive(&sub, Duration::ZERO).await.unwrap().is_some());
    }

    /// Тест проверяет, что вне production сброс чистит все шарды.
    #[tokio::test]
    async fn test_reset_clears_state() {
        let engine = PubSubEngine::in_memory(&settings(&["redis1", "redis2"]));
        let sub = engine
            .create_subscription(SubscriptionDescriptor::new("temperature", Filter::empty()))
            .await
            .unwrap();
        engine
            .publish("temperature", &temperature("d1", 3.0))
            .await
            .unwrap();

        engine.reset_for_test().await.unwrap();

        assert_eq!(engine.receive(&sub, Duration::ZERO).await.unwrap(), None);
        assert!(engine.stale_subscription_ids(Utc::now() + chrono::Duration::days(1)).is_empty());
    }

    /// Тест проверяет публикацию при пустой конфигурации шардов:
    /// создание подписки невозможно, publish — пустой успех.
    #[tokio::test]
    async fn test_empty_configuration() {
        let engine = PubSubEngine::in_memory(&settings(&[]));

        let err = engine
            .create_subscription(SubscriptionDescriptor::new("temperature", Filter::empty()))
            .await
            .unwrap_err();
        assert!(err.is_configuration());

        let report = engine
            .publish("temperature", &temperature("d1", 1.0))
            .await
            .unwrap();
        assert!(report.outcomes.is_empty());
    }
}
