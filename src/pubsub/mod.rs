//! Подсистема подписочного Publish–Subscribe.
//!
//! Этот модуль реализует распределение типизированных событий по
//! отфильтрованным подпискам, шардированным между backing-инстансами:
//!
//! - `event`: публикуемое событие и его сериализация в очереди.
//! - `filter`: предикат подписки (AND условий поле/оператор/значение).
//! - `subscription`: подписка, её реестровая запись и заявка на
//!   создание.
//! - `assign`: стратегия выбора шарда для новой подписки.
//! - `registry`: реестр подписок каждого шарда.
//! - `liveness`: порог давности и учёт последней активности.
//! - `engine`: fanout-публикация, блокирующее получение и жизненный
//!   цикл подписок.

pub mod assign;
pub mod engine;
pub mod event;
pub mod filter;
pub mod liveness;
pub mod registry;
pub mod subscription;

// Публичный экспорт основных типов подсистемы, чтобы упростить
// доступ к ним из внешнего кода.
pub use assign::{RandomAssigner, ShardAssigner};
pub use engine::{PubSubEngine, PublishReport, ShardOutcome};
pub use event::Event;
pub use filter::{Clause, Filter, FilterOp};
pub use liveness::{stale_cutoff, ActivityTracker, STALE_TIMEOUT_FACTOR};
pub use registry::{SubscriptionRegistry, SUBSCRIPTIONS_KEY};
pub use subscription::{Subscription, SubscriptionDescriptor, SubscriptionRecord};
