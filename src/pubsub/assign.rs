/// Стратегия выбора шарда для новой подписки.
///
/// Чистый выбор без побочных эффектов: сохранение назначения в реестре
/// остаётся на вызывающем. Взвешенная или least-loaded политика
/// подставляется за этим же трейтом, не трогая реестр и fanout.
pub trait ShardAssigner: Send + Sync {
    fn assign(&self, shard_ids: &[String]) -> Option<String>;
}

/// Равномерно-случайное назначение.
///
/// Политика-заглушка: нагрузку по числу подписок и трафику не
/// учитывает.
pub struct RandomAssigner;

impl ShardAssigner for RandomAssigner {
    fn assign(&self, shard_ids: &[String]) -> Option<String> {
        if shard_ids.is_empty() {
            return None;
        }
        Some(shard_ids[fastrand::usize(..shard_ids.len())].clone())
    }
}
