use std::{collections::HashMap, sync::Arc};

use dashmap::{mapref::entry::Entry, DashMap};

use super::{memory::MemoryShard, shard::ShardStore};
use crate::{
    config::ShardAddr,
    error::{PubSubError, PubSubResult},
};

/// Фабрика подключений к backing-шардам.
///
/// Шов для подмены транспорта: продакшен-коннектор ходит по сети,
/// тесты подставляют `MemoryConnector` или отказывающую реализацию.
pub trait ShardConnector: Send + Sync {
    fn connect(&self, shard_id: &str, addr: &ShardAddr) -> PubSubResult<Arc<dyn ShardStore>>;
}

/// Коннектор внутрипроцессных шардов: на каждый shard id создаётся
/// свой `MemoryShard`, адрес игнорируется.
pub struct MemoryConnector;

impl ShardConnector for MemoryConnector {
    fn connect(&self, _shard_id: &str, _addr: &ShardAddr) -> PubSubResult<Arc<dyn ShardStore>> {
        Ok(Arc::new(MemoryShard::new()))
    }
}

/// Пул подключений к шардам.
///
/// Одно подключение на shard id, создаётся при первом обращении и
/// кешируется на всё время жизни пула; простаивающие подключения не
/// закрываются. Ленивая инициализация синхронизирована: из гонки двух
/// вызовов ровно один создаёт подключение, второй получает его же.
pub struct ShardPool {
    addrs: HashMap<String, ShardAddr>,
    connector: Box<dyn ShardConnector>,
    clients: DashMap<String, Arc<dyn ShardStore>>,
}

impl ShardPool {
    pub fn new(addrs: HashMap<String, ShardAddr>, connector: Box<dyn ShardConnector>) -> Self {
        Self {
            addrs,
            connector,
            clients: DashMap::new(),
        }
    }

    /// Все сконфигурированные shard id.
    pub fn shard_ids(&self) -> Vec<String> {
        self.addrs.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    /// Возвращает подключение к шарду, создавая и кешируя его при
    /// первом обращении. Неизвестный shard id — ошибка конфигурации.
    pub fn client_for(&self, shard_id: &str) -> PubSubResult<Arc<dyn ShardStore>> {
        let addr = self
            .addrs
            .get(shard_id)
            .ok_or_else(|| PubSubError::UnknownShard(shard_id.to_string()))?;

        match self.clients.entry(shard_id.to_string()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let client = self.connector.connect(shard_id, addr)?;
                entry.insert(client.clone());
                Ok(client)
            }
        }
    }
}
