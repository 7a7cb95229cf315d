pub mod settings;

pub use settings::{Settings, ShardAddr, RECEIVE_TIMEOUT_SECS};
