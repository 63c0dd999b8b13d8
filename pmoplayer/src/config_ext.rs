//! Extension adding player settings to `pmoconfig::Config`.

use std::time::Duration;

use anyhow::Result;
use pmoconfig::Config;
use serde_yaml::Value;

use crate::store::DEFAULT_QUEUE_SAVE_INTERVAL;

pub trait PlayerConfigExt {
    /// Interval of the periodic play queue save while playing locally
    /// (`player.queue_save_interval_secs`).
    fn get_queue_save_interval(&self) -> Result<Duration>;
    fn set_queue_save_interval(&self, interval: Duration) -> Result<()>;
}

impl PlayerConfigExt for Config {
    fn get_queue_save_interval(&self) -> Result<Duration> {
        match self.get_value(&["player", "queue_save_interval_secs"]) {
            Ok(Value::Number(n)) => Ok(n
                .as_u64()
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_QUEUE_SAVE_INTERVAL)),
            _ => Ok(DEFAULT_QUEUE_SAVE_INTERVAL),
        }
    }

    fn set_queue_save_interval(&self, interval: Duration) -> Result<()> {
        self.set_value(
            &["player", "queue_save_interval_secs"],
            Value::Number(interval.as_secs().into()),
        )
    }
}
