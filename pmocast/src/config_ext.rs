//! Extension adding cast target settings to `pmoconfig::Config`.

use std::time::Duration;

use anyhow::{Result, anyhow};
use pmoconfig::Config;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use url::Url;

use crate::channel::DEFAULT_RECONNECT_DELAY;
use crate::discovery::DEFAULT_DISCOVERY_TIMEOUT;

/// A cast target as listed under `cast.targets`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastTarget {
    pub name: String,
    pub url: String,
}

impl CastTarget {
    pub fn parsed_url(&self) -> Result<Url> {
        Url::parse(&self.url).map_err(|e| anyhow!("Invalid url for cast target {}: {}", self.name, e))
    }
}

/// Cast settings stored in pmoconfig.
///
/// ```rust,ignore
/// use pmoconfig::get_config;
/// use pmocast::CastConfigExt;
///
/// let config = get_config();
/// for target in config.get_cast_targets()? {
///     println!("{} -> {}", target.name, target.url);
/// }
/// ```
pub trait CastConfigExt {
    /// Configured cast targets. Missing or empty list yields no target.
    fn get_cast_targets(&self) -> Result<Vec<CastTarget>>;
    fn set_cast_targets(&self, targets: &[CastTarget]) -> Result<()>;

    /// Delay before the command channel reconnects (`cast.reconnect_delay_ms`).
    fn get_cast_reconnect_delay(&self) -> Result<Duration>;
    fn set_cast_reconnect_delay(&self, delay: Duration) -> Result<()>;

    /// How long startup discovery waits for a playing target
    /// (`cast.discovery_timeout_ms`).
    fn get_cast_discovery_timeout(&self) -> Result<Duration>;
    fn set_cast_discovery_timeout(&self, timeout: Duration) -> Result<()>;
}

impl CastConfigExt for Config {
    fn get_cast_targets(&self) -> Result<Vec<CastTarget>> {
        match self.get_value(&["cast", "targets"]) {
            Ok(Value::Null) | Err(_) => Ok(Vec::new()),
            Ok(_) => self.get_typed(&["cast", "targets"]),
        }
    }

    fn set_cast_targets(&self, targets: &[CastTarget]) -> Result<()> {
        let value = serde_yaml::to_value(targets)?;
        self.set_value(&["cast", "targets"], value)
    }

    fn get_cast_reconnect_delay(&self) -> Result<Duration> {
        Ok(get_millis(self, &["cast", "reconnect_delay_ms"]).unwrap_or(DEFAULT_RECONNECT_DELAY))
    }

    fn set_cast_reconnect_delay(&self, delay: Duration) -> Result<()> {
        set_millis(self, &["cast", "reconnect_delay_ms"], delay)
    }

    fn get_cast_discovery_timeout(&self) -> Result<Duration> {
        Ok(get_millis(self, &["cast", "discovery_timeout_ms"]).unwrap_or(DEFAULT_DISCOVERY_TIMEOUT))
    }

    fn set_cast_discovery_timeout(&self, timeout: Duration) -> Result<()> {
        set_millis(self, &["cast", "discovery_timeout_ms"], timeout)
    }
}

fn get_millis(config: &Config, path: &[&str]) -> Option<Duration> {
    match config.get_value(path) {
        Ok(Value::Number(n)) => n.as_u64().map(Duration::from_millis),
        _ => None,
    }
}

fn set_millis(config: &Config, path: &[&str], value: Duration) -> Result<()> {
    let millis = u64::try_from(value.as_millis())?;
    config.set_value(path, Value::Number(millis.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn load(yaml: &str) -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.yaml"), yaml).unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        (dir, config)
    }

    #[test]
    fn test_defaults() {
        let (_dir, config) = load("{}\n");
        assert!(config.get_cast_targets().unwrap().is_empty());
        assert_eq!(config.get_cast_reconnect_delay().unwrap(), Duration::from_millis(500));
        assert_eq!(
            config.get_cast_discovery_timeout().unwrap(),
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn test_targets_from_file() {
        let (_dir, config) = load(
            "cast:\n  targets:\n    - name: Living room\n      url: http://living.local:4533/\n",
        );
        let targets = config.get_cast_targets().unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].name, "Living room");
        assert_eq!(
            targets[0].parsed_url().unwrap().host_str(),
            Some("living.local")
        );
    }

    #[test]
    fn test_setters_persist() {
        let (dir, config) = load("{}\n");
        let targets = vec![CastTarget {
            name: "Kitchen".into(),
            url: "https://kitchen.local/".into(),
        }];
        config.set_cast_targets(&targets).unwrap();
        config
            .set_cast_reconnect_delay(Duration::from_millis(250))
            .unwrap();

        let reloaded = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(reloaded.get_cast_targets().unwrap(), targets);
        assert_eq!(
            reloaded.get_cast_reconnect_delay().unwrap(),
            Duration::from_millis(250)
        );
    }
}
