use serde::Deserialize;
use std::path::Path;

/// Workload knobs for one exchange run. Every field has a default, so an
/// empty TOML file (or no file at all) gives the stock demonstration:
/// 2 producers x 8 items into a 5-slot ring, drained by 2 consumers.
#[derive(Deserialize, Debug, Clone)]
pub struct ExchangeConfig {
    #[serde(default = "defaults::capacity")]
    pub capacity: usize,
    #[serde(default = "defaults::producers")]
    pub producers: usize,
    #[serde(default = "defaults::consumers")]
    pub consumers: usize,
    #[serde(default = "defaults::items_per_producer")]
    pub items_per_producer: u64,
    #[serde(default = "defaults::items_per_consumer")]
    pub items_per_consumer: u64,
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),

    #[error("'{field}' must be positive (got {value})")]
    NonPositive { field: &'static str, value: u64 },
}

mod defaults {
    pub fn capacity() -> usize {
        5
    }

    pub fn producers() -> usize {
        2
    }

    pub fn consumers() -> usize {
        2
    }

    pub fn items_per_producer() -> u64 {
        8
    }

    pub fn items_per_consumer() -> u64 {
        8
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            capacity: defaults::capacity(),
            producers: defaults::producers(),
            consumers: defaults::consumers(),
            items_per_producer: defaults::items_per_producer(),
            items_per_consumer: defaults::items_per_consumer(),
            log_level: defaults::log_level(),
        }
    }
}

impl ExchangeConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let toml_to_str = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config: ExchangeConfig = toml::from_str(&toml_to_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Every count must be positive: a zero anywhere means either nothing
    /// to run or a queue that can never accept an item, and the coordinator
    /// must not start.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&'static str, u64); 5] = [
            ("capacity", self.capacity as u64),
            ("producers", self.producers as u64),
            ("consumers", self.consumers as u64),
            ("items_per_producer", self.items_per_producer),
            ("items_per_consumer", self.items_per_consumer),
        ];
        for (field, value) in checks {
            if value == 0 {
                return Err(ConfigError::NonPositive { field, value });
            }
        }
        Ok(())
    }

    /// Total items the producer side will generate.
    pub fn produced_total(&self) -> u64 {
        self.producers as u64 * self.items_per_producer
    }

    /// Total items the consumer side will ask for.
    pub fn consumed_total(&self) -> u64 {
        self.consumers as u64 * self.items_per_consumer
    }
}
