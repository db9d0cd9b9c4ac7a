use anyhow::Result;
use chrono::NaiveDate;
use figment::{providers::{Env, Format, Serialized, Toml}, Figment};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::{Path, PathBuf}};

use crate::ml::Hyperparameters;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub data: DataConfig,
    pub model: ModelConfig,
    pub forecast: ForecastConfig,
    pub training: TrainingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
    /// `*` allows any origin.
    pub cors_origin: String,
    pub request_timeout_secs: u64,
}
impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub orders_path: PathBuf,
    pub items_path: PathBuf,
    /// First week label kept after resampling.
    pub start_week: Option<NaiveDate>,
    /// Drop the newest week, which is usually still accumulating orders.
    pub drop_last_week: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub artifact_path: PathBuf,
    pub features_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    pub default_weeks: i64,
    pub max_weeks: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub random_state: u64,
    pub max_depth: u16,
    pub subsample: f64,
    pub timeout_secs: u64,
}

impl TrainingConfig {
    /// Hyperparameters used when a caller leaves a field unset.
    pub fn default_hyperparameters(&self) -> Hyperparameters {
        Hyperparameters {
            n_estimators: self.n_estimators,
            learning_rate: self.learning_rate,
            random_state: self.random_state,
            max_depth: self.max_depth,
            subsample: self.subsample,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8000,
                enable_cors: true,
                cors_origin: "*".to_string(),
                request_timeout_secs: 30,
            },
            data: DataConfig {
                orders_path: PathBuf::from("data/olist_orders_dataset.csv"),
                items_path: PathBuf::from("data/olist_order_items_dataset.csv"),
                start_week: NaiveDate::from_ymd_opt(2017, 1, 9),
                drop_last_week: true,
            },
            model: ModelConfig {
                artifact_path: PathBuf::from("models/sales_model.bin"),
                features_path: PathBuf::from("models/model_features.json"),
            },
            forecast: ForecastConfig {
                default_weeks: 12,
                max_weeks: 520,
            },
            training: TrainingConfig {
                n_estimators: 1000,
                learning_rate: 0.05,
                random_state: 42,
                max_depth: 6,
                subsample: 1.0,
                timeout_secs: 600,
            },
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from("config/default.toml")
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("SALES__").split("__"));
        Ok(figment.extract()?)
    }
}
