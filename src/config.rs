use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;
use url::Url;

/// Process-wide configuration, resolved once from defaults and `STOCKCAST_*` env vars.
pub static CONFIG: LazyLock<Config> =
    LazyLock::new(|| Config::load().expect("FATAL: invalid stockcast configuration"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub listen_addr: String,
    pub loglevel: String,
    /// Master secret for the session cookie key. Empty means a random key per process.
    pub secret_key: String,
    pub insecure_cookie: bool,
    pub password_iterations: u32,
    pub model_path: PathBuf,
    pub market_data_url: Url,
    pub market_rate_per_minute: u32,
    pub proxy: Option<Url>,
    pub window: usize,
    pub train_ratio: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:users.db".to_string(),
            listen_addr: "0.0.0.0:5000".to_string(),
            loglevel: "info".to_string(),
            secret_key: String::new(),
            insecure_cookie: false,
            password_iterations: crate::auth::DEFAULT_ITERATIONS,
            model_path: PathBuf::from("keras_model.json"),
            market_data_url: Url::parse("https://query1.finance.yahoo.com")
                .expect("static market data url"),
            market_rate_per_minute: 60,
            proxy: None,
            window: 100,
            train_ratio: 0.70,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, figment::Error> {
        let cfg: Config = Self::figment().extract()?;
        if cfg.window == 0 {
            return Err(figment::Error::from("window must be at least 1".to_string()));
        }
        if !(cfg.train_ratio > 0.0 && cfg.train_ratio < 1.0) {
            return Err(figment::Error::from(format!(
                "train_ratio must be between 0 and 1, got {}",
                cfg.train_ratio
            )));
        }
        Ok(cfg)
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default())).merge(Env::prefixed("STOCKCAST_"))
    }

    /// Pipeline tuning derived from this config.
    pub fn pipeline(&self) -> crate::forecast::PipelineConfig {
        crate::forecast::PipelineConfig {
            window: self.window,
            train_ratio: self.train_ratio,
        }
    }
}
