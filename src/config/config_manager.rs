// src/config/config_manager.rs

use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::adapters::info::BidderInfo;
use crate::currency::{CurrencyConverter, RateTable};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 单个 bidder 的配置
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct AdapterConfig {
    pub endpoint: String,
    /// 数字字符串，非法时适配器使用自己的默认值
    #[serde(default)]
    pub platform_id: Option<String>,
    #[serde(default)]
    pub max_imps_per_request: Option<usize>,
    #[serde(default)]
    pub disabled: bool,
    /// 能力声明，缺省时不做媒体类型裁剪
    #[serde(default)]
    pub info: Option<BidderInfo>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub adapters: HashMap<String, AdapterConfig>,
    /// `rates[from][to]`
    #[serde(default)]
    pub currency_rates: HashMap<String, HashMap<String, f64>>,
    /// AppNexus brand category => IAB 分类表（opts.json）
    #[serde(default)]
    pub taxonomy_file: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct AdapterOptions {
    #[serde(default)]
    iab_categories: HashMap<String, String>,
}

pub trait ConfigSource: Send + Sync {
    fn load_app_config(&self) -> Result<AppConfig, ConfigError>;
    fn load_taxonomy(&self, path: &str) -> Result<HashMap<String, String>, ConfigError>;
}

/// 从本地 JSON 文件读取配置
pub struct FileConfigSource {
    pub config_file: String,
}

impl FileConfigSource {
    pub fn new(config_file: &str) -> Self {
        Self {
            config_file: config_file.to_string(),
        }
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &str) -> Result<T, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_string(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Json {
        path: path.to_string(),
        source,
    })
}

impl ConfigSource for FileConfigSource {
    fn load_app_config(&self) -> Result<AppConfig, ConfigError> {
        read_json(&self.config_file)
    }

    fn load_taxonomy(&self, path: &str) -> Result<HashMap<String, String>, ConfigError> {
        read_json::<AdapterOptions>(path).map(|opts| opts.iab_categories)
    }
}

/// 进程级配置，构建后只读。分类表第一次用到时加载一次，之后以 `Arc` 注入各适配器。
pub struct ConfigManager {
    config: AppConfig,
    source: Box<dyn ConfigSource>,
    iab_categories: OnceCell<Arc<HashMap<String, String>>>,
}

impl ConfigManager {
    pub fn load(source: impl ConfigSource + 'static) -> Result<Self, ConfigError> {
        let config = source.load_app_config()?;
        Ok(Self {
            config,
            source: Box::new(source),
            iab_categories: OnceCell::new(),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 未禁用的 bidder，按名称排序
    pub fn enabled_adapters(&self) -> Vec<(&str, &AdapterConfig)> {
        let mut adapters: Vec<(&str, &AdapterConfig)> = self
            .config
            .adapters
            .iter()
            .filter(|(_, cfg)| !cfg.disabled)
            .map(|(name, cfg)| (name.as_str(), cfg))
            .collect();
        adapters.sort_by(|a, b| a.0.cmp(b.0));
        adapters
    }

    /// 分类表读不到时退化为空表，只记一条警告
    pub fn iab_categories(&self) -> Arc<HashMap<String, String>> {
        self.iab_categories
            .get_or_init(|| {
                let Some(path) = self.config.taxonomy_file.as_deref() else {
                    return Arc::new(HashMap::new());
                };
                match self.source.load_taxonomy(path) {
                    Ok(table) => Arc::new(table),
                    Err(e) => {
                        warn!(error = %e, "taxonomy table unavailable, category mapping disabled");
                        Arc::new(HashMap::new())
                    }
                }
            })
            .clone()
    }

    pub fn currency_converter(&self) -> Arc<dyn CurrencyConverter> {
        Arc::new(RateTable::new(self.config.currency_rates.clone()))
    }
}
