// src/currency/mod.rs

use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CurrencyError {
    #[error("Currency conversion rate not found: '{from}' => '{to}'")]
    RateNotFound { from: String, to: String },
}

/// 币种换算能力，由外部提供（汇率服务、静态配置等）
pub trait CurrencyConverter: Send + Sync {
    fn convert(&self, amount: f64, from: &str, to: &str) -> Result<f64, CurrencyError>;
}

/// 基于静态汇率表的换算实现。
///
/// `rates[from][to]` 表示 1 单位 `from` 可以换多少 `to`；
/// 没有直接汇率时会尝试反向汇率取倒数。
#[derive(Debug, Clone, Default)]
pub struct RateTable {
    rates: HashMap<String, HashMap<String, f64>>,
}

impl RateTable {
    pub fn new(rates: HashMap<String, HashMap<String, f64>>) -> Self {
        let rates = rates
            .into_iter()
            .map(|(from, to)| {
                let to = to.into_iter().map(|(k, v)| (k.to_uppercase(), v)).collect();
                (from.to_uppercase(), to)
            })
            .collect();
        Self { rates }
    }

    fn rate(&self, from: &str, to: &str) -> Option<f64> {
        if let Some(rate) = self.rates.get(from).and_then(|m| m.get(to)) {
            return Some(*rate);
        }
        self.rates
            .get(to)
            .and_then(|m| m.get(from))
            .filter(|rate| **rate != 0.0)
            .map(|rate| 1.0 / rate)
    }
}

impl CurrencyConverter for RateTable {
    fn convert(&self, amount: f64, from: &str, to: &str) -> Result<f64, CurrencyError> {
        let from = from.to_uppercase();
        let to = to.to_uppercase();
        if from == to {
            return Ok(amount);
        }
        self.rate(&from, &to)
            .map(|rate| amount * rate)
            .ok_or(CurrencyError::RateNotFound { from, to })
    }
}
