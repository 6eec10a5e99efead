// src/logging/translation_log.rs

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::adapters::{AdapterError, BidderResponse, RequestData};

/// **一次翻译调用的摘要日志**
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TranslationLog {
    pub timestamp: String,
    /// "build_requests" 或 "parse_response"
    pub log_type: String,
    pub bidder: String,
    pub request_id: String,
    pub imp_count: usize,
    pub wire_requests: Vec<WireRequestLog>,
    pub bid_count: usize,
    pub currency: Option<String>,
    pub errors: Vec<String>,
}

/// **单个 wire request 的摘要**
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WireRequestLog {
    pub uri: String,
    pub imp_ids: Vec<String>,
    pub body_bytes: usize,
}

impl TranslationLog {
    fn new(log_type: &str, bidder: &str, request_id: &str, imp_count: usize) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            log_type: log_type.to_string(),
            bidder: bidder.to_string(),
            request_id: request_id.to_string(),
            imp_count,
            wire_requests: Vec::new(),
            bid_count: 0,
            currency: None,
            errors: Vec::new(),
        }
    }

    /// **请求翻译日志**
    pub fn for_requests(
        bidder: &str,
        request_id: &str,
        imp_count: usize,
        requests: &[RequestData],
        errors: &[AdapterError],
    ) -> Self {
        let mut log = Self::new("build_requests", bidder, request_id, imp_count);
        log.wire_requests = requests
            .iter()
            .map(|r| WireRequestLog {
                uri: r.uri.clone(),
                imp_ids: r.imp_ids.clone(),
                body_bytes: r.body.len(),
            })
            .collect();
        log.add_errors(errors);
        log
    }

    /// **响应规范化日志**
    pub fn for_bids(
        bidder: &str,
        request_id: &str,
        imp_count: usize,
        response: Option<&BidderResponse>,
        errors: &[AdapterError],
    ) -> Self {
        let mut log = Self::new("parse_response", bidder, request_id, imp_count);
        if let Some(response) = response {
            log.bid_count = response.bids.len();
            log.currency = Some(response.currency.clone());
        }
        log.add_errors(errors);
        log
    }

    fn add_errors(&mut self, errors: &[AdapterError]) {
        self.errors
            .extend(errors.iter().map(|e| format!("{}: {}", e.scope(), e)));
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
