// src/adapters/mod.rs

//! 各 bidder 的协议翻译层。
//!
//! 每个 bidder 实现 [`Bidder`]：把一个规范化的 [`BidRequest`] 翻译成一到多个
//! bidder 专属的 wire request，再把每个 wire response 规范化成 [`TypedBid`] 列表。
//! 本层不做任何 I/O，发请求、超时、跨 bidder 合并都由上层负责。

pub mod adpod;
pub mod appnexus;
pub mod errors;
pub mod info;
pub mod response;
pub mod rtbhouse;
pub mod split;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::currency::CurrencyConverter;
use crate::openrtb::request::{BidRequest, Imp};
use crate::openrtb::response::Bid;

pub use errors::{AdapterError, ErrorKind, ErrorScope};

/// 发往 bidder 的请求统一使用 POST
pub const METHOD_POST: &str = "POST";

/// 调用入口类型，部分 bidder 会据此打开协议开关（AMP、长视频）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryPoint {
    #[default]
    Openrtb2Web,
    Openrtb2App,
    Amp,
    Video,
}

/// 上层提供、本层只读的请求上下文
#[derive(Clone, Default)]
pub struct ExtraRequestInfo {
    pub entry_point: EntryPoint,
    currency: Option<Arc<dyn CurrencyConverter>>,
}

impl ExtraRequestInfo {
    pub fn new(entry_point: EntryPoint) -> Self {
        Self {
            entry_point,
            currency: None,
        }
    }

    pub fn with_currency_converter(mut self, converter: Arc<dyn CurrencyConverter>) -> Self {
        self.currency = Some(converter);
        self
    }

    /// 币种换算；没有注入换算能力或者换算失败都算调用方的问题
    pub fn convert_currency(&self, amount: f64, from: &str, to: &str) -> Result<f64, AdapterError> {
        let converter = self.currency.as_ref().ok_or_else(|| {
            AdapterError::bad_input(format!(
                "Currency conversion from {} to {} is not available",
                from, to
            ))
        })?;
        converter
            .convert(amount, from, to)
            .map_err(|e| AdapterError::bad_input(e.to_string()))
    }
}

/// 一个发往 bidder 的 HTTP 请求单元
#[derive(Debug, Clone, PartialEq)]
pub struct RequestData {
    pub method: String,
    pub uri: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// 本请求携带的 imp id，按原始顺序
    pub imp_ids: Vec<String>,
}

/// bidder 返回的原始响应
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseData {
    pub status_code: u16,
    pub body: Vec<u8>,
}

/// 规范化后的素材类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BidType {
    Banner,
    Video,
    Audio,
    Native,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BidVideo {
    pub duration: i64,
}

/// 规范化后的单个 bid
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypedBid {
    pub bid: Bid,
    pub bid_type: BidType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bid_video: Option<BidVideo>,
    pub deal_priority: i64,
}

/// 一次 wire response 规范化后的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BidderResponse {
    pub currency: String,
    pub bids: Vec<TypedBid>,
}

impl BidderResponse {
    pub fn with_bids_capacity(capacity: usize) -> Self {
        Self {
            currency: "USD".to_string(),
            bids: Vec::with_capacity(capacity),
        }
    }
}

/// 每个 bidder 的翻译契约
pub trait Bidder: Send + Sync {
    /// 把规范化请求翻译成 wire request 列表。
    /// 请求和错误可以同时存在：部分 imp 失败只会带回错误，不影响其它 imp。
    fn make_requests(
        &self,
        request: &BidRequest,
        info: &ExtraRequestInfo,
    ) -> (Vec<RequestData>, Vec<AdapterError>);

    /// 把单个 wire response 规范化成 bid 列表。
    /// `None` 表示整个响应不可用（具体原因在错误列表里）。
    fn make_bids(
        &self,
        internal_request: &BidRequest,
        external_request: &RequestData,
        response: &ResponseData,
    ) -> (Option<BidderResponse>, Vec<AdapterError>);
}

/// imp.ext 的通用信封：`{"prebid": {...}, "bidder": {...}}`
#[derive(Debug, Clone, Deserialize)]
pub struct ExtImpBidder {
    #[serde(default)]
    pub prebid: Option<Value>,
    pub bidder: Value,
}

impl ExtImpBidder {
    pub fn from_imp(imp: &Imp) -> Result<Self, AdapterError> {
        let ext = imp.ext.as_ref().ok_or_else(|| {
            AdapterError::bad_input("Bidder extension not provided").for_imp(&imp.id)
        })?;
        ExtImpBidder::deserialize(ext).map_err(|e| {
            AdapterError::bad_input(format!("Failed to decode imp.ext: {}", e)).for_imp(&imp.id)
        })
    }
}

/// 从 imp.ext.bidder 解出 bidder 专属参数
pub fn decode_bidder_params<T: DeserializeOwned>(imp: &Imp) -> Result<T, AdapterError> {
    let envelope = ExtImpBidder::from_imp(imp)?;
    serde_json::from_value(envelope.bidder).map_err(|e| {
        AdapterError::bad_input(format!("Failed to decode imp.ext.bidder: {}", e)).for_imp(&imp.id)
    })
}

/// JSON 请求头
pub fn json_headers() -> Vec<(String, String)> {
    vec![
        (
            "Content-Type".to_string(),
            "application/json;charset=utf-8".to_string(),
        ),
        ("Accept".to_string(), "application/json".to_string()),
    ]
}

/// 给 URI 追加查询参数，已有查询串时用 `&` 连接
pub fn append_query_param(uri: &str, key: &str, value: &str) -> String {
    if uri.contains('?') {
        format!("{}&{}={}", uri, key, value)
    } else {
        format!("{}?{}={}", uri, key, value)
    }
}

pub fn imp_ids(imps: &[Imp]) -> Vec<String> {
    imps.iter().map(|imp| imp.id.clone()).collect()
}
