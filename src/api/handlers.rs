// src/api/handlers.rs

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use rtb_mediation::adapters::{
    AdapterError, BidderResponse, EntryPoint, ErrorKind, ErrorScope, ExtraRequestInfo,
    RequestData, ResponseData,
};
use rtb_mediation::logging::translation_log::TranslationLog;
use rtb_mediation::openrtb::request::BidRequest;

use crate::AppState;

#[derive(Deserialize, Debug, Default)]
pub struct RequestsQuery {
    #[serde(default)]
    pub entry_point: Option<EntryPoint>,
}

/// wire request 的 JSON 视图，body 能解析成 JSON 时直接内嵌
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WireRequestView {
    pub method: String,
    pub uri: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    pub body: Value,
    #[serde(default)]
    pub imp_ids: Vec<String>,
}

#[derive(Serialize, Debug)]
pub struct ErrorView {
    pub kind: ErrorKind,
    pub scope: ErrorScope,
    pub message: String,
}

#[derive(Serialize, Debug)]
pub struct RequestsResponse {
    pub requests: Vec<WireRequestView>,
    pub errors: Vec<ErrorView>,
}

#[derive(Deserialize, Debug)]
pub struct WireResponseView {
    pub status_code: u16,
    /// JSON 对象原样编码；字符串按原始字节处理，方便构造坏响应
    #[serde(default)]
    pub body: Value,
}

#[derive(Deserialize, Debug)]
pub struct BidsRequest {
    pub request: BidRequest,
    pub wire_request: WireRequestView,
    pub response: WireResponseView,
}

#[derive(Serialize, Debug)]
pub struct BidsResponse {
    pub response: Option<BidderResponse>,
    pub errors: Vec<ErrorView>,
}

fn body_to_value(body: &[u8]) -> Value {
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

fn value_to_body(value: &Value) -> Vec<u8> {
    match value {
        Value::Null => Vec::new(),
        Value::String(raw) => raw.as_bytes().to_vec(),
        other => serde_json::to_vec(other).unwrap_or_default(),
    }
}

impl From<&RequestData> for WireRequestView {
    fn from(request: &RequestData) -> Self {
        Self {
            method: request.method.clone(),
            uri: request.uri.clone(),
            headers: request.headers.clone(),
            body: body_to_value(&request.body),
            imp_ids: request.imp_ids.clone(),
        }
    }
}

impl From<&WireRequestView> for RequestData {
    fn from(view: &WireRequestView) -> Self {
        Self {
            method: view.method.clone(),
            uri: view.uri.clone(),
            headers: view.headers.clone(),
            body: value_to_body(&view.body),
            imp_ids: view.imp_ids.clone(),
        }
    }
}

impl From<&AdapterError> for ErrorView {
    fn from(err: &AdapterError) -> Self {
        Self {
            kind: err.kind(),
            scope: err.scope().clone(),
            message: err.message().to_string(),
        }
    }
}

/// **把规范化请求翻译成 bidder 的 wire request（不发送）**
pub async fn handle_make_requests(
    State(state): State<Arc<AppState>>,
    Path(bidder_name): Path<String>,
    Query(query): Query<RequestsQuery>,
    Json(bid_request): Json<BidRequest>,
) -> Result<Json<RequestsResponse>, StatusCode> {
    let Some(bidder) = state.bidders.get(&bidder_name) else {
        warn!(bidder = %bidder_name, "unknown bidder");
        return Err(StatusCode::NOT_FOUND);
    };

    let extra = ExtraRequestInfo::new(query.entry_point.unwrap_or_default())
        .with_currency_converter(state.currency.clone());

    let (requests, errors) = bidder.make_requests(&bid_request, &extra);

    let log = TranslationLog::for_requests(
        &bidder_name,
        &bid_request.id,
        bid_request.imp.len(),
        &requests,
        &errors,
    );
    info!(translation_log = %log.to_json(), "requests built");

    Ok(Json(RequestsResponse {
        requests: requests.iter().map(WireRequestView::from).collect(),
        errors: errors.iter().map(ErrorView::from).collect(),
    }))
}

/// **把 bidder 的 wire response 规范化成 bid 列表**
pub async fn handle_make_bids(
    State(state): State<Arc<AppState>>,
    Path(bidder_name): Path<String>,
    Json(payload): Json<BidsRequest>,
) -> Result<Json<BidsResponse>, StatusCode> {
    let Some(bidder) = state.bidders.get(&bidder_name) else {
        warn!(bidder = %bidder_name, "unknown bidder");
        return Err(StatusCode::NOT_FOUND);
    };

    let wire_request = RequestData::from(&payload.wire_request);
    let wire_response = ResponseData {
        status_code: payload.response.status_code,
        body: value_to_body(&payload.response.body),
    };

    let (response, errors) = bidder.make_bids(&payload.request, &wire_request, &wire_response);

    let log = TranslationLog::for_bids(
        &bidder_name,
        &payload.request.id,
        payload.request.imp.len(),
        response.as_ref(),
        &errors,
    );
    info!(translation_log = %log.to_json(), "bids parsed");

    Ok(Json(BidsResponse {
        response,
        errors: errors.iter().map(ErrorView::from).collect(),
    }))
}
