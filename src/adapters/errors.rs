// src/adapters/errors.rs

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// 错误归属的最小单位：整个请求、某个 imp，或者某个 bid
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorScope {
    Request,
    Imp { imp_id: String },
    Bid { imp_id: String, bid_id: String },
}

impl fmt::Display for ErrorScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorScope::Request => write!(f, "request"),
            ErrorScope::Imp { imp_id } => write!(f, "imp {}", imp_id),
            ErrorScope::Bid { imp_id, bid_id } => write!(f, "bid {} (imp {})", bid_id, imp_id),
        }
    }
}

/// 适配层错误。
///
/// `BadInput` 表示问题出在调用方的请求（bidder 参数、币种、pod 标记等），
/// `BadServerResponse` 表示问题出在上游 bidder 的响应。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdapterError {
    #[error("{message}")]
    BadInput { message: String, scope: ErrorScope },

    #[error("{message}")]
    BadServerResponse { message: String, scope: ErrorScope },
}

/// 错误大类，供上层决定如何对外展示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BadInput,
    BadServerResponse,
}

impl AdapterError {
    pub fn bad_input(message: impl Into<String>) -> Self {
        AdapterError::BadInput {
            message: message.into(),
            scope: ErrorScope::Request,
        }
    }

    pub fn bad_server_response(message: impl Into<String>) -> Self {
        AdapterError::BadServerResponse {
            message: message.into(),
            scope: ErrorScope::Request,
        }
    }

    /// 将错误归属到某个 imp
    pub fn for_imp(self, imp_id: &str) -> Self {
        self.with_scope(ErrorScope::Imp {
            imp_id: imp_id.to_string(),
        })
    }

    /// 将错误归属到某个 bid
    pub fn for_bid(self, imp_id: &str, bid_id: &str) -> Self {
        self.with_scope(ErrorScope::Bid {
            imp_id: imp_id.to_string(),
            bid_id: bid_id.to_string(),
        })
    }

    fn with_scope(self, scope: ErrorScope) -> Self {
        match self {
            AdapterError::BadInput { message, .. } => AdapterError::BadInput { message, scope },
            AdapterError::BadServerResponse { message, .. } => {
                AdapterError::BadServerResponse { message, scope }
            }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AdapterError::BadInput { .. } => ErrorKind::BadInput,
            AdapterError::BadServerResponse { .. } => ErrorKind::BadServerResponse,
        }
    }

    pub fn scope(&self) -> &ErrorScope {
        match self {
            AdapterError::BadInput { scope, .. } | AdapterError::BadServerResponse { scope, .. } => scope,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AdapterError::BadInput { message, .. }
            | AdapterError::BadServerResponse { message, .. } => message,
        }
    }
}
