// src/adapters/split.rs

use serde_json::Value;
use tracing::debug;

use crate::adapters::{imp_ids, json_headers, AdapterError, RequestData, METHOD_POST};
use crate::openrtb::request::{BidRequest, Imp};

/// 按每个请求最多携带的 imp 数量，把 imp 列表切成连续的批次。
///
/// 35 个 imp、上限 10 时得到 10、10、10、5 四个请求；
/// 没有 imp 时不产出请求，也不报错，是否算错误由调用方决定。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSplitter {
    max_imps_per_request: usize,
}

impl BatchSplitter {
    pub fn new(max_imps_per_request: usize) -> Self {
        Self {
            max_imps_per_request: max_imps_per_request.max(1),
        }
    }

    /// 不限制数量，所有 imp 放进同一个请求
    pub fn unbounded() -> Self {
        Self {
            max_imps_per_request: usize::MAX,
        }
    }

    pub fn max_imps_per_request(&self) -> usize {
        self.max_imps_per_request
    }

    pub fn batch_count(&self, imp_count: usize) -> usize {
        imp_count.div_ceil(self.max_imps_per_request)
    }

    /// 为每个批次生成一个 wire request。
    ///
    /// `template` 提供共享的请求上下文（其 imp 会被忽略），
    /// `request_ext` 是已经换成 bidder 格式的请求级扩展，所有批次共用。
    pub fn split(
        &self,
        imps: &[Imp],
        template: &BidRequest,
        request_ext: Option<&Value>,
        uri: &str,
    ) -> Result<Vec<RequestData>, AdapterError> {
        let mut shared = template.without_imps();
        shared.ext = request_ext.cloned();

        let headers = json_headers();
        let mut requests = Vec::with_capacity(self.batch_count(imps.len()));

        for chunk in imps.chunks(self.max_imps_per_request) {
            let mut batch = shared.clone();
            batch.imp = chunk.to_vec();

            let body = serde_json::to_vec(&batch).map_err(|e| {
                AdapterError::bad_input(format!("Failed to encode bidder request: {}", e))
            })?;

            debug!(
                request_id = %batch.id,
                uri = %uri,
                imp_count = chunk.len(),
                "built wire request"
            );

            requests.push(RequestData {
                method: METHOD_POST.to_string(),
                uri: uri.to_string(),
                headers: headers.clone(),
                body,
                imp_ids: imp_ids(chunk),
            });
        }

        Ok(requests)
    }
}
