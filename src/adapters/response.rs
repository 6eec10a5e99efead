// src/adapters/response.rs

use tracing::warn;

use crate::adapters::{AdapterError, BidderResponse, ResponseData, TypedBid};
use crate::openrtb::response::{Bid, BidResponse};

pub const STATUS_OK: u16 = 200;
pub const STATUS_NO_CONTENT: u16 = 204;
pub const STATUS_BAD_REQUEST: u16 = 400;

fn unexpected_status(status: u16) -> String {
    format!(
        "Unexpected status code: {}. Run with request.debug = 1 for more info",
        status
    )
}

/// 状态码策略 + 响应体解码。
///
/// - 204：合法的无竞价，返回 `Ok(None)`
/// - 400：请求本身有问题，`BadInput`
/// - 其它非 200：`BadServerResponse`
/// - 200：解码响应体，失败则整个响应作废
pub fn parse_response(response: &ResponseData) -> Result<Option<BidResponse>, AdapterError> {
    match response.status_code {
        STATUS_OK => decode_bid_response(&response.body).map(Some),
        STATUS_NO_CONTENT => Ok(None),
        STATUS_BAD_REQUEST => Err(AdapterError::bad_input(unexpected_status(
            response.status_code,
        ))),
        status => Err(AdapterError::bad_server_response(unexpected_status(status))),
    }
}

/// simd-json 需要可写的缓冲区，这里复制一份，不改动调用方的数据
pub fn decode_bid_response(body: &[u8]) -> Result<BidResponse, AdapterError> {
    let mut buf = body.to_vec();
    simd_json::serde::from_slice::<BidResponse>(&mut buf).map_err(|e| {
        AdapterError::bad_server_response(format!("Failed to decode bid response: {}", e))
    })
}

/// 逐个 bid 规范化。单个 bid 失败只记录错误并跳过，其它 bid 照常处理；
/// 响应里带了币种时覆盖默认币种。
pub fn normalize_bids<F>(bid_response: BidResponse, mut resolve: F) -> (BidderResponse, Vec<AdapterError>)
where
    F: FnMut(Bid) -> Result<TypedBid, AdapterError>,
{
    let capacity = bid_response.seatbid.iter().map(|sb| sb.bid.len()).sum();
    let mut out = BidderResponse::with_bids_capacity(capacity);
    let mut errs = Vec::new();

    for seat_bid in bid_response.seatbid {
        for bid in seat_bid.bid {
            let imp_id = bid.impid.clone();
            let bid_id = bid.id.clone();
            match resolve(bid) {
                Ok(typed) => out.bids.push(typed),
                Err(e) => {
                    warn!(imp_id = %imp_id, bid_id = %bid_id, error = %e, "dropped bid");
                    errs.push(e.for_bid(&imp_id, &bid_id));
                }
            }
        }
    }

    if let Some(cur) = bid_response.cur.filter(|c| !c.is_empty()) {
        out.currency = cur;
    }

    (out, errs)
}
