// src/adapters/rtbhouse.rs

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::value::RawValue;
use serde_json::Value;
use tracing::warn;

use crate::adapters::response::{normalize_bids, parse_response};
use crate::adapters::split::BatchSplitter;
use crate::adapters::{
    decode_bidder_params, AdapterError, BidType, Bidder, BidderResponse, ExtraRequestInfo,
    RequestData, ResponseData, TypedBid,
};
use crate::openrtb::request::{BidRequest, Imp};
use crate::openrtb::response::Bid;

pub const BIDDER_NAME: &str = "rtbhouse";
/// RTB House 只接受也只返回 USD
pub const BIDDER_CURRENCY: &str = "USD";

const AUCTION_PRICE_MACRO: &str = "${AUCTION_PRICE}";
/// PAAPI 相关信号，RTB House 不再接收
const AUCTION_ENVIRONMENT_KEYS: [&str; 3] = ["ae", "igs", "paapi"];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtImpRtbHouse {
    #[serde(rename = "publisherId")]
    pub publisher_id: String,
    pub region: String,
    pub bidfloor: f64,
    pub channel: String,
}

pub struct RtbHouseAdapter {
    endpoint: String,
    splitter: BatchSplitter,
}

impl RtbHouseAdapter {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            splitter: BatchSplitter::unbounded(),
        }
    }

    /// 底价统一换算成 USD；imp 自己没有底价时才用参数里的 bidfloor
    fn prepare_imp(
        &self,
        imp: &Imp,
        request: &BidRequest,
        info: &ExtraRequestInfo,
    ) -> Result<Imp, AdapterError> {
        let mut bid_floor = imp.bidfloor;
        let mut bid_floor_cur = imp.bidfloorcur.clone().unwrap_or_default();
        if bid_floor_cur.is_empty() && bid_floor == 0.0 {
            let params: ExtImpRtbHouse = decode_bidder_params(imp)?;
            if params.bidfloor > 0.0 {
                bid_floor = params.bidfloor;
                bid_floor_cur = request
                    .cur
                    .first()
                    .cloned()
                    .unwrap_or_else(|| BIDDER_CURRENCY.to_string());
            }
        }

        if bid_floor > 0.0 && !bid_floor_cur.is_empty() {
            if bid_floor_cur.to_uppercase() != BIDDER_CURRENCY {
                bid_floor = info.convert_currency(bid_floor, &bid_floor_cur, BIDDER_CURRENCY)?;
            }
            bid_floor_cur = BIDDER_CURRENCY.to_string();
        }

        let mut imp = imp.clone();
        if bid_floor > 0.0 && bid_floor_cur == BIDDER_CURRENCY {
            imp.bidfloor = bid_floor;
            imp.bidfloorcur = Some(bid_floor_cur);
        }
        imp.ext = Some(clear_auction_environment(imp.ext.take())?);
        Ok(imp)
    }
}

fn clear_auction_environment(ext: Option<Value>) -> Result<Value, AdapterError> {
    match ext {
        Some(Value::Object(mut map)) => {
            for key in AUCTION_ENVIRONMENT_KEYS {
                map.remove(key);
            }
            Ok(Value::Object(map))
        }
        _ => Err(AdapterError::bad_input("imp.ext must be a JSON object")),
    }
}

fn resolve_macros(bid: &mut Bid) {
    let price = bid.price.to_string();
    if let Some(nurl) = bid.nurl.as_mut() {
        *nurl = nurl.replace(AUCTION_PRICE_MACRO, &price);
    }
    if let Some(adm) = bid.adm.as_mut() {
        *adm = adm.replace(AUCTION_PRICE_MACRO, &price);
    }
}

/// `{"native": {...}}` 形式的 adm 去掉外层包装，内层对象按原始文本返回
fn native_adm(adm: &str) -> Result<String, AdapterError> {
    let envelope: HashMap<String, &RawValue> = serde_json::from_str(adm)
        .map_err(|_| AdapterError::bad_server_response("unable to unmarshal native adm"))?;
    match envelope.get("native") {
        None => Ok(adm.to_string()),
        Some(inner) if inner.get().starts_with('{') => Ok(inner.get().to_string()),
        Some(_) => Err(AdapterError::bad_server_response("unable to get native adm")),
    }
}

fn typed_bid(mut bid: Bid) -> Result<TypedBid, AdapterError> {
    let bid_type = match bid.mtype {
        Some(1) => BidType::Banner,
        Some(4) => BidType::Native,
        _ => {
            return Err(AdapterError::bad_server_response(format!(
                "unrecognized bid type in response from rtbhouse for bid {}",
                bid.impid
            )))
        }
    };

    resolve_macros(&mut bid);
    if bid_type == BidType::Native {
        if let Some(adm) = bid.adm.as_deref() {
            bid.adm = Some(native_adm(adm)?);
        }
    }

    Ok(TypedBid {
        bid,
        bid_type,
        bid_video: None,
        deal_priority: 0,
    })
}

impl Bidder for RtbHouseAdapter {
    fn make_requests(
        &self,
        request: &BidRequest,
        info: &ExtraRequestInfo,
    ) -> (Vec<RequestData>, Vec<AdapterError>) {
        let mut errs = Vec::new();
        let mut imps = Vec::with_capacity(request.imp.len());

        for imp in &request.imp {
            match self.prepare_imp(imp, request, info) {
                Ok(imp) => imps.push(imp),
                Err(e) => {
                    warn!(bidder = BIDDER_NAME, request_id = %request.id, imp_id = %imp.id, error = %e, "dropped imp");
                    errs.push(e.for_imp(&imp.id));
                }
            }
        }

        if imps.is_empty() {
            return (Vec::new(), errs);
        }

        let mut template = request.without_imps();
        template.cur = vec![BIDDER_CURRENCY.to_string()];

        match self
            .splitter
            .split(&imps, &template, request.ext.as_ref(), &self.endpoint)
        {
            Ok(requests) => (requests, errs),
            Err(e) => {
                errs.push(e);
                (Vec::new(), errs)
            }
        }
    }

    fn make_bids(
        &self,
        _internal_request: &BidRequest,
        _external_request: &RequestData,
        response: &ResponseData,
    ) -> (Option<BidderResponse>, Vec<AdapterError>) {
        let bid_response = match parse_response(response) {
            Ok(Some(bid_response)) => bid_response,
            Ok(None) => return (Some(BidderResponse::with_bids_capacity(0)), Vec::new()),
            Err(e) => return (None, vec![e]),
        };

        let (mut out, errs) = normalize_bids(bid_response, typed_bid);
        out.currency = BIDDER_CURRENCY.to_string();
        (Some(out), errs)
    }
}
