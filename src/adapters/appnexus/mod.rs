// src/adapters/appnexus/mod.rs

//! AppNexus 适配器。
//!
//! 在通用流程之外，多了三件事：所有 imp 的 member 必须一致（写进 URI 的 `member_id`），
//! 每个请求最多 10 个 imp，以及视频入口下按 pod 分组并给每个 pod 分配 `adpod_id`。

pub mod bids;
pub mod params;
pub mod preprocess;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, warn};

use crate::adapters::adpod::{PodGrouper, PodIdGenerator, RandomPodIdGenerator};
use crate::adapters::response::{normalize_bids, parse_response};
use crate::adapters::split::BatchSplitter;
use crate::adapters::{
    append_query_param, AdapterError, Bidder, BidderResponse, EntryPoint, ExtraRequestInfo,
    RequestData, ResponseData,
};
use crate::openrtb::request::BidRequest;

use params::ExtImpAppnexus;
use preprocess::{default_display_manager_ver, preprocess};

pub const BIDDER_NAME: &str = "appnexus";
pub const DEFAULT_PLATFORM_ID: i64 = 5;
pub const MAX_IMPS_PER_REQUEST: usize = 10;

fn is_zero(v: &i64) -> bool {
    *v == 0
}

/// 请求级扩展 ext.appnexus
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ReqExtAppnexus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    include_brand_category: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    brand_category_uniqueness: Option<bool>,
    #[serde(default, skip_serializing_if = "is_zero")]
    is_amp: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    hb_source: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    adpod_id: String,
}

/// 完整的请求级扩展：ext.appnexus 之外的字段原样透传
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ReqExt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    appnexus: Option<ReqExtAppnexus>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl ReqExt {
    fn from_request(request: &BidRequest) -> Result<Self, AdapterError> {
        match &request.ext {
            None | Some(Value::Null) => Ok(ReqExt::default()),
            Some(raw) => ReqExt::deserialize(raw).map_err(|e| {
                AdapterError::bad_input(format!("Failed to decode request.ext: {}", e))
            }),
        }
    }

    fn include_brand_category(&self) -> bool {
        self.rest
            .get("prebid")
            .and_then(|p| p.pointer("/targeting/includebrandcategory"))
            .is_some_and(|v| !v.is_null())
    }

    fn to_value(&self) -> Result<Value, AdapterError> {
        serde_json::to_value(self).map_err(|e| {
            AdapterError::bad_input(format!("Failed to encode request.ext: {}", e))
        })
    }

    fn with_ad_pod_id(&self, pod_id: &str) -> Result<Value, AdapterError> {
        let mut ext = self.clone();
        ext.appnexus.get_or_insert_with(Default::default).adpod_id = pod_id.to_string();
        ext.to_value()
    }
}

/// 配置里的 platform id 是数字字符串时使用它，否则用默认值
pub fn resolve_platform_id(platform_id: Option<&str>) -> i64 {
    platform_id
        .filter(|p| !p.is_empty())
        .and_then(|p| p.parse::<i64>().ok())
        .unwrap_or(DEFAULT_PLATFORM_ID)
}

pub struct AppNexusAdapter {
    uri: String,
    iab_categories: Arc<HashMap<String, String>>,
    hb_source: i64,
    splitter: BatchSplitter,
    pod_ids: Arc<dyn PodIdGenerator>,
}

impl AppNexusAdapter {
    pub fn new(
        endpoint: &str,
        platform_id: Option<&str>,
        iab_categories: Arc<HashMap<String, String>>,
    ) -> Self {
        Self {
            uri: endpoint.to_string(),
            iab_categories,
            hb_source: resolve_platform_id(platform_id),
            splitter: BatchSplitter::new(MAX_IMPS_PER_REQUEST),
            pod_ids: Arc::new(RandomPodIdGenerator),
        }
    }

    pub fn with_pod_id_generator(mut self, pod_ids: Arc<dyn PodIdGenerator>) -> Self {
        self.pod_ids = pod_ids;
        self
    }

    pub fn with_max_imps_per_request(mut self, max_imps_per_request: usize) -> Self {
        self.splitter = BatchSplitter::new(max_imps_per_request);
        self
    }
}

impl Bidder for AppNexusAdapter {
    fn make_requests(
        &self,
        request: &BidRequest,
        info: &ExtraRequestInfo,
    ) -> (Vec<RequestData>, Vec<AdapterError>) {
        let mut errs = Vec::with_capacity(request.imp.len());
        let default_dmv = default_display_manager_ver(request.app.as_deref());

        // 解码参数，同时确认 pod 开关在整个请求内一致
        let mut decoded = Vec::with_capacity(request.imp.len());
        let mut generate_ad_pod_id: Option<bool> = None;
        for imp in &request.imp {
            let params = match ExtImpAppnexus::decode(imp) {
                Ok(params) => params,
                Err(e) => {
                    warn!(bidder = BIDDER_NAME, request_id = %request.id, imp_id = %imp.id, error = %e, "dropped imp");
                    errs.push(e);
                    continue;
                }
            };
            match generate_ad_pod_id {
                None => generate_ad_pod_id = Some(params.generate_ad_pod_id),
                Some(flag) if flag != params.generate_ad_pod_id => {
                    error!(bidder = BIDDER_NAME, request_id = %request.id, "inconsistent generate_ad_pod_id");
                    return (
                        Vec::new(),
                        vec![AdapterError::bad_input(
                            "generate ad pod option should be same for all pods in request",
                        )],
                    );
                }
                Some(_) => {}
            }
            decoded.push((imp, params));
        }

        let mut imps = Vec::with_capacity(decoded.len());
        let mut member_ids: Vec<String> = Vec::new();
        for (imp, params) in decoded {
            let enriched = params
                .validate()
                .and_then(|_| preprocess(imp, &params, default_dmv.as_deref()))
                .map_err(|e| e.for_imp(&imp.id));
            match enriched {
                Ok(enriched) => {
                    if !params.member.is_empty() && !member_ids.contains(&params.member) {
                        member_ids.push(params.member.clone());
                    }
                    imps.push(enriched);
                }
                Err(e) => {
                    warn!(bidder = BIDDER_NAME, request_id = %request.id, imp_id = %imp.id, error = %e, "dropped imp");
                    errs.push(e);
                }
            }
        }

        // member 要写进 URI，不一致时只能取第一个
        let mut uri = self.uri.clone();
        if let Some(member_id) = member_ids.first() {
            uri = append_query_param(&uri, "member_id", member_id);
            if member_ids.len() > 1 {
                warn!(bidder = BIDDER_NAME, request_id = %request.id, members = ?member_ids, "member ids disagree");
                errs.push(AdapterError::bad_input(format!(
                    "All request.imp[i].ext.appnexus.member params must match. Request contained: {:?}",
                    member_ids
                )));
            }
        }

        if imps.is_empty() {
            return (Vec::new(), errs);
        }

        let is_amp = i64::from(info.entry_point == EntryPoint::Amp);
        let is_video = i64::from(info.entry_point == EntryPoint::Video);

        let mut req_ext = match ReqExt::from_request(request) {
            Ok(ext) => ext,
            Err(e) => {
                errs.push(e);
                return (Vec::new(), errs);
            }
        };
        let include_brand_category = req_ext.include_brand_category();
        let appnexus = req_ext.appnexus.get_or_insert_with(Default::default);
        if include_brand_category {
            appnexus.include_brand_category = Some(true);
            appnexus.brand_category_uniqueness = Some(true);
        }
        appnexus.is_amp = is_amp;
        appnexus.hb_source = self.hb_source + is_video;

        if is_video == 1 && generate_ad_pod_id == Some(true) {
            let grouper = PodGrouper::new(self.pod_ids.as_ref(), self.splitter);
            let (requests, pod_errs) =
                grouper.split(imps, request, &uri, |pod_id| req_ext.with_ad_pod_id(pod_id));
            errs.extend(pod_errs);
            return (requests, errs);
        }

        let split = req_ext
            .to_value()
            .and_then(|ext| self.splitter.split(&imps, request, Some(&ext), &uri));
        match split {
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

        let (out, errs) = normalize_bids(bid_response, |bid| {
            bids::typed_bid(bid, &self.iab_categories)
        });
        (Some(out), errs)
    }
}
