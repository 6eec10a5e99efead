// src/adapters/appnexus/params.rs

use serde::Deserialize;
use serde_json::Value;

use crate::adapters::{decode_bidder_params, AdapterError};
use crate::openrtb::request::Imp;

/// 关键词：没有取值的 key 作为独立标记
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct KeyVal {
    #[serde(default)]
    pub key: String,
    #[serde(default, rename = "value")]
    pub values: Vec<String>,
}

/// imp.ext.bidder 中 AppNexus 的参数。
///
/// 驼峰命名的字段是旧版别名，只有在新字段未设置时才会被提升过去。
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExtImpAppnexus {
    #[serde(rename = "placementId")]
    pub legacy_placement_id: i64,
    #[serde(rename = "invCode")]
    pub legacy_inv_code: String,
    #[serde(rename = "trafficSourceCode")]
    pub legacy_traffic_source_code: String,

    pub placement_id: i64,
    pub inv_code: String,
    pub member: String,
    pub keywords: Vec<KeyVal>,
    pub traffic_source_code: String,
    /// 保留价，默认视为 USD
    pub reserve: f64,
    /// "above" / "below"
    pub position: String,
    pub use_pmt_rule: Option<bool>,
    pub private_sizes: Option<Value>,
    /// 长视频 pod 开关，同一请求内所有 imp 必须一致
    pub generate_ad_pod_id: bool,
}

impl ExtImpAppnexus {
    /// 解码并提升旧字段，不做业务校验
    pub fn decode(imp: &Imp) -> Result<Self, AdapterError> {
        let mut params: ExtImpAppnexus = decode_bidder_params(imp)?;
        params.promote_legacy_fields();
        Ok(params)
    }

    pub fn promote_legacy_fields(&mut self) {
        if self.placement_id == 0 && self.legacy_placement_id != 0 {
            self.placement_id = self.legacy_placement_id;
        }
        if self.inv_code.is_empty() && !self.legacy_inv_code.is_empty() {
            self.inv_code = self.legacy_inv_code.clone();
        }
        if self.traffic_source_code.is_empty() && !self.legacy_traffic_source_code.is_empty() {
            self.traffic_source_code = self.legacy_traffic_source_code.clone();
        }
    }

    /// 必须有 placement，或者 member + inv_code 成对出现
    pub fn validate(&self) -> Result<(), AdapterError> {
        if self.placement_id == 0 && (self.inv_code.is_empty() || self.member.is_empty()) {
            return Err(AdapterError::bad_input(
                "No placement or member+invcode provided",
            ));
        }
        Ok(())
    }

    /// `[{key:"a",value:["1","2"]},{key:"b"}]` => `"a=1,a=2,b"`
    pub fn keywords_string(&self) -> String {
        let mut kvs = Vec::with_capacity(self.keywords.len() * 2);
        for kv in &self.keywords {
            if kv.values.is_empty() {
                kvs.push(kv.key.clone());
            } else {
                for val in &kv.values {
                    kvs.push(format!("{}={}", kv.key, val));
                }
            }
        }
        kvs.join(",")
    }
}
