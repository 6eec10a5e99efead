// src/adapters/appnexus/bids.rs

use std::collections::HashMap;

use serde::{Deserialize, Deserializer};

use crate::adapters::{AdapterError, BidType, BidVideo, TypedBid};
use crate::openrtb::response::Bid;

/// 上游偶尔把字段写成 `null`，按缺省值处理，不丢弃整个 bid
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BidExtVideo {
    #[serde(deserialize_with = "null_as_default")]
    duration: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BidExtCreative {
    #[serde(deserialize_with = "null_as_default")]
    video: BidExtVideo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BidExtAppnexus {
    #[serde(deserialize_with = "null_as_default")]
    pub bid_ad_type: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub brand_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub brand_category_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    creative_info: BidExtCreative,
    #[serde(deserialize_with = "null_as_default")]
    pub deal_priority: i64,
}

impl BidExtAppnexus {
    pub fn video_duration(&self) -> i64 {
        self.creative_info.video.duration
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BidExt {
    #[serde(deserialize_with = "null_as_default")]
    appnexus: BidExtAppnexus,
}

/// bid_ad_type: 0 banner, 1 video, 2 audio, 3 native
pub fn media_type_for_bid(ext: &BidExtAppnexus) -> Result<BidType, AdapterError> {
    match ext.bid_ad_type {
        0 => Ok(BidType::Banner),
        1 => Ok(BidType::Video),
        2 => Ok(BidType::Audio),
        3 => Ok(BidType::Native),
        other => Err(AdapterError::bad_server_response(format!(
            "Unrecognized bid_ad_type in response from appnexus: {}",
            other
        ))),
    }
}

/// 用 brand_category_id 查 IAB 分类
pub fn iab_category_for_bid<'a>(
    categories: &'a HashMap<String, String>,
    ext: &BidExtAppnexus,
) -> Option<&'a String> {
    categories.get(&ext.brand_category_id.to_string())
}

/// 把单个 AppNexus bid 规范化。
///
/// 查到分类时只保留这一个；查不到而上游又给了多个分类时清空，
/// 让下游按无分类处理，不去猜。
pub fn typed_bid(mut bid: Bid, categories: &HashMap<String, String>) -> Result<TypedBid, AdapterError> {
    let raw = bid
        .ext
        .as_ref()
        .ok_or_else(|| AdapterError::bad_server_response("Missing bid ext in response from appnexus"))?;
    let ext = BidExt::deserialize(raw).map_err(|e| {
        AdapterError::bad_server_response(format!("Failed to decode bid ext: {}", e))
    })?;
    let ext = ext.appnexus;

    let bid_type = media_type_for_bid(&ext)?;

    if let Some(category) = iab_category_for_bid(categories, &ext) {
        bid.cat = vec![category.clone()];
    } else if bid.cat.len() > 1 {
        bid.cat = Vec::new();
    }

    Ok(TypedBid {
        bid,
        bid_type,
        bid_video: Some(BidVideo {
            duration: ext.video_duration(),
        }),
        deal_priority: ext.deal_priority,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ErrorKind;
    use serde_json::{json, Value};

    fn bid(ext: Value, cat: &[&str]) -> Bid {
        Bid {
            id: "b".to_string(),
            impid: "i".to_string(),
            price: 1.0,
            cat: cat.iter().map(|c| c.to_string()).collect(),
            ext: Some(ext),
            ..Default::default()
        }
    }

    fn categories() -> HashMap<String, String> {
        let mut m = HashMap::new();
        m.insert("1".to_string(), "IAB20-3".to_string());
        m
    }

    #[test]
    fn resolves_media_type_codes() {
        for (code, expected) in [
            (0, BidType::Banner),
            (1, BidType::Video),
            (2, BidType::Audio),
            (3, BidType::Native),
        ] {
            let typed = typed_bid(bid(json!({"appnexus": {"bid_ad_type": code}}), &[]), &categories()).unwrap();
            assert_eq!(typed.bid_type, expected);
        }
        let err = typed_bid(bid(json!({"appnexus": {"bid_ad_type": 7}}), &[]), &categories()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadServerResponse);
        assert_eq!(err.message(), "Unrecognized bid_ad_type in response from appnexus: 7");
    }

    #[test]
    fn mapped_category_replaces_upstream_list() {
        let typed = typed_bid(
            bid(json!({"appnexus": {"bid_ad_type": 1, "brand_category_id": 1}}), &["IAB1", "IAB2"]),
            &categories(),
        )
        .unwrap();
        assert_eq!(typed.bid.cat, vec!["IAB20-3".to_string()]);
    }

    #[test]
    fn unmapped_multi_category_collapses_to_empty() {
        let typed = typed_bid(
            bid(json!({"appnexus": {"bid_ad_type": 1, "brand_category_id": 99}}), &["IAB1", "IAB2"]),
            &categories(),
        )
        .unwrap();
        assert!(typed.bid.cat.is_empty());
    }

    #[test]
    fn unmapped_single_category_is_left_alone() {
        let typed = typed_bid(
            bid(json!({"appnexus": {"bid_ad_type": 0, "brand_category_id": 99}}), &["IAB1"]),
            &categories(),
        )
        .unwrap();
        assert_eq!(typed.bid.cat, vec!["IAB1".to_string()]);
    }

    #[test]
    fn video_duration_and_deal_priority_do_not_touch_price() {
        let typed = typed_bid(
            bid(
                json!({"appnexus": {"bid_ad_type": 1, "deal_priority": 5,
                    "creative_info": {"video": {"duration": 30}}}}),
                &[],
            ),
            &categories(),
        )
        .unwrap();
        assert_eq!(typed.bid_video, Some(BidVideo { duration: 30 }));
        assert_eq!(typed.deal_priority, 5);
        assert_eq!(typed.bid.price, 1.0);
    }

    #[test]
    fn missing_ext_is_a_per_bid_error() {
        let mut b = bid(json!({}), &[]);
        b.ext = None;
        assert!(typed_bid(b, &categories()).is_err());
    }

    #[test]
    fn null_ext_fields_read_as_zero() {
        let typed = typed_bid(
            bid(
                json!({"appnexus": {"bid_ad_type": 0, "brand_id": null, "brand_category_id": null,
                    "deal_priority": null, "creative_info": {"video": {"duration": null}}}}),
                &["IAB1"],
            ),
            &categories(),
        )
        .unwrap();
        assert_eq!(typed.bid_type, BidType::Banner);
        assert_eq!(typed.deal_priority, 0);
        assert_eq!(typed.bid_video, Some(BidVideo { duration: 0 }));
        assert_eq!(typed.bid.cat, vec!["IAB1".to_string()]);

        let typed = typed_bid(
            bid(json!({"appnexus": {"bid_ad_type": 1, "creative_info": null}}), &[]),
            &categories(),
        )
        .unwrap();
        assert_eq!(typed.bid_type, BidType::Video);
    }
}
