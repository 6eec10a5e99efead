// src/adapters/appnexus/preprocess.rs

use serde::Serialize;
use serde_json::Value;

use crate::adapters::appnexus::params::ExtImpAppnexus;
use crate::adapters::AdapterError;
use crate::openrtb::request::{AdPosition, App, Imp};

fn is_zero(v: &i64) -> bool {
    *v == 0
}

/// AppNexus 能识别的 imp.ext 格式
#[derive(Debug, Serialize)]
struct ImpExtAppnexusWire {
    #[serde(skip_serializing_if = "is_zero")]
    placement_id: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    keywords: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    traffic_source_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    use_pmt_rule: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    private_sizes: Option<Value>,
}

#[derive(Debug, Serialize)]
struct ImpExtWire {
    appnexus: ImpExtAppnexusWire,
}

/// 一些 SDK 不填 imp.displaymanagerver，而是放在 app.ext.prebid 里，
/// source 和 version 都有时拼成 `source-version`
pub fn default_display_manager_ver(app: Option<&App>) -> Option<String> {
    let prebid = app?.ext.as_ref()?.get("prebid")?;
    let source = prebid.get("source")?.as_str()?;
    let version = prebid.get("version")?.as_str()?;
    Some(format!("{}-{}", source, version))
}

/// 生成一个满足 AppNexus 要求的 imp 副本，调用方的 imp 不会被修改。
///
/// reserve 直接作为底价，不做币种换算。
pub fn preprocess(
    imp: &Imp,
    params: &ExtImpAppnexus,
    default_display_manager_ver: Option<&str>,
) -> Result<Imp, AdapterError> {
    let mut imp = imp.clone();

    if !params.inv_code.is_empty() {
        imp.tagid = Some(params.inv_code.clone());
    }
    if imp.bidfloor <= 0.0 && params.reserve > 0.0 {
        imp.bidfloor = params.reserve;
    }

    if let Some(banner) = imp.banner.as_mut() {
        match params.position.as_str() {
            "above" => banner.pos = Some(AdPosition::AboveTheFold.into()),
            "below" => banner.pos = Some(AdPosition::BelowTheFold.into()),
            _ => {}
        }

        if banner.w.is_none() && banner.h.is_none() {
            if let Some((w, h)) = banner.format.first().map(|f| (f.w, f.h)) {
                banner.w = Some(w);
                banner.h = Some(h);
            }
        }
    }

    let has_dmv = imp
        .displaymanagerver
        .as_deref()
        .is_some_and(|v| !v.is_empty());
    if !has_dmv {
        if let Some(dmv) = default_display_manager_ver.filter(|v| !v.is_empty()) {
            imp.displaymanagerver = Some(dmv.to_string());
        }
    }

    let ext = ImpExtWire {
        appnexus: ImpExtAppnexusWire {
            placement_id: params.placement_id,
            keywords: params.keywords_string(),
            traffic_source_code: params.traffic_source_code.clone(),
            use_pmt_rule: params.use_pmt_rule,
            private_sizes: params.private_sizes.clone(),
        },
    };
    imp.ext = Some(serde_json::to_value(&ext).map_err(|e| {
        AdapterError::bad_input(format!("Failed to encode imp.ext.appnexus: {}", e))
    })?);

    Ok(imp)
}
