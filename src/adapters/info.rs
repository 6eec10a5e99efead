// src/adapters/info.rs

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::adapters::{
    AdapterError, BidType, Bidder, BidderResponse, ExtraRequestInfo, RequestData, ResponseData,
};
use crate::openrtb::request::{BidRequest, Imp};

/// 某个平台（site / app）上允许的媒体类型
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PlatformInfo {
    #[serde(default)]
    pub media_types: Vec<BidType>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Capabilities {
    #[serde(default)]
    pub app: Option<PlatformInfo>,
    #[serde(default)]
    pub site: Option<PlatformInfo>,
}

/// bidder 能力声明，未声明的平台视为不支持
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct BidderInfo {
    #[serde(default)]
    pub capabilities: Capabilities,
}

#[derive(Debug, Clone, Copy, Default)]
struct Supports {
    enabled: bool,
    banner: bool,
    video: bool,
    audio: bool,
    native: bool,
}

impl Supports {
    fn from_platform(platform: Option<&PlatformInfo>) -> Self {
        let Some(platform) = platform else {
            return Supports::default();
        };
        let has = |t: BidType| platform.media_types.contains(&t);
        Supports {
            enabled: true,
            banner: has(BidType::Banner),
            video: has(BidType::Video),
            audio: has(BidType::Audio),
            native: has(BidType::Native),
        }
    }

    fn allows_everything_in(&self, imp: &Imp) -> bool {
        (self.banner || imp.banner.is_none())
            && (self.video || imp.video.is_none())
            && (self.audio || imp.audio.is_none())
            && (self.native || imp.native.is_none())
    }
}

/// 在真正的适配器之前按能力声明裁剪请求：
/// 不支持的平台直接拒绝，不支持的媒体对象从 imp 副本上去掉，
/// 去完之后没有任何媒体的 imp 被丢弃。
pub struct InfoAwareBidder<B> {
    bidder: B,
    site: Supports,
    app: Supports,
}

impl<B: Bidder> InfoAwareBidder<B> {
    pub fn new(bidder: B, info: &BidderInfo) -> Self {
        Self {
            bidder,
            site: Supports::from_platform(info.capabilities.site.as_ref()),
            app: Supports::from_platform(info.capabilities.app.as_ref()),
        }
    }

    /// site 和 app 都出现时两个平台都必须支持，媒体类型按 app 的声明；
    /// 两者都没有时不放行任何媒体
    fn platform_supports(&self, request: &BidRequest) -> Result<Supports, AdapterError> {
        let mut allowed = Supports::default();
        if request.site.is_some() {
            if !self.site.enabled {
                return Err(AdapterError::bad_input(
                    "this bidder does not support site requests",
                ));
            }
            allowed = self.site;
        }
        if request.app.is_some() {
            if !self.app.enabled {
                return Err(AdapterError::bad_input(
                    "this bidder does not support app requests",
                ));
            }
            allowed = self.app;
        }
        Ok(allowed)
    }

    fn prune_imp(imp: &mut Imp, index: usize, allowed: &Supports, errs: &mut Vec<AdapterError>) {
        let mut strip = |present: bool, media: &str| {
            if present {
                errs.push(
                    AdapterError::bad_input(format!(
                        "request.imp[{}] uses {}, but this bidder doesn't support it",
                        index, media
                    ))
                    .for_imp(&imp.id),
                );
            }
        };
        strip(!allowed.banner && imp.banner.is_some(), "banner");
        strip(!allowed.video && imp.video.is_some(), "video");
        strip(!allowed.audio && imp.audio.is_some(), "audio");
        strip(!allowed.native && imp.native.is_some(), "native");

        if !allowed.banner {
            imp.banner = None;
        }
        if !allowed.video {
            imp.video = None;
        }
        if !allowed.audio {
            imp.audio = None;
        }
        if !allowed.native {
            imp.native = None;
        }
    }
}

impl<B: Bidder> Bidder for InfoAwareBidder<B> {
    fn make_requests(
        &self,
        request: &BidRequest,
        info: &ExtraRequestInfo,
    ) -> (Vec<RequestData>, Vec<AdapterError>) {
        let allowed = match self.platform_supports(request) {
            Ok(allowed) => allowed,
            Err(e) => return (Vec::new(), vec![e]),
        };

        let mut errs = Vec::new();
        let untouched = !request.imp.is_empty()
            && request
                .imp
                .iter()
                .all(|imp| imp.has_any_media() && allowed.allows_everything_in(imp));
        let request: Cow<'_, BidRequest> = if untouched {
            Cow::Borrowed(request)
        } else {
            let mut pruned = request.clone();
            let mut imps = std::mem::take(&mut pruned.imp);
            for (index, imp) in imps.iter_mut().enumerate() {
                Self::prune_imp(imp, index, &allowed, &mut errs);
            }
            if imps.iter().all(|imp| !imp.has_any_media()) {
                errs.push(AdapterError::bad_input(
                    "Bid request didn't contain media types supported by the bidder",
                ));
                return (Vec::new(), errs);
            }

            let mut kept = Vec::with_capacity(imps.len());
            for (index, imp) in imps.into_iter().enumerate() {
                if imp.has_any_media() {
                    kept.push(imp);
                } else {
                    warn!(request_id = %request.id, imp_id = %imp.id, "imp has no supported media types");
                    errs.push(
                        AdapterError::bad_input(format!(
                            "request.imp[{}] has no supported MediaTypes. It will be ignored",
                            index
                        ))
                        .for_imp(&imp.id),
                    );
                }
            }
            pruned.imp = kept;
            Cow::Owned(pruned)
        };

        let (requests, delegate_errs) = self.bidder.make_requests(&request, info);
        errs.extend(delegate_errs);
        (requests, errs)
    }

    fn make_bids(
        &self,
        internal_request: &BidRequest,
        external_request: &RequestData,
        response: &ResponseData,
    ) -> (Option<BidderResponse>, Vec<AdapterError>) {
        self.bidder
            .make_bids(internal_request, external_request, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ErrorKind;
    use crate::openrtb::request::{App, Banner, Site, Video};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// 记录收到的 imp 数量
    #[derive(Default)]
    struct Recorder {
        seen_imps: AtomicUsize,
    }

    impl Bidder for &Recorder {
        fn make_requests(
            &self,
            request: &BidRequest,
            _info: &ExtraRequestInfo,
        ) -> (Vec<RequestData>, Vec<AdapterError>) {
            self.seen_imps.store(request.imp.len(), Ordering::SeqCst);
            (Vec::new(), Vec::new())
        }

        fn make_bids(
            &self,
            _internal_request: &BidRequest,
            _external_request: &RequestData,
            _response: &ResponseData,
        ) -> (Option<BidderResponse>, Vec<AdapterError>) {
            (None, Vec::new())
        }
    }

    fn info(site: Option<Vec<BidType>>, app: Option<Vec<BidType>>) -> BidderInfo {
        BidderInfo {
            capabilities: Capabilities {
                site: site.map(|media_types| PlatformInfo { media_types }),
                app: app.map(|media_types| PlatformInfo { media_types }),
            },
        }
    }

    fn banner_imp(id: &str) -> Imp {
        Imp {
            id: id.to_string(),
            banner: Some(Banner::default()),
            ..Default::default()
        }
    }

    fn video_imp(id: &str) -> Imp {
        Imp {
            id: id.to_string(),
            video: Some(Video::default()),
            ..Default::default()
        }
    }

    #[test]
    fn rejects_unsupported_platform() {
        let recorder = Recorder::default();
        let bidder = InfoAwareBidder::new(&recorder, &info(Some(vec![BidType::Banner]), None));
        let request = BidRequest {
            app: Some(Arc::new(App::default())),
            imp: vec![banner_imp("1")],
            ..Default::default()
        };
        let (reqs, errs) = bidder.make_requests(&request, &ExtraRequestInfo::default());
        assert!(reqs.is_empty());
        assert_eq!(errs[0].message(), "this bidder does not support app requests");
        assert_eq!(recorder.seen_imps.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn strips_unsupported_media_and_drops_empty_imps() {
        let recorder = Recorder::default();
        let bidder = InfoAwareBidder::new(&recorder, &info(Some(vec![BidType::Banner]), None));
        let mut mixed = banner_imp("mixed");
        mixed.video = Some(Video::default());
        let request = BidRequest {
            site: Some(Arc::new(Site::default())),
            imp: vec![mixed, video_imp("video-only"), banner_imp("banner")],
            ..Default::default()
        };

        let (_, errs) = bidder.make_requests(&request, &ExtraRequestInfo::default());
        assert_eq!(recorder.seen_imps.load(Ordering::SeqCst), 2);
        assert_eq!(errs.len(), 3);
        assert!(errs.iter().all(|e| e.kind() == ErrorKind::BadInput));
        assert_eq!(
            errs[2].message(),
            "request.imp[1] has no supported MediaTypes. It will be ignored"
        );
        // 原始请求不受影响
        assert!(request.imp[0].video.is_some());
    }

    #[test]
    fn nothing_left_means_no_delegate_call() {
        let recorder = Recorder::default();
        let bidder = InfoAwareBidder::new(&recorder, &info(Some(vec![BidType::Native]), None));
        let request = BidRequest {
            site: Some(Arc::new(Site::default())),
            imp: vec![banner_imp("1")],
            ..Default::default()
        };
        let (reqs, errs) = bidder.make_requests(&request, &ExtraRequestInfo::default());
        assert!(reqs.is_empty());
        assert_eq!(
            errs.last().map(|e| e.message()),
            Some("Bid request didn't contain media types supported by the bidder")
        );
        assert_eq!(recorder.seen_imps.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn site_and_app_both_need_support() {
        let recorder = Recorder::default();
        let bidder = InfoAwareBidder::new(&recorder, &info(None, Some(vec![BidType::Banner])));
        let request = BidRequest {
            site: Some(Arc::new(Site::default())),
            app: Some(Arc::new(App::default())),
            imp: vec![banner_imp("1")],
            ..Default::default()
        };
        let (reqs, errs) = bidder.make_requests(&request, &ExtraRequestInfo::default());
        assert!(reqs.is_empty());
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].message(), "this bidder does not support site requests");
        assert_eq!(recorder.seen_imps.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn app_media_types_win_when_both_platforms_present() {
        let recorder = Recorder::default();
        let bidder = InfoAwareBidder::new(
            &recorder,
            &info(Some(vec![BidType::Banner]), Some(vec![BidType::Video])),
        );
        let request = BidRequest {
            site: Some(Arc::new(Site::default())),
            app: Some(Arc::new(App::default())),
            imp: vec![banner_imp("banner"), video_imp("video")],
            ..Default::default()
        };
        let (_, errs) = bidder.make_requests(&request, &ExtraRequestInfo::default());
        assert_eq!(recorder.seen_imps.load(Ordering::SeqCst), 1);
        assert_eq!(
            errs[0].message(),
            "request.imp[0] uses banner, but this bidder doesn't support it"
        );
    }

    #[test]
    fn request_without_platform_is_rejected() {
        let recorder = Recorder::default();
        let bidder = InfoAwareBidder::new(
            &recorder,
            &info(Some(vec![BidType::Banner]), Some(vec![BidType::Banner])),
        );
        let request = BidRequest {
            imp: vec![banner_imp("1")],
            ..Default::default()
        };
        let (reqs, errs) = bidder.make_requests(&request, &ExtraRequestInfo::default());
        assert!(reqs.is_empty());
        assert_eq!(errs.len(), 2);
        assert_eq!(
            errs[0].message(),
            "request.imp[0] uses banner, but this bidder doesn't support it"
        );
        assert_eq!(
            errs[1].message(),
            "Bid request didn't contain media types supported by the bidder"
        );
        assert_eq!(recorder.seen_imps.load(Ordering::SeqCst), 0);
    }
}
