// tests/appnexus.rs

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};

use rtb_mediation::adapters::adpod::SequentialPodIdGenerator;
use rtb_mediation::adapters::appnexus::AppNexusAdapter;
use rtb_mediation::adapters::{
    BidType, Bidder, EntryPoint, ErrorKind, ErrorScope, ExtraRequestInfo, RequestData,
    ResponseData,
};
use rtb_mediation::openrtb::request::{Banner, BidRequest, Format, Imp, Video};

const ENDPOINT: &str = "http://ib.adnxs.com/openrtb2";

fn categories() -> Arc<HashMap<String, String>> {
    let mut table = HashMap::new();
    table.insert("1".to_string(), "IAB20-3".to_string());
    table.insert("9".to_string(), "IAB5-1".to_string());
    Arc::new(table)
}

fn adapter() -> AppNexusAdapter {
    AppNexusAdapter::new(ENDPOINT, None, categories())
        .with_pod_id_generator(Arc::new(SequentialPodIdGenerator::starting_at(100)))
}

fn banner_imp(id: &str, bidder: Value) -> Imp {
    Imp {
        id: id.to_string(),
        banner: Some(Banner {
            format: vec![Format::new(300, 250)],
            ..Default::default()
        }),
        ext: Some(json!({ "bidder": bidder })),
        ..Default::default()
    }
}

fn video_imp(id: &str, bidder: Value) -> Imp {
    Imp {
        id: id.to_string(),
        video: Some(Video {
            mimes: vec!["video/mp4".to_string()],
            maxduration: Some(30),
            ..Default::default()
        }),
        ext: Some(json!({ "bidder": bidder })),
        ..Default::default()
    }
}

fn request(imps: Vec<Imp>) -> BidRequest {
    BidRequest {
        id: "req-1".to_string(),
        imp: imps,
        ..Default::default()
    }
}

fn body(req: &RequestData) -> Value {
    serde_json::from_slice(&req.body).unwrap()
}

fn ok_response(body: Value) -> ResponseData {
    ResponseData {
        status_code: 200,
        body: serde_json::to_vec(&body).unwrap(),
    }
}

fn wire_request() -> RequestData {
    RequestData {
        method: "POST".to_string(),
        uri: ENDPOINT.to_string(),
        headers: Vec::new(),
        body: Vec::new(),
        imp_ids: Vec::new(),
    }
}

#[test]
fn pods_get_their_own_requests_and_ids() {
    let pod = json!({"placement_id": 10, "generate_ad_pod_id": true});
    let req = request(vec![
        video_imp("pod1_a", pod.clone()),
        video_imp("pod1_b", pod.clone()),
        video_imp("pod2_a", pod),
    ]);

    let (reqs, errs) = adapter().make_requests(&req, &ExtraRequestInfo::new(EntryPoint::Video));
    assert!(errs.is_empty(), "{:?}", errs);
    assert_eq!(reqs.len(), 2);

    assert_eq!(reqs[0].imp_ids, vec!["pod1_a", "pod1_b"]);
    assert_eq!(reqs[1].imp_ids, vec!["pod2_a"]);

    let first = body(&reqs[0]);
    let second = body(&reqs[1]);
    assert_eq!(first["ext"]["appnexus"]["adpod_id"], json!("100"));
    assert_eq!(second["ext"]["appnexus"]["adpod_id"], json!("101"));
    assert_eq!(first["ext"]["appnexus"]["hb_source"], json!(6));
    assert_eq!(first["imp"].as_array().unwrap().len(), 2);
}

#[test]
fn large_pod_is_split_but_keeps_one_pod_id() {
    let pod = json!({"placement_id": 10, "generate_ad_pod_id": true});
    let imps = (0..12)
        .map(|i| video_imp(&format!("1_{}", i), pod.clone()))
        .collect();

    let (reqs, errs) =
        adapter().make_requests(&request(imps), &ExtraRequestInfo::new(EntryPoint::Video));
    assert!(errs.is_empty());
    assert_eq!(reqs.len(), 2);
    assert_eq!(reqs[0].imp_ids.len(), 10);
    assert_eq!(reqs[1].imp_ids.len(), 2);
    assert_eq!(
        body(&reqs[0])["ext"]["appnexus"]["adpod_id"],
        body(&reqs[1])["ext"]["appnexus"]["adpod_id"]
    );
}

#[test]
fn inconsistent_pod_flag_fails_the_whole_request() {
    let req = request(vec![
        video_imp("1_0", json!({"placement_id": 10, "generate_ad_pod_id": true})),
        video_imp("2_0", json!({"placement_id": 10, "generate_ad_pod_id": false})),
    ]);

    let (reqs, errs) = adapter().make_requests(&req, &ExtraRequestInfo::new(EntryPoint::Video));
    assert!(reqs.is_empty());
    assert_eq!(errs.len(), 1);
    assert_eq!(errs[0].kind(), ErrorKind::BadInput);
    assert_eq!(
        errs[0].message(),
        "generate ad pod option should be same for all pods in request"
    );
}

#[test]
fn fifteen_imps_without_pods_make_two_requests() {
    let imps = (0..15)
        .map(|i| banner_imp(&i.to_string(), json!({"placement_id": 10})))
        .collect();

    let (reqs, errs) = adapter().make_requests(&request(imps), &ExtraRequestInfo::default());
    assert!(errs.is_empty());
    assert_eq!(reqs.len(), 2);
    assert_eq!(reqs[0].imp_ids.len(), 10);
    assert_eq!(reqs[1].imp_ids.len(), 5);
    assert!(body(&reqs[0])["ext"]["appnexus"].get("adpod_id").is_none());
    assert_eq!(reqs[0].method, "POST");
    assert_eq!(reqs[0].uri, ENDPOINT);
}

#[test]
fn member_mismatch_keeps_first_member_and_warns() {
    let req = request(vec![
        banner_imp("1", json!({"member": "103", "inv_code": "a"})),
        banner_imp("2", json!({"member": "104", "inv_code": "b"})),
    ]);

    let (reqs, errs) = adapter().make_requests(&req, &ExtraRequestInfo::default());
    assert_eq!(reqs.len(), 1);
    assert_eq!(reqs[0].uri, format!("{}?member_id=103", ENDPOINT));
    assert_eq!(reqs[0].imp_ids, vec!["1", "2"]);
    assert_eq!(errs.len(), 1);
    assert!(errs[0].message().contains("103"));
    assert!(errs[0].message().contains("104"));

    let imps = body(&reqs[0])["imp"].clone();
    assert_eq!(imps[0]["tagid"], json!("a"));
    assert_eq!(imps[1]["tagid"], json!("b"));
}

#[test]
fn invalid_imp_is_dropped_with_scoped_error() {
    let req = request(vec![
        banner_imp("good", json!({"placementId": 10, "keywords": [{"key": "genre", "value": ["rock", "pop"]}]})),
        banner_imp("bad", json!({"inv_code": "orphan"})),
    ]);

    let (reqs, errs) = adapter().make_requests(&req, &ExtraRequestInfo::default());
    assert_eq!(reqs.len(), 1);
    assert_eq!(reqs[0].imp_ids, vec!["good"]);
    assert_eq!(errs.len(), 1);
    assert_eq!(errs[0].message(), "No placement or member+invcode provided");
    assert_eq!(
        errs[0].scope(),
        &ErrorScope::Imp {
            imp_id: "bad".to_string()
        }
    );

    let imp = &body(&reqs[0])["imp"][0];
    assert_eq!(imp["ext"]["appnexus"]["placement_id"], json!(10));
    assert_eq!(imp["ext"]["appnexus"]["keywords"], json!("genre=rock,genre=pop"));
    assert_eq!(imp["banner"]["w"], json!(300));
    assert_eq!(imp["banner"]["h"], json!(250));
}

#[test]
fn all_invalid_imps_produce_no_requests() {
    let req = request(vec![
        banner_imp("1", json!({})),
        Imp {
            id: "2".to_string(),
            ..Default::default()
        },
    ]);

    let (reqs, errs) = adapter().make_requests(&req, &ExtraRequestInfo::default());
    assert!(reqs.is_empty());
    assert_eq!(errs.len(), 2);
    assert!(errs.iter().all(|e| e.kind() == ErrorKind::BadInput));
}

#[test]
fn no_content_is_an_empty_success() {
    let (resp, errs) = adapter().make_bids(
        &request(Vec::new()),
        &wire_request(),
        &ResponseData {
            status_code: 204,
            body: Vec::new(),
        },
    );
    assert!(errs.is_empty());
    assert!(resp.unwrap().bids.is_empty());
}

#[test]
fn bad_request_status_is_bad_input() {
    let (resp, errs) = adapter().make_bids(
        &request(Vec::new()),
        &wire_request(),
        &ResponseData {
            status_code: 400,
            body: b"bad".to_vec(),
        },
    );
    assert!(resp.is_none());
    assert_eq!(errs.len(), 1);
    assert_eq!(errs[0].kind(), ErrorKind::BadInput);

    let (resp, errs) = adapter().make_bids(
        &request(Vec::new()),
        &wire_request(),
        &ResponseData {
            status_code: 503,
            body: Vec::new(),
        },
    );
    assert!(resp.is_none());
    assert_eq!(errs[0].kind(), ErrorKind::BadServerResponse);
}

#[test]
fn bad_bid_is_isolated_from_the_rest() {
    let response = ok_response(json!({
        "id": "req-1",
        "seatbid": [{
            "bid": [
                {"id": "b1", "impid": "1", "price": 1.5,
                 "ext": {"appnexus": {"bid_ad_type": 0, "brand_category_id": 1}}},
                {"id": "b2", "impid": "2", "price": 2.5,
                 "ext": {"appnexus": {"bid_ad_type": 9}}},
                {"id": "b3", "impid": "3", "price": 3.5, "cat": ["IAB1", "IAB2"],
                 "ext": {"appnexus": {"bid_ad_type": 1, "deal_priority": 5,
                                      "creative_info": {"video": {"duration": 15}}}}}
            ]
        }]
    }));

    let (resp, errs) = adapter().make_bids(&request(Vec::new()), &wire_request(), &response);
    let resp = resp.unwrap();
    assert_eq!(resp.currency, "USD");
    assert_eq!(resp.bids.len(), 2);

    assert_eq!(resp.bids[0].bid.id, "b1");
    assert_eq!(resp.bids[0].bid_type, BidType::Banner);
    assert_eq!(resp.bids[0].bid.cat, vec!["IAB20-3"]);

    assert_eq!(resp.bids[1].bid_type, BidType::Video);
    assert!(resp.bids[1].bid.cat.is_empty());
    assert_eq!(resp.bids[1].deal_priority, 5);
    assert_eq!(resp.bids[1].bid_video.as_ref().map(|v| v.duration), Some(15));

    assert_eq!(errs.len(), 1);
    assert_eq!(errs[0].kind(), ErrorKind::BadServerResponse);
    assert_eq!(
        errs[0].scope(),
        &ErrorScope::Bid {
            imp_id: "2".to_string(),
            bid_id: "b2".to_string()
        }
    );
}

#[test]
fn response_currency_overrides_default() {
    let response = ok_response(json!({
        "id": "req-1",
        "cur": "EUR",
        "seatbid": [{"bid": [{"id": "b1", "impid": "1", "price": 1.0,
                              "ext": {"appnexus": {"bid_ad_type": 3}}}]}]
    }));
    let (resp, errs) = adapter().make_bids(&request(Vec::new()), &wire_request(), &response);
    assert!(errs.is_empty());
    let resp = resp.unwrap();
    assert_eq!(resp.currency, "EUR");
    assert_eq!(resp.bids[0].bid_type, BidType::Native);
}

#[test]
fn unparseable_body_rejects_the_response() {
    let (resp, errs) = adapter().make_bids(
        &request(Vec::new()),
        &wire_request(),
        &ResponseData {
            status_code: 200,
            body: b"{not json".to_vec(),
        },
    );
    assert!(resp.is_none());
    assert_eq!(errs[0].kind(), ErrorKind::BadServerResponse);
}

#[test]
fn unmodelled_openrtb_fields_reach_the_bidder() {
    let req: BidRequest = serde_json::from_value(json!({
        "id": "r",
        "bapp": ["com.blocked.app"],
        "device": {"ua": "x", "dnt": 1, "lmt": 1, "w": 375, "h": 812, "connectiontype": 2},
        "user": {"id": "u", "eids": [{"source": "id5-sync.com", "uids": [{"id": "abc"}]}]},
        "imp": [{
            "id": "1",
            "rwdd": 1,
            "video": {"mimes": ["video/mp4"], "api": [2], "playbackmethod": [1], "skip": 1},
            "ext": {"bidder": {"placement_id": 10}}
        }]
    }))
    .unwrap();

    let (reqs, errs) = adapter().make_requests(&req, &ExtraRequestInfo::default());
    assert!(errs.is_empty(), "{:?}", errs);
    let body = body(&reqs[0]);

    assert_eq!(body["bapp"], json!(["com.blocked.app"]));
    assert_eq!(body["device"]["dnt"], json!(1));
    assert_eq!(body["device"]["lmt"], json!(1));
    assert_eq!(body["device"]["w"], json!(375));
    assert_eq!(body["device"]["connectiontype"], json!(2));
    assert_eq!(body["user"]["eids"][0]["source"], json!("id5-sync.com"));
    assert_eq!(body["imp"][0]["rwdd"], json!(1));
    assert_eq!(body["imp"][0]["video"]["api"], json!([2]));
    assert_eq!(body["imp"][0]["video"]["playbackmethod"], json!([1]));
    assert_eq!(body["imp"][0]["video"]["skip"], json!(1));
    assert_eq!(body["imp"][0]["ext"]["appnexus"]["placement_id"], json!(10));
}

#[test]
fn null_bid_ext_fields_keep_the_bid() {
    let response = ok_response(json!({
        "id": "req-1",
        "seatbid": [{"bid": [{"id": "b1", "impid": "1", "price": 1.0,
                              "ext": {"appnexus": {"bid_ad_type": 0, "brand_category_id": null,
                                                   "deal_priority": null}}}]}]
    }));
    let (resp, errs) = adapter().make_bids(&request(Vec::new()), &wire_request(), &response);
    assert!(errs.is_empty(), "{:?}", errs);
    let resp = resp.unwrap();
    assert_eq!(resp.bids.len(), 1);
    assert_eq!(resp.bids[0].bid_type, BidType::Banner);
    assert_eq!(resp.bids[0].deal_priority, 0);
}
