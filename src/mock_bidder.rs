// src/mock_bidder.rs

use axum::routing::post;
use axum::{serve, Json, Router};
use rand::Rng;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::time::{sleep, Duration};
use tracing::{error, info};
use uuid::Uuid;

use rtb_mediation::openrtb::request::{BidRequest, Imp};
use rtb_mediation::openrtb::response::{Bid, BidResponse, SeatBid};

/// 没有底价时的基准价
const BASE_PRICE: f64 = 0.5;

/// bid_ad_type: 0 banner, 1 video, 2 audio, 3 native
fn bid_ad_type(imp: &Imp) -> u8 {
    if imp.video.is_some() {
        1
    } else if imp.audio.is_some() {
        2
    } else if imp.native.is_some() {
        3
    } else {
        0
    }
}

fn mock_adm(bid_ad_type: u8, bid_id: &str) -> String {
    match bid_ad_type {
        1 | 2 => format!(
            r#"<VAST version="3.0"><Ad id="{bid_id}"><InLine><AdSystem>Mock AppNexus</AdSystem><Impression><![CDATA[http://mock-bidder.local/impression?bid={bid_id}]]></Impression></InLine></Ad></VAST>"#
        ),
        3 => format!(
            r#"{{"native":{{"assets":[{{"title":{{"text":"Mock Native Ad"}}}}],"imptrackers":["http://mock-bidder.local/impression?bid={bid_id}"]}}}}"#
        ),
        _ => format!(
            "<html><body>Mock AppNexus Ad<img src=\"http://mock-bidder.local/impression?bid={bid_id}\" style=\"display:none;\" /></body></html>"
        ),
    }
}

/// 以 AppNexus 的响应方言出价：`ext.appnexus` 里带 `bid_ad_type`、品牌分类和视频时长
fn mock_bid(imp: &Imp) -> Bid {
    let mut rng = rand::thread_rng();
    let bid_id = Uuid::new_v4().to_string();
    let ad_type = bid_ad_type(imp);

    let floor = if imp.bidfloor > 0.0 { imp.bidfloor } else { BASE_PRICE };
    let price = (floor * rng.gen_range(1.0..2.0) * 100.0).round() / 100.0;

    let mut appnexus = json!({
        "bid_ad_type": ad_type,
        "brand_id": rng.gen_range(1..1000),
        "brand_category_id": rng.gen_range(1..40),
    });
    if ad_type == 1 {
        let duration = imp
            .video
            .as_ref()
            .and_then(|v| v.maxduration)
            .unwrap_or(30);
        appnexus["creative_info"] = json!({"video": {"duration": duration}});
    }

    Bid {
        adm: Some(mock_adm(ad_type, &bid_id)),
        id: bid_id,
        impid: imp.id.clone(),
        price,
        crid: Some(format!("mock-creative-{}", ad_type)),
        ext: Some(json!({ "appnexus": appnexus })),
        ..Default::default()
    }
}

async fn handle_openrtb2(Json(request): Json<BidRequest>) -> Json<BidResponse> {
    info!(request_id = %request.id, imp_count = request.imp.len(), "mock bidder received request");

    // 模拟 bidder 处理延迟（20 ~ 80 毫秒）
    let delay_ms = rand::thread_rng().gen_range(20..80);
    sleep(Duration::from_millis(delay_ms)).await;

    let bids = request.imp.iter().map(mock_bid).collect();

    Json(BidResponse {
        id: request.id.clone(),
        seatbid: vec![SeatBid {
            bid: bids,
            seat: Some("mock_appnexus".to_string()),
            group: Some(0),
        }],
        cur: Some("USD".to_string()),
        ..Default::default()
    })
}

pub fn router() -> Router {
    Router::new().route("/openrtb2", post(handle_openrtb2))
}

/// 启动 mock AppNexus bidder，路由为 `/openrtb2`
pub async fn start_mock_bidder_server(port: u16) {
    let addr = format!("0.0.0.0:{}", port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %addr, error = %e, "mock bidder failed to bind");
            return;
        }
    };
    info!("Mock AppNexus bidder running at http://{}", addr);
    if let Err(e) = serve(listener, router()).await {
        error!(error = %e, "mock bidder stopped");
    }
}
