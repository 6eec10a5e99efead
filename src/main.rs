// src/main.rs

use std::collections::HashMap;
use std::sync::Arc;

use axum::routing::post;
use axum::{serve, Router};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use rtb_mediation::adapters::appnexus::{self, AppNexusAdapter};
use rtb_mediation::adapters::info::{BidderInfo, InfoAwareBidder};
use rtb_mediation::adapters::rtbhouse::{self, RtbHouseAdapter};
use rtb_mediation::adapters::Bidder;
use rtb_mediation::config::{ConfigManager, FileConfigSource};
use rtb_mediation::currency::CurrencyConverter;
use rtb_mediation::logging;

mod api;
mod mock_bidder;

use api::handlers::{handle_make_bids, handle_make_requests};

pub struct AppState {
    pub bidders: HashMap<String, Arc<dyn Bidder>>,
    pub currency: Arc<dyn CurrencyConverter>,
}

#[derive(Parser, Debug)]
#[command(author = "whiteCcinn", version = "1.0", about = "OpenRTB bidder translation preview server")]
struct CliArgs {
    #[arg(short, long, default_value_t = 8080)]
    port: u16,
    #[arg(long, default_value = "logs")]
    log_dir: String,
    #[arg(long, default_value = "static/config.json")]
    config: String,
    /// 0 表示不启动 mock bidder
    #[arg(long, default_value_t = 9001)]
    mock_port: u16,
}

/// 有能力声明时套一层 InfoAwareBidder
fn with_info<B: Bidder + 'static>(bidder: B, info: Option<&BidderInfo>) -> Arc<dyn Bidder> {
    match info {
        Some(info) => Arc::new(InfoAwareBidder::new(bidder, info)),
        None => Arc::new(bidder),
    }
}

fn build_bidders(config: &ConfigManager) -> HashMap<String, Arc<dyn Bidder>> {
    let mut bidders = HashMap::new();
    for (name, cfg) in config.enabled_adapters() {
        let bidder = match name {
            appnexus::BIDDER_NAME => {
                let mut adapter = AppNexusAdapter::new(
                    &cfg.endpoint,
                    cfg.platform_id.as_deref(),
                    config.iab_categories(),
                );
                if let Some(max) = cfg.max_imps_per_request {
                    adapter = adapter.with_max_imps_per_request(max);
                }
                with_info(adapter, cfg.info.as_ref())
            }
            rtbhouse::BIDDER_NAME => {
                with_info(RtbHouseAdapter::new(&cfg.endpoint), cfg.info.as_ref())
            }
            other => {
                warn!(bidder = other, "no adapter registered for bidder, skipped");
                continue;
            }
        };
        info!(bidder = name, endpoint = %cfg.endpoint, "bidder enabled");
        bidders.insert(name.to_string(), bidder);
    }
    bidders
}

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    // guard 必须活到进程退出
    let _guard = logging::init(&args.log_dir).expect("Unable to set global tracing subscriber");
    info!("translation preview server starting on port {}", args.port);

    let config = ConfigManager::load(FileConfigSource::new(&args.config))
        .expect("Unable to load configuration");

    let state = Arc::new(AppState {
        bidders: build_bidders(&config),
        currency: config.currency_converter(),
    });

    if args.mock_port != 0 {
        let mock_port = args.mock_port;
        tokio::spawn(async move {
            mock_bidder::start_mock_bidder_server(mock_port).await;
        });
    }

    let app = Router::new()
        .route("/bidders/{bidder}/requests", post(handle_make_requests))
        .route("/bidders/{bidder}/bids", post(handle_make_bids))
        .with_state(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Unable to bind preview server address");
    info!("translation preview server running at http://{}", addr);

    if let Err(e) = serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
        })
        .await
    {
        warn!(error = %e, "server stopped with error");
    }
    info!("translation preview server shut down");
}
