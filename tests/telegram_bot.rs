// tests/telegram_bot.rs
//
// Telegram sink and update poller against a local fake Bot API.

use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use eth_tracker_bot::commands::{AccessList, UpdatePoller};
use eth_tracker_bot::dedup::DedupCache;
use eth_tracker_bot::ingest::providers::channel::ChannelHistory;
use eth_tracker_bot::ingest::types::ChannelSource;
use eth_tracker_bot::notify::telegram::Update;
use eth_tracker_bot::notify::{
    DeliveryError, Destination, OutgoingMessage, Sink, TelegramApi,
};
use eth_tracker_bot::scheduler::Scheduler;
use eth_tracker_bot::status::StatusSource;

type Calls = Arc<Mutex<Vec<(String, Value)>>>;

async fn record(calls: &Calls, method: &str, body: Value) -> (StatusCode, Json<Value>) {
    calls.lock().push((method.to_string(), body.clone()));
    match body["chat_id"].as_str() {
        Some("busy") => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "ok": false, "error_code": 429,
                "description": "Too Many Requests: retry after 7",
                "parameters": { "retry_after": 7 }
            })),
        ),
        Some("blocked") => (
            StatusCode::FORBIDDEN,
            Json(json!({ "ok": false, "error_code": 403, "description": "Forbidden: bot was kicked" })),
        ),
        _ => (StatusCode::OK, Json(json!({ "ok": true, "result": { "message_id": 1 } }))),
    }
}

async fn fake_bot_api() -> (String, Calls) {
    let calls: Calls = Arc::default();
    let app = Router::new()
        .route(
            "/botTEST/sendMessage",
            post(|State(c): State<Calls>, Json(b): Json<Value>| async move {
                record(&c, "sendMessage", b).await
            }),
        )
        .route(
            "/botTEST/sendPhoto",
            post(|State(c): State<Calls>, Json(b): Json<Value>| async move {
                record(&c, "sendPhoto", b).await
            }),
        )
        .route(
            "/botTEST/getUpdates",
            post(|| async {
                Json(json!({ "ok": true, "result": [{
                    "update_id": 10,
                    "channel_post": {
                        "message_id": 55, "date": 1741082400,
                        "chat": { "id": -1001234, "username": "whale_alert_io" },
                        "text": "24,500 #ETH (92,400,123 USD) transferred from #Binance to unknown wallet"
                    }
                }]}))
            }),
        )
        .with_state(calls.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    (format!("http://{addr}"), calls)
}

fn api(base: &str) -> TelegramApi {
    TelegramApi::with_base_url(base, "TEST", Duration::from_secs(5))
}

#[tokio::test]
async fn html_text_goes_out_with_parse_mode_and_no_preview() {
    let (base, calls) = fake_bot_api().await;
    let dest = Destination::Broadcast("@eth".into());
    api(&base)
        .send(&dest, &OutgoingMessage::html("<b>hi</b>"))
        .await
        .expect("sent");

    let calls = calls.lock();
    let (method, body) = &calls[0];
    assert_eq!(method, "sendMessage");
    assert_eq!(body["chat_id"], "@eth");
    assert_eq!(body["parse_mode"], "HTML");
    assert_eq!(body["disable_web_page_preview"], true);
}

#[tokio::test]
async fn photo_caption_carries_no_parse_mode() {
    let (base, calls) = fake_bot_api().await;
    let msg = OutgoingMessage::Photo {
        url: "https://img.example/eth.png".into(),
        caption: "4H candle".into(),
    };
    api(&base)
        .send(&Destination::Broadcast("@eth".into()), &msg)
        .await
        .expect("sent");

    let calls = calls.lock();
    let (method, body) = &calls[0];
    assert_eq!(method, "sendPhoto");
    assert_eq!(body["caption"], "4H candle");
    assert!(body.get("parse_mode").is_none());
}

#[tokio::test]
async fn api_errors_map_to_delivery_errors() {
    let (base, _calls) = fake_bot_api().await;
    let api = api(&base);

    let err = api
        .send(&Destination::Broadcast("busy".into()), &OutgoingMessage::plain("x"))
        .await
        .unwrap_err();
    assert_eq!(err, DeliveryError::RateLimited { retry_after: Some(7) });

    let err = api
        .send(&Destination::Broadcast("blocked".into()), &OutgoingMessage::plain("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, DeliveryError::Forbidden(_)));

    // nothing listening at this path
    let err = TelegramApi::with_base_url(format!("{base}/nowhere"), "TEST", Duration::from_secs(5))
        .send(&Destination::Admin("1".into()), &OutgoingMessage::plain("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, DeliveryError::Other(_)));
}

#[derive(Default)]
struct Replies(Mutex<Vec<(Destination, String)>>);

#[async_trait]
impl Sink for Replies {
    async fn send(&self, dest: &Destination, msg: &OutgoingMessage) -> Result<(), DeliveryError> {
        self.0.lock().push((dest.clone(), msg.body().to_string()));
        Ok(())
    }
}

fn poller(base: &str, history: ChannelHistory, replies: Arc<Replies>) -> UpdatePoller {
    let running = Scheduler::new().start();
    let status = StatusSource {
        scheduler: running.handle(),
        cache: Arc::new(DedupCache::default()),
        symbol: "ETHUSDT".into(),
        dry_run: false,
        started_at: Utc::now(),
    };
    UpdatePoller::new(api(base), replies, history, status, AccessList::new("42", &[]))
}

fn command(chat: i64, user: i64, text: &str) -> Update {
    serde_json::from_value(json!({
        "update_id": 1,
        "message": {
            "message_id": 9,
            "date": Utc::now().timestamp() + 1,
            "chat": { "id": chat },
            "from": { "id": user },
            "text": text
        }
    }))
    .expect("update json")
}

#[tokio::test]
async fn get_updates_feeds_channel_history() {
    let (base, _calls) = fake_bot_api().await;
    let updates = api(&base).get_updates(0, 0).await.expect("updates");
    assert_eq!(updates.len(), 1);

    let history = ChannelHistory::default();
    let p = poller(&base, history.clone(), Arc::default());
    for u in updates {
        p.handle_update(u).await;
    }

    let posts = history
        .recent_posts("@Whale_Alert_IO", 20)
        .await
        .expect("posts");
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].link.as_deref(), Some("https://t.me/whale_alert_io/55"));
    assert_eq!(history.len("-1001234"), 1);
}

#[tokio::test]
async fn commands_are_gated_by_the_allow_list() {
    let (base, _calls) = fake_bot_api().await;
    let replies = Arc::new(Replies::default());
    let p = poller(&base, ChannelHistory::default(), replies.clone());

    p.handle_update(command(42, 42, "/start")).await;
    p.handle_update(command(42, 42, "/status")).await;
    p.handle_update(command(99, 99, "/status")).await;
    p.handle_update(command(42, 42, "just chatting")).await;

    let replies = replies.0.lock();
    assert_eq!(replies.len(), 3);
    assert!(replies[0].1.contains("Ethereum Tracker Bot"));
    assert!(replies[1].1.contains("Jobs registered: 0"));
    assert!(replies[1].1.contains("ETH/USDT: no price yet"));
    assert_eq!(replies[2].0, Destination::Admin("99".into()));
    assert!(replies[2].1.contains("Access denied"));
}
