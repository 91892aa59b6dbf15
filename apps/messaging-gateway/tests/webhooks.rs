use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use hmac::{Hmac, Mac};
use http_body_util::BodyExt;
use hub_core::{
    AdapterCall, AdapterRegistry, BotDefinition, Flow, Lane, Platform, RecordingAdapter, Sender,
    WebChatAdapter,
};
use hub_gateway::config::WebhookSecrets;
use hub_gateway::{GatewayState, SIGNATURE_HEADER, TELEGRAM_SECRET_HEADER, build_router};
use hub_ledger::{BotRepository, Ledger, LedgerConfig, MemoryBotRepository};
use hub_runner::{BotEngine, EngineConfig};
use serde_json::{Value, json};
use sha2::Sha256;
use time::OffsetDateTime;
use tower::ServiceExt;

const APP_SECRET: &str = "app-secret";

struct TestHub {
    router: Router,
    ledger: Ledger,
    whatsapp: Arc<RecordingAdapter>,
    telegram: Arc<RecordingAdapter>,
}

async fn hub() -> TestHub {
    let ledger = Ledger::in_memory(LedgerConfig::default());
    ledger
        .put_lane(Lane {
            id: "inbox".into(),
            name: "Bandeja de entrada".into(),
            order: Some(0),
        })
        .await
        .unwrap();

    let bots = Arc::new(MemoryBotRepository::new());
    let flow: Flow = serde_json::from_value(json!({
        "nodes": [
            {"id": "start", "type": "startNode"},
            {"id": "hi", "type": "textMessageNode", "data": {"content": "Bienvenido"}},
            {"id": "ask", "type": "captureInputNode", "data": {"variableName": "nombre"}}
        ],
        "edges": [
            {"source": "start", "target": "hi"},
            {"source": "hi", "target": "ask"}
        ]
    }))
    .unwrap();
    bots.put_bot(BotDefinition {
        id: "welcome".into(),
        name: "Bienvenida".into(),
        is_active: false,
        updated_at: OffsetDateTime::now_utc(),
        flow,
    })
    .await
    .unwrap();
    bots.activate("welcome").await.unwrap();

    let whatsapp = Arc::new(RecordingAdapter::new(Platform::WhatsApp));
    let telegram = Arc::new(RecordingAdapter::new(Platform::Telegram));
    let mut adapters = AdapterRegistry::new();
    adapters.register(whatsapp.clone()).unwrap();
    adapters.register(telegram.clone()).unwrap();
    adapters.register(Arc::new(WebChatAdapter)).unwrap();

    let state = Arc::new(GatewayState {
        engine: BotEngine::new(ledger.clone(), EngineConfig::default()),
        ledger: ledger.clone(),
        bots,
        adapters,
        secrets: WebhookSecrets {
            whatsapp_verify_token: Some("verify-me".into()),
            whatsapp_app_secret: Some(APP_SECRET.into()),
            telegram_secret_token: Some("tg-secret".into()),
            ..WebhookSecrets::default()
        },
    });
    TestHub {
        router: build_router(state),
        ledger,
        whatsapp,
        telegram,
    }
}

fn sign(body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(APP_SECRET.as_bytes()).unwrap();
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

fn whatsapp_text(from: &str, id: &str, text: &str) -> Value {
    json!({"object": "whatsapp_business_account", "entry": [{"changes": [{"value": {
        "contacts": [{"wa_id": from, "profile": {"name": "Luis"}}],
        "messages": [{"from": from, "id": id, "timestamp": "1700000000",
                      "type": "text", "text": {"body": text}}]
    }}]}]})
}

fn signed_post(uri: &str, payload: &Value) -> Request<Body> {
    let body = serde_json::to_vec(payload).unwrap();
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, sign(&body))
        .body(Body::from(body))
        .unwrap()
}

fn json_request(method: &str, uri: &str, payload: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, body)
}

#[tokio::test(start_paused = true)]
async fn whatsapp_text_creates_card_and_runs_bot() {
    let hub = hub().await;
    let (status, body) = send(
        &hub.router,
        signed_post("/webhooks/whatsapp", &whatsapp_text("5215511112222", "wamid.1", "Hola")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["messages"][0]["isNew"], true);
    assert_eq!(body["messages"][0]["botOutcome"], "suspended");
    assert_eq!(hub.whatsapp.sent_texts(), vec!["Bienvenido"]);

    let card_id = body["messages"][0]["cardId"].as_str().unwrap();
    let card = hub.ledger.get_card(card_id).await.unwrap().unwrap();
    assert_eq!(card.contact_name, "Luis");
    assert_eq!(card.messages.len(), 2);
    assert_eq!(
        card.bot_state.and_then(|s| s.current_node_id).as_deref(),
        Some("ask")
    );
}

#[tokio::test(start_paused = true)]
async fn bad_signature_is_rejected_before_the_ledger() {
    let hub = hub().await;
    let payload = whatsapp_text("5215533334444", "wamid.2", "Hola");
    let request = Request::builder()
        .method("POST")
        .uri("/webhooks/whatsapp")
        .header(SIGNATURE_HEADER, "sha256=00")
        .body(Body::from(payload.to_string()))
        .unwrap();

    let (status, body) = send(&hub.router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains("signature"));
    assert!(
        hub.ledger
            .find_by_identity(Platform::WhatsApp, "5215533334444")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn subscription_handshake_echoes_challenge() {
    let hub = hub().await;
    let ok = Request::builder()
        .uri("/webhooks/whatsapp?hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=1158201444")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&hub.router, ok).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(1158201444));

    let wrong = Request::builder()
        .uri("/webhooks/whatsapp?hub.mode=subscribe&hub.verify_token=nope&hub.challenge=1")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&hub.router, wrong).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let meta = Request::builder()
        .uri("/webhooks/meta?hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=1")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&hub.router, meta).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test(start_paused = true)]
async fn read_receipts_stamp_the_card() {
    let hub = hub().await;
    send(
        &hub.router,
        signed_post("/webhooks/whatsapp", &whatsapp_text("5215599990000", "wamid.3", "Hola")),
    )
    .await;

    let receipt = json!({"entry": [{"changes": [{"value": {"statuses": [
        {"id": "wamid.out", "status": "read", "recipient_id": "5215599990000"}
    ]}}]}]});
    let (status, body) = send(&hub.router, signed_post("/webhooks/whatsapp", &receipt)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["readReceipts"], 1);

    let card = hub
        .ledger
        .find_by_identity(Platform::WhatsApp, "5215599990000")
        .await
        .unwrap()
        .unwrap();
    assert!(card.last_read_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn telegram_requires_secret_token() {
    let hub = hub().await;
    let update = json!({"update_id": 10, "message": {
        "message_id": 5, "date": 1700000000,
        "from": {"id": 777, "first_name": "Leo"}, "chat": {"id": 777}, "text": "hola"
    }});

    let unsigned = json_request("POST", "/webhooks/telegram", &update);
    let (status, _) = send(&hub.router, unsigned).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut signed = json_request("POST", "/webhooks/telegram", &update);
    signed
        .headers_mut()
        .insert(TELEGRAM_SECRET_HEADER, "tg-secret".parse().unwrap());
    let (status, _) = send(&hub.router, signed).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hub.telegram.sent_texts(), vec!["Bienvenido"]);
    match hub.telegram.calls().first() {
        Some(AdapterCall::Text { to, .. }) => assert_eq!(to, "777"),
        other => panic!("unexpected call {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn channel_without_adapter_still_records() {
    let hub = hub().await;
    let payload = json!({"for_user_id": "1", "direct_message_events": [{
        "type": "message_create", "id": "dm1", "created_timestamp": "1700000000000",
        "message_create": {"sender_id": "42", "target": {"recipient_id": "1"},
                           "message_data": {"text": "hey"}}
    }]});
    let (status, _) = send(&hub.router, json_request("POST", "/webhooks/x", &payload)).await;
    assert_eq!(status, StatusCode::OK);

    let card = hub
        .ledger
        .find_by_identity(Platform::X, "42")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(card.messages.len(), 1);
    assert!(card.bot_state.is_none());
}

#[tokio::test(start_paused = true)]
async fn webchat_widget_polls_bot_replies() {
    let hub = hub().await;
    let (status, report) = send(
        &hub.router,
        json_request(
            "POST",
            "/webchat/messages",
            &json!({"sessionId": "sess-9", "text": "hola", "name": "Visitante"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["isNew"], true);

    let poll = Request::builder()
        .uri("/webchat/sess-9/messages?after=1")
        .body(Body::empty())
        .unwrap();
    let (status, messages) = send(&hub.router, poll).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(messages.as_array().unwrap().len(), 1);
    assert_eq!(messages[0]["text"], "Bienvenido");
    assert_eq!(messages[0]["sender"], "agent");

    let missing = Request::builder()
        .uri("/webchat/nobody/messages")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&hub.router, missing).await.0, StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn operator_reply_goes_out_on_last_channel() {
    let hub = hub().await;
    let (_, body) = send(
        &hub.router,
        signed_post("/webhooks/whatsapp", &whatsapp_text("5215500001111", "wamid.4", "Hola")),
    )
    .await;
    let card_id = body["messages"][0]["cardId"].as_str().unwrap().to_string();
    hub.whatsapp.clear();

    let (status, card) = send(
        &hub.router,
        json_request(
            "POST",
            &format!("/api/cards/{card_id}/messages"),
            &json!({"text": "Hola, soy Marta de soporte", "agentId": "marta"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(card["lastMessage"], "Hola, soy Marta de soporte");
    assert_eq!(hub.whatsapp.sent_texts(), vec!["Hola, soy Marta de soporte"]);

    let stored = hub.ledger.get_card(&card_id).await.unwrap().unwrap();
    let last = stored.messages.last().unwrap();
    assert_eq!(last.sender, Sender::Agent(Some("marta".into())));
    assert_eq!(last.platform, Some(Platform::WhatsApp));

    let (status, _) = send(
        &hub.router,
        json_request("POST", &format!("/api/cards/{card_id}/messages"), &json!({"text": "  "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(start_paused = true)]
async fn operator_send_failure_is_bad_gateway() {
    let hub = hub().await;
    let (_, body) = send(
        &hub.router,
        signed_post("/webhooks/whatsapp", &whatsapp_text("5215500002222", "wamid.5", "Hola")),
    )
    .await;
    let card_id = body["messages"][0]["cardId"].as_str().unwrap().to_string();
    let before = hub.ledger.get_card(&card_id).await.unwrap().unwrap();

    hub.whatsapp.fail_sends(true);
    let (status, _) = send(
        &hub.router,
        json_request(
            "POST",
            &format!("/api/cards/{card_id}/messages"),
            &json!({"text": "¿Sigues ahí?"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let after = hub.ledger.get_card(&card_id).await.unwrap().unwrap();
    assert_eq!(after.messages.len(), before.messages.len());
}

#[tokio::test]
async fn api_lookups_return_not_found() {
    let hub = hub().await;
    let card = Request::builder()
        .uri("/api/cards/missing")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&hub.router, card).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not found: card missing");

    let (status, _) = send(
        &hub.router,
        json_request("PUT", "/api/bots/active", &json!({"botId": "ghost"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &hub.router,
        json_request("PUT", "/api/bots/active", &json!({"botId": "welcome"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["botId"], "welcome");
}

#[tokio::test]
async fn healthz_answers() {
    let hub = hub().await;
    let request = Request::builder().uri("/healthz").body(Body::empty()).unwrap();
    let response = hub.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
