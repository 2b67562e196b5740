use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::warn;
use crate::appmax::{AppmaxApi, Payload, PaymentMethod};
use crate::checkout_link::CheckoutLinkResolver;
use crate::error::GatewayError;
use crate::handlers::OrderGateway;
use crate::models::*;
use crate::places::{PlacesClient, PlacesError};
use crate::store::TransactionStore;
use crate::webhook::WebhookReconciler;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<TransactionStore>,
    pub appmax: Arc<dyn AppmaxApi>,
    pub places: Arc<PlacesClient>,
    pub links: Arc<CheckoutLinkResolver>,
}

impl AppState {
    fn gateway(&self) -> OrderGateway {
        OrderGateway::new(self.appmax.clone(), self.store.clone(), self.links.clone())
    }
}

pub fn create_router(state: AppState, static_dir: Option<PathBuf>) -> Router {
    let router = Router::new()
        .route("/health", get(health_check))
        .route("/api/places", get(search_places))
        .route("/api/appmax/customer", post(create_customer))
        .route("/api/appmax/order", post(create_order))
        .route("/api/appmax/order/:order_id", get(get_order))
        .route("/api/appmax/order/:order_id/checkout-link", get(get_checkout_link))
        .route("/api/appmax/payment/credit-card", post(pay_with_credit_card))
        .route("/api/appmax/payment/pix", post(pay_with_pix))
        .route("/api/appmax/payment/boleto", post(pay_with_boleto))
        .route("/api/appmax/webhook", post(receive_webhook))
        .with_state(state);

    // Built landing page, with index.html as the SPA fallback.
    let router = match static_dir {
        Some(dir) => {
            let index = dir.join("index.html");
            router.fallback_service(ServeDir::new(dir).not_found_service(ServeFile::new(index)))
        }
        None => router,
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

pub async fn health_check() -> &'static str {
    "OK"
}

pub async fn search_places(
    State(state): State<AppState>,
    Query(params): Query<PlacesQuery>,
) -> Result<Json<Value>, PlacesError> {
    let query = params.query.unwrap_or_default();
    Ok(Json(state.places.text_search(&query).await?))
}

pub async fn create_customer(
    State(state): State<AppState>,
    body: Result<Json<Payload>, JsonRejection>,
) -> Result<Json<Value>, GatewayError> {
    let Json(payload) = body?;
    Ok(Json(state.appmax.create_customer(payload).await?))
}

pub async fn create_order(
    State(state): State<AppState>,
    body: Result<Json<OrderRequest>, JsonRejection>,
) -> Result<Json<OrderResponse>, GatewayError> {
    let Json(request) = body?;
    let placed = state.gateway().place_order(request).await?;
    tracing::info!("Order flow finished for transaction {}", placed.transaction_id);

    Ok(Json(OrderResponse {
        success: true,
        checkout_url: placed.checkout_url,
        order_id: placed.order_id,
        customer_id: placed.customer_id,
    }))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<u64>,
) -> Result<Json<Value>, GatewayError> {
    Ok(Json(state.gateway().fetch_order(order_id).await?))
}

pub async fn get_checkout_link(
    State(state): State<AppState>,
    Path(order_id): Path<u64>,
) -> Result<Json<CheckoutLinkResponse>, GatewayError> {
    let checkout_url = state.gateway().checkout_link(order_id).await?;
    Ok(Json(CheckoutLinkResponse { checkout_url }))
}

async fn pay(
    state: &AppState,
    method: PaymentMethod,
    body: Result<Json<Payload>, JsonRejection>,
) -> Result<Json<Value>, GatewayError> {
    let Json(payload) = body?;
    Ok(Json(state.appmax.create_payment(method, payload).await?))
}

pub async fn pay_with_credit_card(
    State(state): State<AppState>,
    body: Result<Json<Payload>, JsonRejection>,
) -> Result<Json<Value>, GatewayError> {
    pay(&state, PaymentMethod::CreditCard, body).await
}

pub async fn pay_with_pix(
    State(state): State<AppState>,
    body: Result<Json<Payload>, JsonRejection>,
) -> Result<Json<Value>, GatewayError> {
    pay(&state, PaymentMethod::Pix, body).await
}

pub async fn pay_with_boleto(
    State(state): State<AppState>,
    body: Result<Json<Payload>, JsonRejection>,
) -> Result<Json<Value>, GatewayError> {
    pay(&state, PaymentMethod::Boleto, body).await
}

/// Always acknowledged with 200; the provider redelivers anything else.
pub async fn receive_webhook(State(state): State<AppState>, body: Bytes) -> (StatusCode, Json<Value>) {
    match serde_json::from_slice::<Value>(&body) {
        Ok(payload) => {
            let outcome = WebhookReconciler::new(state.store.clone()).reconcile(&payload).await;
            tracing::debug!("Webhook processed: {:?}", outcome);
        }
        Err(e) => warn!("Discarding unparseable webhook body ({} bytes): {}", body.len(), e),
    }

    (StatusCode::OK, Json(json!({ "received": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::places::TEXT_SEARCH_URL;
    use crate::testing::FakeAppmax;
    use axum::body::Body;
    use axum::http::Request;
    use reqwest::Url;
    use shared::TransactionStatus;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct TestApp {
        _dir: TempDir,
        store: Arc<TransactionStore>,
        appmax: Arc<FakeAppmax>,
        router: Router,
    }

    impl TestApp {
        fn new(appmax: FakeAppmax) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let store = Arc::new(TransactionStore::new(dir.path().join("db.json")));
            let appmax = Arc::new(appmax);
            let state = AppState {
                store: store.clone(),
                appmax: appmax.clone(),
                places: Arc::new(PlacesClient::new(reqwest::Client::new(), None, TEXT_SEARCH_URL)),
                links: Arc::new(CheckoutLinkResolver::new(
                    Url::parse("https://pay.example.com/checkout/bundle").unwrap(),
                )),
            };

            Self {
                _dir: dir,
                store,
                appmax,
                router: create_router(state, None),
            }
        }

        async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
            let request = Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
                .unwrap();

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, json)
        }
    }

    fn order_body(sku: &str) -> Value {
        json!({
            "nome": "Ana Paula Souza",
            "email": "ana@example.com",
            "cpf": "123.456.789-09",
            "telefone": "11999999999",
            "endereco": { "rua": "Rua A", "numero": "10", "complemento": "", "bairro": "Centro", "cidade": "São Paulo", "estado": "SP", "cep": "01000-000" },
            "sku": sku,
            "loja_pesquisada": { "nome": "Padaria Central", "endereco": "Rua B, 20" }
        })
    }

    #[tokio::test]
    async fn health_check_responds() {
        let app = TestApp::new(FakeAppmax::default());
        let response = app
            .router
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn order_submission_returns_checkout_details() {
        let app = TestApp::new(FakeAppmax::default());

        let (status, body) = app.send("POST", "/api/appmax/order", Some(order_body("SLENO-STARTER"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["order_id"], 654);
        assert_eq!(body["customer_id"], 321);
        assert_eq!(body["checkout_url"], "https://pay.example.com/checkout/bundle/1?customer_hash=hash-321");

        let records = app.store.list_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].user.address.street, "Rua A");
        assert_eq!(records[0].user.loja_pesquisada.as_ref().unwrap().name, "Padaria Central");
    }

    #[tokio::test]
    async fn order_without_store_is_rejected() {
        let app = TestApp::new(FakeAppmax::default());
        let mut body = order_body("SLENO-STARTER");
        body["loja_pesquisada"] = json!({ "nome": "" });

        let (status, body) = app.send("POST", "/api/appmax/order", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "MissingStoreSelectionError");
        assert!(app.store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn order_accepts_free_text_address() {
        let app = TestApp::new(FakeAppmax::default());
        let mut body = order_body("SLENO-STARTER");
        body["endereco"] = json!("Rua A, 10, Centro, São Paulo, SP, 01000-000");

        let (status, body) = app.send("POST", "/api/appmax/order", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let records = app.store.list_all().await.unwrap();
        assert_eq!(records[0].user.address.street, "Rua A, 10, Centro, São Paulo, SP, 01000-000");
    }

    #[tokio::test]
    async fn malformed_order_body_is_json_bad_request() {
        let app = TestApp::new(FakeAppmax::default());
        let mut body = order_body("SLENO-STARTER");
        body["additional_cards"] = json!("many");

        let (status, body) = app.send("POST", "/api/appmax/order", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "InvalidRequestBodyError");
        assert!(body["error"].as_str().unwrap().contains("additional_cards"));
        assert_eq!(app.appmax.order_calls(), 0);
        assert!(app.store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn order_with_unknown_sku_is_rejected() {
        let app = TestApp::new(FakeAppmax::default());

        let (status, body) = app.send("POST", "/api/appmax/order", Some(order_body("SLENO-GOLD"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "InvalidSkuError");
        assert!(app.store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn provider_error_body_is_forwarded() {
        let app = TestApp::new(FakeAppmax {
            customer_rejection: Some(json!({ "text": "Invalid email" })),
            ..FakeAppmax::default()
        });

        let (status, body) = app.send("POST", "/api/appmax/order", Some(order_body("SLENO-STARTER"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!({ "text": "Invalid email" }));
        assert_eq!(body["code"], "RemoteCustomerCreationError");
    }

    #[tokio::test]
    async fn provisional_order_is_linked_by_webhooks() {
        let app = TestApp::new(FakeAppmax {
            order: json!({ "success": true, "data": { "customer_id": 321 } }),
            ..FakeAppmax::default()
        });

        let (status, body) = app.send("POST", "/api/appmax/order", Some(order_body("SLENO-NEGOCIO"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["order_id"], Value::Null);

        let pending = json!({ "event": "OrderPixCreated", "data": { "id": 900, "customer": { "email": "ana@example.com" } } });
        let (status, _) = app.send("POST", "/api/appmax/webhook", Some(pending)).await;
        assert_eq!(status, StatusCode::OK);

        let linked = app.store.find_by_order_id(900).await.unwrap().unwrap();
        assert_eq!(linked.status, TransactionStatus::PaymentPending);

        let paid = json!({ "event": "OrderPaid", "data": { "id": 900, "customer": { "email": "ana@example.com" } } });
        app.send("POST", "/api/appmax/webhook", Some(paid)).await;

        let records = app.store.list_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].order_id, Some(900));
        assert_eq!(records[0].status, TransactionStatus::Completed);
    }

    #[tokio::test]
    async fn webhook_is_acknowledged_whatever_happens() {
        let app = TestApp::new(FakeAppmax::default());

        let unmatched = json!({ "event": "OrderPaid", "data": { "id": 1, "customer": { "email": "ghost@example.com" } } });
        let (status, body) = app.send("POST", "/api/appmax/webhook", Some(unmatched)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["received"], true);
        assert!(app.store.list_all().await.unwrap().is_empty());

        let request = Request::builder()
            .method("POST")
            .uri("/api/appmax/webhook")
            .body(Body::from("event=OrderPaid"))
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn payments_are_passed_through() {
        let app = TestApp::new(FakeAppmax::default());

        let (status, body) = app
            .send("POST", "/api/appmax/payment/pix", Some(json!({ "cart": { "order_id": 654 }, "customer": { "customer_id": 321 }, "payment": { "pix": { "document_number": "12345678909" } } })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["pix_qrcode"], "000201");

        let calls = app.appmax.payment_calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, PaymentMethod::Pix);
    }

    #[tokio::test]
    async fn checkout_link_endpoint_resolves_link() {
        let app = TestApp::new(FakeAppmax {
            fetched_order: json!({ "data": { "id": 654, "bundles": [{ "link_to_checkout": "https://pay.example.com/c/654" }] } }),
            ..FakeAppmax::default()
        });

        let (status, body) = app.send("GET", "/api/appmax/order/654/checkout-link", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "checkout_url": "https://pay.example.com/c/654" }));

        let (status, body) = app.send("GET", "/api/appmax/order/654", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["id"], 654);
    }

    #[tokio::test]
    async fn places_without_key_is_bad_request() {
        let app = TestApp::new(FakeAppmax::default());

        let (status, body) = app.send("GET", "/api/places?query=padaria", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Missing query or API key" }));
    }
}
