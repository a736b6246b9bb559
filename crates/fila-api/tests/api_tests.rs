//! Router-level tests: requests go through the full axum stack against an
//! in-memory store.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use fila_api::auth::AppStateInner;
use fila_db::Database;
use fila_db::models::{MedicationRow, PharmacyRow};

const JWT_SECRET: &str = "test-jwt-secret";
const STAFF_KEY: &str = "test-staff-key";

const CENTRO: &str = "11111111-1111-1111-1111-111111111111";
const BAIRRO: &str = "22222222-2222-2222-2222-222222222222";
const LONGE: &str = "33333333-3333-3333-3333-333333333333";
const DIPIRONA: &str = "aaaaaaaa-0000-0000-0000-000000000001";
const LOSARTANA: &str = "aaaaaaaa-0000-0000-0000-000000000002";
const INSULINA_BAIRRO: &str = "bbbbbbbb-0000-0000-0000-000000000001";

fn app() -> Router {
    let db = Database::open_in_memory().unwrap();

    for (id, name, lat, lng) in [
        (CENTRO, "Farmácia Centro", -23.5475, -46.6361),
        (BAIRRO, "Drogaria Bairro", -23.5610, -46.6560),
        (LONGE, "Farmácia Campinas", -22.9099, -47.0626),
    ] {
        db.upsert_pharmacy(&PharmacyRow {
            id: id.into(),
            name: name.into(),
            address: Some("Rua Teste, 1".into()),
            latitude: Some(lat),
            longitude: Some(lng),
        })
        .unwrap();
    }

    for (id, pharmacy_id, name) in [
        (DIPIRONA, CENTRO, "Dipirona Sódica"),
        (LOSARTANA, CENTRO, "Losartana Potássica"),
        (INSULINA_BAIRRO, BAIRRO, "Insulina NPH"),
    ] {
        db.upsert_medication(&MedicationRow {
            id: id.into(),
            pharmacy_id: pharmacy_id.into(),
            name: name.into(),
            dosage: None,
            description: None,
        })
        .unwrap();
    }

    fila_api::router(Arc::new(AppStateInner {
        db,
        jwt_secret: JWT_SECRET.into(),
        staff_key: STAFF_KEY.into(),
        default_wait_minutes: 15,
    }))
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, body)
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn post(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn delete(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

fn serve_next(pharmacy_id: &str, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(format!("/pharmacies/{}/queue/serve-next", pharmacy_id));
    if let Some(key) = key {
        builder = builder.header("x-staff-key", key);
    }
    builder.body(Body::empty()).unwrap()
}

async fn sign_in(app: &Router, cpf: &str, sus_card: &str) -> String {
    let (status, body) = send(app, post("/auth/sign-in", None, json!({ "cpf": cpf, "sus_card": sus_card }))).await;
    assert!(status.is_success(), "sign-in failed: {} {}", status, body);
    body["token"].as_str().unwrap().to_string()
}

fn two_medications() -> Value {
    json!({ "medications": [
        { "medication_id": DIPIRONA, "quantity": 2 },
        { "medication_id": LOSARTANA, "quantity": 1 },
    ]})
}

fn one_medication() -> Value {
    json!({ "medications": [{ "medication_id": DIPIRONA, "quantity": 1 }] })
}

async fn position(app: &Router, token: &str, queue_number: i64) -> i64 {
    let (status, body) = send(
        app,
        get(&format!("/pharmacies/{}/queue/status?queue_number={}", CENTRO, queue_number), Some(token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["position"].as_i64().unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let app = app();
    let (status, body) = send(&app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn sign_in_creates_then_resolves_profile() {
    let app = app();
    let req = || post("/auth/sign-in", None, json!({ "cpf": "123.456.789-01", "sus_card": "898001234567890" }));

    let (status, created) = send(&app, req()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(created["token"].as_str().is_some());

    let (status, again) = send(&app, req()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["profile"]["id"], created["profile"]["id"]);

    let token = again["token"].as_str().unwrap();
    let (status, me) = send(&app, get("/me", Some(token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], created["profile"]["id"]);
}

#[tokio::test]
async fn sign_in_rejects_wrong_card_and_bad_cpf() {
    let app = app();
    sign_in(&app, "12345678901", "111").await;

    let (status, _) = send(&app, post("/auth/sign-in", None, json!({ "cpf": "12345678901", "sus_card": "222" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, post("/auth/sign-in", None, json!({ "cpf": "1234", "sus_card": "222" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("CPF"));
}

#[tokio::test]
async fn protected_routes_need_a_token() {
    let app = app();
    let (status, _) = send(&app, post(&format!("/pharmacies/{}/check-ins", CENTRO), None, one_medication())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, get("/me/pickups", Some("not-a-jwt"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn catalog_lists_and_filters() {
    let app = app();

    let (status, all) = send(&app, get("/pharmacies", None)).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = all.as_array().unwrap().iter().map(|p| p["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Drogaria Bairro", "Farmácia Campinas", "Farmácia Centro"]);

    let (status, meds) = send(&app, get(&format!("/pharmacies/{}/medications?search=LOSART", CENTRO), None)).await;
    assert_eq!(status, StatusCode::OK);
    let meds = meds.as_array().unwrap();
    assert_eq!(meds.len(), 1);
    assert_eq!(meds[0]["id"], LOSARTANA);

    let (status, _) = send(&app, get(&format!("/pharmacies/{}/medications", uuid::Uuid::nil()), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn nearby_returns_closest_first_within_radius() {
    let app = app();
    // Praça da Sé
    let (status, body) = send(&app, get("/pharmacies/nearby?lat=-23.5503&lng=-46.6339", None)).await;
    assert_eq!(status, StatusCode::OK);

    let found = body.as_array().unwrap();
    let ids: Vec<&str> = found.iter().map(|p| p["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec![CENTRO, BAIRRO]);
    assert!(found[0]["distance_km"].as_f64().unwrap() < found[1]["distance_km"].as_f64().unwrap());

    let (status, _) = send(&app, get("/pharmacies/nearby?lat=-23.55&lng=-46.63&radius_km=0", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn queue_info_before_anyone_joins() {
    let app = app();
    let (status, body) = send(&app, get(&format!("/pharmacies/{}/queue", CENTRO), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current_number"], 0);
    assert_eq!(body["estimated_wait_minutes"], 15);
}

#[tokio::test]
async fn join_validates_selection() {
    let app = app();
    let token = sign_in(&app, "12345678901", "1").await;
    let uri = format!("/pharmacies/{}/check-ins", CENTRO);

    let (status, _) = send(&app, post(&uri, Some(&token), json!({ "medications": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let zero = json!({ "medications": [{ "medication_id": DIPIRONA, "quantity": 0 }] });
    let (status, _) = send(&app, post(&uri, Some(&token), zero)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Stocked by another pharmacy.
    let foreign = json!({ "medications": [{ "medication_id": INSULINA_BAIRRO, "quantity": 1 }] });
    let (status, _) = send(&app, post(&uri, Some(&token), foreign)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing = format!("/pharmacies/{}/check-ins", uuid::Uuid::nil());
    let (status, _) = send(&app, post(&missing, Some(&token), one_medication())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Nothing above may have consumed a number.
    let (_, info) = send(&app, get(&format!("/pharmacies/{}/queue", CENTRO), None)).await;
    assert_eq!(info["current_number"], 0);
}

#[tokio::test]
async fn join_with_token_for_missing_profile_is_unauthorized() {
    let app = app();
    let token = fila_api::auth::create_token(JWT_SECRET, uuid::Uuid::new_v4()).unwrap();
    let uri = format!("/pharmacies/{}/check-ins", CENTRO);

    let (status, _) = send(&app, post(&uri, Some(&token), one_medication())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, info) = send(&app, get(&format!("/pharmacies/{}/queue", CENTRO), None)).await;
    assert_eq!(info["current_number"], 0);
}

#[tokio::test]
async fn join_poll_leave_flow() {
    let app = app();
    let alice = sign_in(&app, "11111111111", "1").await;
    let bob = sign_in(&app, "22222222222", "2").await;
    let uri = format!("/pharmacies/{}/check-ins", CENTRO);

    let (status, a) = send(&app, post(&uri, Some(&alice), two_medications())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(a["queue_number"], 1);

    let (status, b) = send(&app, post(&uri, Some(&bob), one_medication())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(b["queue_number"], 2);

    // Retried join returns the held ticket.
    let (status, again) = send(&app, post(&uri, Some(&alice), one_medication())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["queue_number"], 1);

    assert_eq!(position(&app, &bob, 2).await, 1);

    let (status, _) = send(&app, delete(&format!("/pharmacies/{}/check-ins/1", CENTRO), &alice)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, delete(&format!("/pharmacies/{}/check-ins/1", CENTRO), &alice)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert_eq!(position(&app, &bob, 2).await, 0);

    let (_, status_body) = send(
        &app,
        get(&format!("/pharmacies/{}/queue/status?queue_number=1", CENTRO), Some(&bob)),
    )
    .await;
    assert_eq!(status_body["ticket_status"], Value::Null);
    assert_eq!(status_body["current_number"], 2);
}

#[tokio::test]
async fn serve_next_needs_staff_key_and_records_history() {
    let app = app();
    let alice = sign_in(&app, "11111111111", "1").await;
    send(&app, post(&format!("/pharmacies/{}/check-ins", CENTRO), Some(&alice), two_medications())).await;

    let (status, _) = send(&app, serve_next(CENTRO, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app, serve_next(CENTRO, Some("wrong"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, served) = send(&app, serve_next(CENTRO, Some(STAFF_KEY))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(served["queue_number"], 1);
    assert_eq!(served["status"], "served");

    let (status, _) = send(&app, serve_next(CENTRO, Some(STAFF_KEY))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, ticket) = send(
        &app,
        get(&format!("/pharmacies/{}/queue/status?queue_number=1", CENTRO), Some(&alice)),
    )
    .await;
    assert_eq!(ticket["ticket_status"], "served");

    let (status, history) = send(&app, get("/me/pickups", Some(&alice))).await;
    assert_eq!(status, StatusCode::OK);
    let mut meds: Vec<(String, i64)> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|p| (p["medication"].as_str().unwrap().to_string(), p["quantity"].as_i64().unwrap()))
        .collect();
    meds.sort();
    assert_eq!(
        meds,
        vec![("Dipirona Sódica".to_string(), 2), ("Losartana Potássica".to_string(), 1)]
    );
}
