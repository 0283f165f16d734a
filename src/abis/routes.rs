/*!
 * Proxy ABIS HTTP surface: message listener, direct request endpoints and
 * the `/abis/config` admin API
 */

use super::model::{AbisExpectation, AbisReply, ConfigureDto, INVALID_CONFIGURATION, SET_EXPECTATION};
use super::service::AbisOutcome;
use crate::error::{ApiError, ApiResult};
use crate::server::AppState;
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/abis/message", post(receive_message))
        .route("/abis/insertrequest", post(insert_request))
        .route("/abis/identifyrequest", post(identify_request))
        .route("/abis/deleterequest", delete(delete_request))
        .route(
            "/abis/config/expectation",
            post(set_expectation)
                .get(get_expectations)
                .delete(delete_expectations),
        )
        .route("/abis/config/expectation/:id", delete(delete_expectation))
        .route(
            "/abis/config/configure",
            get(get_configuration).post(configure),
        )
        .route(
            "/abis/config/cache",
            get(get_cache).delete(delete_cache),
        )
        .route("/abis/config/cache/:hash", get(get_cache_by_hash))
}

/// Listener entry point. The body is processed in the background and the
/// reply, failure or not, only ever goes to the outbound destination.
async fn receive_message(State(state): State<AppState>, body: Bytes) -> StatusCode {
    let abis = Arc::clone(&state.abis);
    tokio::spawn(async move {
        let (outcome, _) = abis.on_body(&body).await;
        info!(failed = outcome.reply.is_failure(), "ABIS message processed");
    });
    StatusCode::ACCEPTED
}

async fn insert_request(
    State(state): State<AppState>,
    Json(raw): Json<Map<String, Value>>,
) -> Json<AbisReply> {
    let outcome = state.abis.insert(&raw).await;
    reply(&state, outcome)
}

async fn identify_request(
    State(state): State<AppState>,
    Json(raw): Json<Map<String, Value>>,
) -> Json<AbisReply> {
    let outcome = state.abis.identify(&raw);
    reply(&state, outcome)
}

async fn delete_request(
    State(state): State<AppState>,
    Json(raw): Json<Map<String, Value>>,
) -> Json<AbisReply> {
    let outcome = state.abis.delete(&raw);
    reply(&state, outcome)
}

fn reply(state: &AppState, outcome: AbisOutcome) -> Json<AbisReply> {
    state.abis.deliver(&outcome);
    Json(outcome.reply)
}

async fn set_expectation(
    State(state): State<AppState>,
    payload: Result<Json<AbisExpectation>, JsonRejection>,
) -> ApiResult<String> {
    let Json(expectation) = payload.map_err(|e| ApiError::invalid(SET_EXPECTATION, e.body_text()))?;
    if expectation.id.trim().is_empty() {
        return Err(ApiError::invalid(SET_EXPECTATION, "id is required"));
    }

    info!(id = %expectation.id, "Setting expectation");
    let id = expectation.id.clone();
    state.abis.expectations().insert(expectation);
    Ok(format!("Successfully inserted expectation {id}"))
}

async fn get_expectations(State(state): State<AppState>) -> Json<BTreeMap<String, AbisExpectation>> {
    Json(state.abis.expectations().snapshot())
}

async fn delete_expectation(State(state): State<AppState>, Path(id): Path<String>) -> String {
    info!(%id, "Delete expectation");
    state.abis.expectations().delete(&id);
    format!("Successfully deleted expectation {id}")
}

async fn delete_expectations(State(state): State<AppState>) -> &'static str {
    info!("Delete all expectations");
    state.abis.expectations().clear();
    "Successfully deleted expectations"
}

async fn get_configuration(State(state): State<AppState>) -> Json<ConfigureDto> {
    Json(ConfigureDto {
        find_duplicate: Some(state.abis.find_duplicate()),
    })
}

async fn configure(
    State(state): State<AppState>,
    payload: Result<Json<ConfigureDto>, JsonRejection>,
) -> ApiResult<&'static str> {
    let Json(dto) = payload.map_err(|e| ApiError::invalid(INVALID_CONFIGURATION, e.body_text()))?;
    let find_duplicate = dto
        .find_duplicate
        .ok_or_else(|| ApiError::invalid(INVALID_CONFIGURATION, "findDuplicate is required"))?;

    state.abis.set_find_duplicate(find_duplicate);
    Ok("Successfully updated the configuration")
}

async fn get_cache(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.abis.biometrics().hashes())
}

async fn get_cache_by_hash(State(state): State<AppState>, Path(hash): Path<String>) -> Json<Vec<String>> {
    Json(state.abis.biometrics().references_with(&hash))
}

async fn delete_cache(State(state): State<AppState>) -> &'static str {
    info!("Delete cached biometrics");
    state.abis.biometrics().clear();
    "Successfully deleted cached biometrics"
}

#[cfg(test)]
mod tests {
    use crate::server::{router, tests::test_state, AppState};
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn call(app: &axum::Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    fn insert(reference_id: &str, url: &str) -> Value {
        json!({
            "id": "mosip.abis.insert",
            "version": "1.1",
            "requestId": format!("req-{reference_id}"),
            "requesttime": "2024-04-22T10:00:00.000Z",
            "referenceId": reference_id,
            "referenceURL": url
        })
    }

    #[tokio::test]
    async fn test_expectation_admin_cycle() {
        let state = test_state();
        let app = router(state);

        let expectation = json!({
            "id": "ref-1",
            "actionToInterfere": "Identify",
            "forcedResponse": "Duplicate",
            "delayInExecution": "2",
            "gallery": { "referenceIds": [{ "referenceId": "ref-2" }] }
        });
        let (status, body) = call(&app, Method::POST, "/abis/config/expectation", Some(expectation)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"Successfully inserted expectation ref-1");

        let (_, body) = call(&app, Method::GET, "/abis/config/expectation", None).await;
        let all: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(all["ref-1"]["forcedResponse"], json!("Duplicate"));

        call(&app, Method::DELETE, "/abis/config/expectation/ref-1", None).await;
        let (_, body) = call(&app, Method::GET, "/abis/config/expectation", None).await;
        assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({}));
    }

    #[tokio::test]
    async fn test_expectation_without_id_is_rejected() {
        let state = test_state();
        let app = router(state);

        let (status, body) = call(
            &app,
            Method::POST,
            "/abis/config/expectation",
            Some(json!({ "forcedResponse": "Error" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(error["code"], json!("MOS-MABIS-007"));
    }

    #[tokio::test]
    async fn test_configure_find_duplicate() {
        let state = test_state();
        let app = router(state.clone());

        let (status, _) = call(
            &app,
            Method::POST,
            "/abis/config/configure",
            Some(json!({ "findDuplicate": false })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(!state.abis.find_duplicate());

        let (_, body) = call(&app, Method::GET, "/abis/config/configure", None).await;
        assert_eq!(
            serde_json::from_slice::<Value>(&body).unwrap(),
            json!({ "findDuplicate": false })
        );

        let (status, _) = call(&app, Method::POST, "/abis/config/configure", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_direct_insert_and_cache() {
        let state = test_state();
        let app = router(state);

        let (status, body) = call(
            &app,
            Method::POST,
            "/abis/insertrequest",
            Some(insert("ref-a", "http://share/a")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let reply: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(reply["returnValue"], json!(1));

        let (_, body) = call(&app, Method::GET, "/abis/config/cache", None).await;
        let hashes: Vec<String> = serde_json::from_slice(&body).unwrap();
        assert_eq!(hashes.len(), 2);

        let (_, body) = call(&app, Method::GET, &format!("/abis/config/cache/{}", hashes[0]), None).await;
        assert_eq!(serde_json::from_slice::<Vec<String>>(&body).unwrap(), vec!["ref-a"]);

        call(&app, Method::DELETE, "/abis/config/cache", None).await;
        let (_, body) = call(&app, Method::GET, "/abis/config/cache", None).await;
        assert!(serde_json::from_slice::<Vec<String>>(&body).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_message_fails_with_reason() {
        let state = test_state();
        let app = router(state);

        let mut request = insert("ref-a", "http://share/a");
        request["version"] = json!("one");
        let (status, body) = call(&app, Method::POST, "/abis/insertrequest", Some(request)).await;
        assert_eq!(status, StatusCode::OK);

        let reply: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(reply["returnValue"], json!(2));
        assert_eq!(reply["failureReason"], json!("13"));
    }

    #[tokio::test]
    async fn test_message_reply_goes_to_queue() {
        let state = test_state();
        let app = router(state.clone());

        let (status, _) = call(
            &app,
            Method::POST,
            "/abis/message",
            Some(insert("ref-a", "http://share/a")),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);

        wait_for_queue(&state).await;

        let (status, body) = call(&app, Method::GET, "/queues/abis-to-mosip", None).await;
        assert_eq!(status, StatusCode::OK);
        let delivered: Vec<Value> = serde_json::from_slice(&body).unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0]["requestId"], json!("req-ref-a"));
    }

    #[tokio::test]
    async fn test_unparsable_message_is_queued_as_failure() {
        let state = test_state();
        let app = router(state.clone());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/abis/message")
            .header("content-type", "application/json")
            .body(Body::from("not json"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        wait_for_queue(&state).await;

        let (_, body) = call(&app, Method::GET, "/queues/abis-to-mosip", None).await;
        let delivered: Vec<Value> = serde_json::from_slice(&body).unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0]["returnValue"], json!(2));
        assert_eq!(delivered[0]["failureReason"], json!("4"));
    }

    async fn wait_for_queue(state: &AppState) {
        for _ in 0..100 {
            if state.queues.len("abis-to-mosip") > 0 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    }
}
