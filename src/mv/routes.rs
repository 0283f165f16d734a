/*!
 * Mock MV HTTP surface
 * `/mv/request` and the `/mv/config` admin API
 */

use super::model::{ConfigureMvDto, MvExpectation, CONFIGURE, SET_EXPECTATION};
use crate::error::{ApiError, ApiResult};
use crate::server::AppState;
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::collections::BTreeMap;
use tracing::info;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/mv/request", post(submit_request))
        .route(
            "/mv/config/configureMockMv",
            get(get_configuration).post(configure),
        )
        .route(
            "/mv/config/expectationMockMv",
            get(get_expectations)
                .post(set_expectation)
                .delete(delete_expectations),
        )
        .route(
            "/mv/config/expectationMockMv/:rid",
            get(get_expectation).delete(delete_expectation),
        )
}

/// Acknowledges immediately; envelope and body errors come back as a 200
/// error body.
async fn submit_request(State(state): State<AppState>, body: Bytes) -> Response {
    match state.mv.submit_body(&body) {
        Ok((ack, _)) => Json(ack).into_response(),
        Err(error) => Json(error).into_response(),
    }
}

async fn get_configuration(State(state): State<AppState>) -> Json<ConfigureMvDto> {
    Json(ConfigureMvDto {
        mock_mv_decision: Some(state.mv.default_decision()),
    })
}

async fn configure(
    State(state): State<AppState>,
    payload: Result<Json<ConfigureMvDto>, JsonRejection>,
) -> ApiResult<&'static str> {
    let Json(dto) = payload.map_err(|e| ApiError::invalid(CONFIGURE, e.body_text()))?;
    let decision = dto
        .mock_mv_decision
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| ApiError::invalid(CONFIGURE, "mockMvDescision is required"))?;

    state.mv.set_default_decision(decision);
    Ok("Successfully updated the configuration")
}

async fn set_expectation(
    State(state): State<AppState>,
    payload: Result<Json<MvExpectation>, JsonRejection>,
) -> ApiResult<String> {
    let Json(expectation) = payload.map_err(|e| ApiError::invalid(SET_EXPECTATION, e.body_text()))?;
    if expectation.rid.trim().is_empty() {
        return Err(ApiError::invalid(SET_EXPECTATION, "rid is required"));
    }

    info!(rid = %expectation.rid, "Setting MV expectation");
    let rid = expectation.rid.clone();
    state.mv.expectations().insert(expectation);
    Ok(format!("Successfully inserted expectation {rid}"))
}

async fn get_expectations(State(state): State<AppState>) -> Json<BTreeMap<String, MvExpectation>> {
    Json(state.mv.expectations().snapshot())
}

async fn get_expectation(State(state): State<AppState>, Path(rid): Path<String>) -> Response {
    match state.mv.expectations().lookup(&rid) {
        Some(expectation) => Json(expectation).into_response(),
        None => format!("No expectation set for given rid:{rid}").into_response(),
    }
}

async fn delete_expectation(State(state): State<AppState>, Path(rid): Path<String>) -> String {
    info!(%rid, "Delete MV expectation");
    state.mv.expectations().delete(&rid);
    format!("Successfully deleted expectation {rid}")
}

async fn delete_expectations(State(state): State<AppState>) -> &'static str {
    state.mv.expectations().clear();
    "Successfully deleted expectations"
}
