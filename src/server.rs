use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Form, Json, Router,
};
use std::sync::Arc;

use crate::model::{LoadedModel, PredictionService};
use crate::page;
use crate::session::{render, FormFields, Outcome, PredictorSession};
use crate::types::{CarFormInput, ErrorResponse, HealthResponse, PredictResponse};

// ---------- Server state ----------

/// Facts about the loaded model reported by `/health`.
#[derive(Debug, Clone, Default)]
pub struct ModelInfo {
    pub trees: usize,
    pub features: Vec<String>,
    pub objective: String,
}

impl From<&LoadedModel> for ModelInfo {
    fn from(m: &LoadedModel) -> Self {
        Self {
            trees: m.num_trees(),
            features: m.features().iter().map(|c| c.name().to_string()).collect(),
            objective: m.objective().to_string(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    service: Arc<dyn PredictionService>,
    info: Arc<ModelInfo>,
}

impl AppState {
    pub fn new(model: LoadedModel) -> Self {
        let info = ModelInfo::from(&model);
        Self::with_service(Arc::new(model), info)
    }

    pub fn with_service(service: Arc<dyn PredictionService>, info: ModelInfo) -> Self {
        Self {
            service,
            info: Arc::new(info),
        }
    }

    fn session(&self) -> PredictorSession {
        PredictorSession::new(Arc::clone(&self.service))
    }
}

// ---------- Handlers ----------

pub async fn index() -> Html<String> {
    let fields = FormFields::from(&CarFormInput::default());
    Html(page::render_page(&fields, None))
}

pub async fn predict_form(State(state): State<AppState>, Form(fields): Form<FormFields>) -> Html<String> {
    let outcome = state.session().submit(&fields);
    Html(page::render_page(&fields, Some(&render(&outcome))))
}

pub async fn predict_json(
    State(state): State<AppState>,
    payload: Result<Json<CarFormInput>, JsonRejection>,
) -> Result<Json<PredictResponse>, (StatusCode, Json<ErrorResponse>)> {
    // wrong types, unknown options and missing fields are invalid input too
    let Json(input) = payload.map_err(|rejection| {
        let status = if matches!(rejection, JsonRejection::JsonDataError(_)) {
            StatusCode::UNPROCESSABLE_ENTITY
        } else {
            rejection.status()
        };
        (
            status,
            Json(ErrorResponse {
                error: rejection.body_text(),
            }),
        )
    })?;
    let outcome = state.session().submit_input(&input);
    let display = render(&outcome).message;
    match outcome {
        Outcome::Estimate(price) => Ok(Json(PredictResponse {
            price: price.value(),
            display,
        })),
        Outcome::InvalidInput(e) => Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse { error: e.to_string() }),
        )),
        Outcome::PredictionFailed(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse { error: e.to_string() }),
        )),
    }
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        trees: state.info.trees,
        features: state.info.features.clone(),
        objective: state.info.objective.clone(),
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/predict", post(predict_form))
        .route("/api/predict", post(predict_json))
        .route("/health", get(health))
        .with_state(state)
}
