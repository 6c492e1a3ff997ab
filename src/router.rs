use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post},
};
use axum_extra::extract::cookie::Key;

use crate::auth::DEFAULT_ITERATIONS;
use crate::db::UserStorage;
use crate::forecast::{PipelineConfig, PredictorHandle};
use crate::handlers::{auth, fetch, pages};
use crate::market::MarketData;

const BODY_LIMIT: usize = 64 * 1024;

#[derive(Clone)]
pub struct StockcastState {
    pub users: UserStorage,
    pub market: Arc<dyn MarketData>,
    pub predictor: PredictorHandle,
    pub pipeline: PipelineConfig,
    pub password_iterations: u32,
    pub secure_cookie: bool,
    cookie_key: Key,
}

impl StockcastState {
    pub fn new(
        users: UserStorage,
        market: Arc<dyn MarketData>,
        predictor: PredictorHandle,
        cookie_key: Key,
    ) -> Self {
        Self {
            users,
            market,
            predictor,
            pipeline: PipelineConfig::default(),
            password_iterations: DEFAULT_ITERATIONS,
            secure_cookie: true,
            cookie_key,
        }
    }

    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_password_iterations(mut self, iterations: u32) -> Self {
        self.password_iterations = iterations;
        self
    }

    pub fn with_insecure_cookie(mut self, insecure: bool) -> Self {
        self.secure_cookie = !insecure;
        self
    }
}

impl FromRef<StockcastState> for Key {
    fn from_ref(state: &StockcastState) -> Self {
        state.cookie_key.clone()
    }
}

pub fn stockcast_router(state: StockcastState) -> Router {
    Router::new()
        .route("/", get(pages::home))
        .route("/dashboard", get(pages::dashboard))
        .route("/prediction", get(pages::prediction))
        .route("/learning", get(pages::learning))
        .route("/signup", get(auth::signup_form).post(auth::signup))
        .route("/login", get(auth::login_form).post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/fetch-data", post(fetch::fetch_data))
        .route("/healthz", get(|| async { "ok" }))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(state)
}
