#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, header},
};
use chrono::{Duration, NaiveDate};
use futures::future::BoxFuture;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use stockcast::auth::session::session_key;
use stockcast::forecast::PipelineConfig;
use stockcast::forecast::model::{Activation, LayerSpec, ModelFile};
use stockcast::market::{HistoryQuery, MarketData, PriceBar, PriceHistory};
use stockcast::router::{StockcastState, stockcast_router};
use stockcast::StockError;

/// Serves a fixed series for any ticker except `EMPTY`, which has no rows.
pub struct FakeMarket {
    pub bars: Vec<PriceBar>,
}

impl MarketData for FakeMarket {
    fn history<'a>(
        &'a self,
        query: &'a HistoryQuery,
    ) -> BoxFuture<'a, Result<PriceHistory, StockError>> {
        let bars = if query.ticker == "EMPTY" {
            Vec::new()
        } else {
            self.bars.clone()
        };
        Box::pin(async move {
            Ok(PriceHistory {
                ticker: query.ticker.clone(),
                bars,
            })
        })
    }
}

/// Provider whose upstream always answers 503, as after exhausted retries.
pub struct FailingMarket;

impl MarketData for FailingMarket {
    fn history<'a>(
        &'a self,
        _query: &'a HistoryQuery,
    ) -> BoxFuture<'a, Result<PriceHistory, StockError>> {
        Box::pin(async {
            Err(StockError::UpstreamStatus(
                axum::http::StatusCode::SERVICE_UNAVAILABLE,
            ))
        })
    }
}

pub fn linear_bars(n: usize) -> Vec<PriceBar> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    (0..n)
        .map(|i| PriceBar::flat(start + Duration::days(i as i64), 100.0 + i as f64))
        .collect()
}

/// LSTM whose output is always the dense bias, so predictions are easy to check.
pub fn write_constant_model(dir: &Path, bias: f32) -> std::path::PathBuf {
    let file = ModelFile {
        name: Some("constant".into()),
        layers: vec![
            LayerSpec::Lstm {
                units: 2,
                activation: Activation::Tanh,
                recurrent_activation: Activation::Sigmoid,
                return_sequences: false,
                kernel: vec![vec![0.0; 8]],
                recurrent_kernel: vec![vec![0.0; 8]; 2],
                bias: vec![0.0; 8],
            },
            LayerSpec::Dropout { rate: 0.3 },
            LayerSpec::Dense {
                units: 1,
                activation: Activation::Linear,
                kernel: vec![vec![1.0], vec![1.0]],
                bias: vec![bias],
            },
        ],
    };
    let path = dir.join("model.json");
    std::fs::write(&path, serde_json::to_vec(&file).unwrap()).unwrap();
    path
}

pub struct TestApp {
    pub app: Router,
    pub dir: TempDir,
}

pub async fn spawn_app(bars: Vec<PriceBar>, pipeline: PipelineConfig) -> TestApp {
    spawn_app_with(Arc::new(FakeMarket { bars }), pipeline).await
}

pub async fn spawn_app_with(market: Arc<dyn MarketData>, pipeline: PipelineConfig) -> TestApp {
    let dir = tempfile::tempdir().expect("tempdir");
    let database_url = format!("sqlite:{}", dir.path().join("users.db").display());
    let users = stockcast::db::connect(&database_url)
        .await
        .expect("open users db");
    let model_path = write_constant_model(dir.path(), 0.5);
    let predictor = stockcast::forecast::actor::spawn(model_path)
        .await
        .expect("spawn predictor");

    let state = StockcastState::new(
        users,
        market,
        predictor,
        session_key("integration-test-secret"),
    )
    .with_pipeline(pipeline)
    .with_password_iterations(1_000)
    .with_insecure_cookie(true);

    TestApp {
        app: stockcast_router(state),
        dir,
    }
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(req).await.expect("request failed")
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(c) = cookie {
            builder = builder.header(header::COOKIE, c);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_form(&self, uri: &str, form: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(&self, uri: &str, json: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Sign up and log in; returns the `Cookie` header value for the session.
    pub async fn login_as(&self, username: &str, password: &str) -> String {
        let resp = self
            .post_form(
                "/signup",
                &format!("username={username}&password={password}&mobile=5550100"),
            )
            .await;
        assert!(resp.status().is_redirection(), "signup failed");

        let resp = self
            .post_form(
                "/login",
                &format!("username={username}&password={password}"),
            )
            .await;
        assert!(resp.status().is_redirection(), "login failed");
        session_cookie(&resp).expect("login sets a session cookie")
    }
}

pub fn location(resp: &Response<Body>) -> Option<&str> {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
}

pub fn session_cookie(resp: &Response<Body>) -> Option<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("session="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

pub async fn body_text(resp: Response<Body>) -> String {
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    String::from_utf8(bytes.to_vec()).expect("response body was not utf-8")
}

pub async fn body_json(resp: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_text(resp).await).expect("response body was not json")
}
