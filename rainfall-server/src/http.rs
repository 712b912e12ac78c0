//! HTTP surface: `POST /predict` and a liveness probe.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use rainfall_core::{
    FieldError, FieldErrorKind, InferenceError, PredictError, PredictionResponse,
    PredictionService, ValidationError,
};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

pub fn build_app(service: Arc<PredictionService>) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// POST /predict
///
/// The body is taken raw so that malformed JSON, missing fields and range
/// violations all come back as one 422 listing every offending field.
async fn predict(
    State(service): State<Arc<PredictionService>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<PredictionResponse>, ApiError> {
    if !is_json_content_type(&headers) {
        let input = Value::String(String::from_utf8_lossy(&body).into_owned());
        let err = FieldError::new(FieldErrorKind::NotAnObject, vec!["body".into()], input);
        return Err(ApiError::Validation(ValidationError::single(err)));
    }

    let prediction = service.predict_body(&body)?;
    Ok(Json(prediction.into()))
}

/// No header counts as JSON; otherwise `application/json` or `application/*+json`.
fn is_json_content_type(headers: &HeaderMap) -> bool {
    let Some(value) = headers.get(CONTENT_TYPE) else {
        return true;
    };
    let Ok(value) = value.to_str() else {
        return false;
    };

    let mime = value.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    match mime.split_once('/') {
        Some(("application", "json")) => true,
        Some(("application", subtype)) => subtype.ends_with("+json"),
        _ => false,
    }
}

/// GET /health
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug)]
pub enum ApiError {
    Validation(ValidationError),
    Inference(InferenceError),
}

impl From<PredictError> for ApiError {
    fn from(err: PredictError) -> Self {
        match err {
            PredictError::Validation(e) => ApiError::Validation(e),
            PredictError::Inference(e) => ApiError::Inference(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(err) => {
                (StatusCode::UNPROCESSABLE_ENTITY, Json(err.to_detail())).into_response()
            }
            ApiError::Inference(err) => {
                tracing::error!(error = %err, "classifier call failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, extract::Request};
    use rainfall_core::{Classifier, ClassifierKind, FeatureVector};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    #[derive(Debug)]
    struct FixedClassifier {
        outcome: Result<i64, InferenceError>,
        calls: AtomicUsize,
    }

    impl Classifier for FixedClassifier {
        fn kind(&self) -> ClassifierKind {
            ClassifierKind::RandomForest
        }

        fn predict_one(&self, _features: &FeatureVector) -> Result<i64, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    fn app_with(outcome: Result<i64, InferenceError>) -> (Router, Arc<FixedClassifier>) {
        let classifier = Arc::new(FixedClassifier {
            outcome,
            calls: AtomicUsize::new(0),
        });
        let service = PredictionService::new(classifier.clone());
        (build_app(Arc::new(service)), classifier)
    }

    fn sample() -> Value {
        json!({
            "pressure": 1015,
            "temparature": 25,
            "humidity": 60,
            "cloud": 40,
            "sunshine": 5,
            "winddirection": 180,
            "windspeed": 10,
            "max_temp": 30,
            "min_temp": 20
        })
    }

    fn post_predict(body: impl Into<Body>) -> Request {
        Request::builder()
            .method("POST")
            .uri("/predict")
            .header(CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap()
    }

    async fn read_json(resp: Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn class_one_returns_rain() {
        let (app, classifier) = app_with(Ok(1));

        let resp = app.oneshot(post_predict(sample().to_string())).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(read_json(resp).await, json!({ "prediction": "Rain" }));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn other_classes_return_no_rain() {
        for class in [0, 2] {
            let (app, _) = app_with(Ok(class));

            let resp = app.oneshot(post_predict(sample().to_string())).await.unwrap();

            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(read_json(resp).await, json!({ "prediction": "No Rain" }));
        }
    }

    #[tokio::test]
    async fn validation_failure_is_422_listing_fields() {
        let (app, classifier) = app_with(Ok(1));

        let mut body = sample();
        body["humidity"] = json!(100.0001);
        body["pressure"] = json!(0);
        body.as_object_mut().unwrap().remove("max_temp");

        let resp = app.oneshot(post_predict(body.to_string())).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let detail = read_json(resp).await;
        let locs: Vec<&str> = detail["detail"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["loc"][1].as_str().unwrap())
            .collect();
        assert_eq!(locs, vec!["pressure", "humidity", "max_temp"]);
        assert_eq!(detail["detail"][0]["type"], "greater_than");
        assert_eq!(detail["detail"][1]["type"], "less_than_equal");
        assert_eq!(detail["detail"][2]["type"], "missing");

        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_json_is_422() {
        let (app, classifier) = app_with(Ok(1));

        let resp = app.oneshot(post_predict("{\"pressure\": ")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(read_json(resp).await["detail"][0]["type"], "json_invalid");
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_body_is_422() {
        let (app, _) = app_with(Ok(1));

        let resp = app.oneshot(post_predict(Body::empty())).await.unwrap();

        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            read_json(resp).await["detail"][0]["loc"],
            json!(["body"])
        );
    }

    #[tokio::test]
    async fn numeric_strings_are_accepted() {
        let (app, classifier) = app_with(Ok(1));

        let mut body = sample();
        body["pressure"] = json!("1015");
        body["humidity"] = json!("60");

        let resp = app.oneshot(post_predict(body.to_string())).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_json_content_type_is_422() {
        let (app, classifier) = app_with(Ok(1));

        let req = Request::builder()
            .method("POST")
            .uri("/predict")
            .header(CONTENT_TYPE, "text/plain")
            .body(Body::from(sample().to_string()))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let detail = read_json(resp).await;
        assert_eq!(detail["detail"][0]["type"], "model_attributes_type");
        assert_eq!(detail["detail"][0]["loc"], json!(["body"]));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn json_suffix_and_missing_content_type_are_accepted() {
        let content_types = [
            Some("application/vnd.api+json; charset=utf-8"),
            Some("Application/JSON"),
            None,
        ];
        for content_type in content_types {
            let (app, classifier) = app_with(Ok(0));

            let mut req = Request::builder().method("POST").uri("/predict");
            if let Some(content_type) = content_type {
                req = req.header(CONTENT_TYPE, content_type);
            }
            let resp = app
                .oneshot(req.body(Body::from(sample().to_string())).unwrap())
                .await
                .unwrap();

            assert_eq!(resp.status(), StatusCode::OK, "{content_type:?}");
            assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn inference_failure_is_500() {
        let (app, classifier) = app_with(Err(InferenceError::NonFinite));

        let resp = app.oneshot(post_predict(sample().to_string())).await.unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn predict_rejects_get() {
        let (app, _) = app_with(Ok(1));

        let req = Request::builder()
            .uri("/predict")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (app, _) = app_with(Ok(0));

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(read_json(resp).await, json!({ "status": "ok" }));
    }
}
