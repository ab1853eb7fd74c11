use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use anyhow::Context;
use axum::{
    Form, Json, Router,
    extract::{Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Local;
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;

use diatrack_core::export::{
    self, REPORT_FILENAME, REPORT_MIME, REPORT_READING_LIMIT, WORKBOOK_FILENAME, WORKBOOK_MIME,
};
use diatrack_core::models::{
    NewFoodEntry, NewReading, ReadingKind, User, non_empty, parse_timestamp,
};
use diatrack_core::service::{DiatrackService, Overview};

const BODY_LIMIT: usize = 64 * 1024; // 64 KB, forms only

const CONTENT_SECURITY_POLICY: &str =
    "default-src 'none'; img-src data:; style-src 'unsafe-inline'";

#[derive(Clone)]
struct AppState {
    svc: Arc<Mutex<DiatrackService>>,
    user_id: i64,
}

impl AppState {
    fn svc(&self) -> MutexGuard<'_, DiatrackService> {
        self.svc.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// --- Request / Response types ---

/// Every field is optional so missing input surfaces as a 400 with a
/// message instead of an extractor rejection.
#[derive(Deserialize)]
struct AddReadingForm {
    value: Option<String>,
    kind: Option<String>,
    note: Option<String>,
    measured_at: Option<String>,
}

#[derive(Deserialize)]
struct AddFoodForm {
    name: Option<String>,
    calories: Option<String>,
    gi: Option<String>,
    logged_at: Option<String>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    app: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    BadRequest(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(err) => {
                log::error!("internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

fn bad_request(err: impl std::fmt::Display) -> ApiError {
    ApiError::BadRequest(err.to_string())
}

// --- Middleware ---

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(request).await;
    log::info!(
        "{method} {path} {} {}ms",
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static(CONTENT_SECURITY_POLICY),
    );
    response
}

// --- Form parsing ---

fn parse_optional_int(field: &str, value: Option<String>) -> Result<Option<i64>, ApiError> {
    non_empty(value)
        .map(|v| {
            v.parse::<i64>()
                .map_err(|_| bad_request(format!("Invalid {field} '{v}'. Must be a whole number")))
        })
        .transpose()
}

fn parse_optional_timestamp(
    value: Option<String>,
) -> Result<Option<chrono::NaiveDateTime>, ApiError> {
    non_empty(value)
        .map(|v| parse_timestamp(&v).map_err(bad_request))
        .transpose()
}

fn parse_reading_form(user_id: i64, form: AddReadingForm) -> Result<NewReading, ApiError> {
    let raw_value = non_empty(form.value).ok_or_else(|| bad_request("value is required"))?;
    let value = raw_value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| bad_request(format!("Invalid value '{raw_value}'. Must be a number")))?;

    let kind = non_empty(form.kind)
        .ok_or_else(|| bad_request("kind is required"))?
        .parse::<ReadingKind>()
        .map_err(bad_request)?;

    Ok(NewReading {
        user_id,
        value,
        kind,
        note: non_empty(form.note),
        measured_at: parse_optional_timestamp(form.measured_at)?,
    })
}

fn parse_food_form(user_id: i64, form: AddFoodForm) -> Result<NewFoodEntry, ApiError> {
    let name = non_empty(form.name).ok_or_else(|| bad_request("name is required"))?;
    Ok(NewFoodEntry {
        user_id,
        name,
        calories: parse_optional_int("calories", form.calories)?,
        glycemic_index: parse_optional_int("gi", form.gi)?,
        logged_at: parse_optional_timestamp(form.logged_at)?,
    })
}

// --- Handlers ---

async fn index(State(state): State<AppState>) -> Result<Json<Overview>, ApiError> {
    let overview = state
        .svc()
        .overview(state.user_id)
        .context("failed to load overview")?;
    Ok(Json(overview))
}

async fn add_reading(
    State(state): State<AppState>,
    Form(form): Form<AddReadingForm>,
) -> Result<Redirect, ApiError> {
    let reading = parse_reading_form(state.user_id, form)?;
    state
        .svc()
        .log_reading(&reading)
        .context("failed to insert reading")?;
    Ok(Redirect::to("/"))
}

async fn add_food(
    State(state): State<AppState>,
    Form(form): Form<AddFoodForm>,
) -> Result<Redirect, ApiError> {
    let food = parse_food_form(state.user_id, form)?;
    state
        .svc()
        .log_food(&food)
        .context("failed to insert food entry")?;
    Ok(Redirect::to("/"))
}

async fn dashboard(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let (user, readings) = {
        let svc = state.svc();
        (
            svc.get_user(state.user_id)?,
            svc.readings_ascending(state.user_id)?,
        )
    };
    let png = export::render_reading_chart(&readings).context("failed to render chart")?;
    Ok(Html(render_dashboard(&user, png.as_deref())))
}

fn render_dashboard(user: &User, png: Option<&[u8]>) -> String {
    let body = match png {
        Some(png) => format!(
            r#"<img alt="Blood Sugar Over Time" src="data:image/png;base64,{}">"#,
            BASE64.encode(png)
        ),
        None => r#"<p class="empty">No readings yet</p>"#.to_string(),
    };
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Diatrack Dashboard</title>
<style>body{{font-family:sans-serif;margin:2rem}}img{{max-width:100%}}.empty{{color:#666}}</style>
</head>
<body>
<h1>Dashboard</h1>
<p>{}</p>
{body}
</body>
</html>
"#,
        escape_html(&user.name)
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn attachment(bytes: Vec<u8>, mime: &'static str, filename: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, mime.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}

async fn export_csv(State(state): State<AppState>) -> Result<Response, ApiError> {
    let (readings, foods) = {
        let svc = state.svc();
        (
            svc.readings_ascending(state.user_id)?,
            svc.foods_ascending(state.user_id)?,
        )
    };
    let xlsx = export::build_workbook(&readings, &foods).context("failed to build workbook")?;
    Ok(attachment(xlsx, WORKBOOK_MIME, WORKBOOK_FILENAME))
}

async fn export_pdf(State(state): State<AppState>) -> Result<Response, ApiError> {
    let (user, readings) = {
        let svc = state.svc();
        (
            svc.get_user(state.user_id)?,
            svc.recent_readings(state.user_id, REPORT_READING_LIMIT)?,
        )
    };
    let pdf = export::build_report_pdf(&readings, &user.name, Local::now().naive_local())
        .context("failed to build report")?;
    Ok(attachment(pdf, REPORT_MIME, REPORT_FILENAME))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        app: "Diatrack",
    })
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/add_reading", post(add_reading))
        .route("/add_food", post(add_food))
        .route("/dashboard", get(dashboard))
        .route("/export_csv", get(export_csv))
        .route("/export_pdf", get(export_pdf))
        .route("/health", get(health))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    svc: DiatrackService,
    user: User,
    port: u16,
    bind: &str,
) -> anyhow::Result<()> {
    let state = AppState {
        svc: Arc::new(Mutex::new(svc)),
        user_id: user.id,
    };

    let app = build_router(state);

    if bind != "127.0.0.1" && bind != "localhost" {
        log::warn!(
            "listening on {bind} with no authentication; any device on your network can read this log"
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    log::info!("serving {} on http://{bind}:{port}", user.name);
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use chrono::{Duration, NaiveDate};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let svc = DiatrackService::new_in_memory().unwrap();
        let user = svc.ensure_default_user().unwrap();
        AppState {
            svc: Arc::new(Mutex::new(svc)),
            user_id: user.id,
        }
    }

    fn seeded_state() -> AppState {
        let state = test_state();
        state.svc().seed_sample_data(state.user_id).unwrap();
        state
    }

    async fn get_path(state: &AppState, path: &str) -> Response {
        build_router(state.clone())
            .oneshot(axum::http::Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn post_form(state: &AppState, path: &str, body: &str) -> Response {
        build_router(state.clone())
            .oneshot(
                axum::http::Request::post(path)
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    #[tokio::test]
    async fn health_returns_status() {
        let state = test_state();
        let response = get_path(&state, "/health").await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json, serde_json::json!({"status": "healthy", "app": "Diatrack"}));
    }

    #[tokio::test]
    async fn index_returns_overview_newest_first() {
        let state = seeded_state();
        let response = get_path(&state, "/").await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["user"]["name"], "Demo User");
        assert_eq!(json["readings"].as_array().unwrap().len(), 14);
        assert_eq!(json["readings"][0]["measured_at"], "2024-09-18T13:20:00");
        assert_eq!(json["foods"][0]["name"], "Salmon with quinoa");
        assert_eq!(json["stats"]["count"], 14);
    }

    #[tokio::test]
    async fn add_reading_redirects_and_stores() {
        let state = test_state();
        let response = post_form(
            &state,
            "/add_reading",
            "value=145.5&kind=post-meal&note=After+lunch&measured_at=2024-09-12T13%3A30",
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");

        let readings = state.svc().readings_ascending(state.user_id).unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].kind, ReadingKind::PostMeal);
        assert_eq!(readings[0].note.as_deref(), Some("After lunch"));
        assert_eq!(
            readings[0].measured_at,
            NaiveDate::from_ymd_opt(2024, 9, 12)
                .unwrap()
                .and_hms_opt(13, 30, 0)
                .unwrap()
        );
    }

    #[tokio::test]
    async fn add_reading_without_timestamp_uses_now() {
        let state = test_state();
        let before = Local::now().naive_local() - Duration::seconds(1);
        let response = post_form(&state, "/add_reading", "value=98&kind=fasting&note=").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let readings = state.svc().readings_ascending(state.user_id).unwrap();
        assert_eq!(readings[0].note, None);
        assert!(readings[0].measured_at >= before);
    }

    #[tokio::test]
    async fn add_reading_rejects_malformed_input() {
        let state = test_state();
        for body in [
            "kind=fasting",
            "value=abc&kind=fasting",
            "value=NaN&kind=fasting",
            "value=98&kind=bedtime",
            "value=98&kind=fasting&measured_at=yesterday",
        ] {
            let response = post_form(&state, "/add_reading", body).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
            let json = body_json(response).await;
            assert!(json["error"].is_string());
        }
        assert_eq!(state.svc().readings_ascending(state.user_id).unwrap().len(), 0);
    }

    #[tokio::test]
    async fn add_food_with_blank_optionals() {
        let state = test_state();
        let response = post_form(
            &state,
            "/add_food",
            "name=Greek+yogurt&calories=&gi=&logged_at=",
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let foods = state.svc().foods_ascending(state.user_id).unwrap();
        assert_eq!(foods.len(), 1);
        assert_eq!(foods[0].name, "Greek yogurt");
        assert_eq!(foods[0].calories, None);
        assert_eq!(foods[0].glycemic_index, None);
    }

    #[tokio::test]
    async fn add_food_rejects_bad_numbers() {
        let state = test_state();
        let response = post_form(&state, "/add_food", "name=Toast&calories=lots").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = post_form(&state, "/add_food", "calories=100").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn dashboard_empty_state() {
        let state = test_state();
        let response = get_path(&state, "/dashboard").await;
        assert_eq!(response.status(), StatusCode::OK);

        let html = String::from_utf8(body_bytes(response).await).unwrap();
        assert!(html.contains("No readings yet"));
        assert!(!html.contains("data:image/png"));
    }

    #[tokio::test]
    async fn dashboard_embeds_chart() {
        let state = seeded_state();
        let response = get_path(&state, "/dashboard").await;
        assert_eq!(response.status(), StatusCode::OK);

        let html = String::from_utf8(body_bytes(response).await).unwrap();
        let start = html.find("data:image/png;base64,").unwrap() + "data:image/png;base64,".len();
        let end = start + html[start..].find('"').unwrap();
        let png = BASE64.decode(&html[start..end]).unwrap();
        assert!(png.starts_with(b"\x89PNG"));
    }

    #[tokio::test]
    async fn export_csv_returns_workbook() {
        let state = seeded_state();
        let response = get_path(&state, "/export_csv").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            WORKBOOK_MIME
        );
        assert_eq!(
            response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=\"diatrack_data.xlsx\""
        );
        assert!(body_bytes(response).await.starts_with(b"PK"));
    }

    #[tokio::test]
    async fn export_csv_with_no_data_still_succeeds() {
        let state = test_state();
        let response = get_path(&state, "/export_csv").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn export_pdf_limits_to_recent_readings() {
        let state = test_state();
        {
            let svc = state.svc();
            let start = NaiveDate::from_ymd_opt(2024, 9, 1)
                .unwrap()
                .and_hms_opt(7, 0, 0)
                .unwrap();
            for i in 0..60 {
                svc.log_reading(&NewReading {
                    user_id: state.user_id,
                    value: 100.0,
                    kind: ReadingKind::Fasting,
                    note: None,
                    measured_at: Some(start + Duration::hours(i)),
                })
                .unwrap();
            }
        }

        let response = get_path(&state, "/export_pdf").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/pdf"
        );
        assert_eq!(
            response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=\"diatrack_report.pdf\""
        );

        let pdf = body_bytes(response).await;
        let text = String::from_utf8_lossy(&pdf);
        assert!(text.starts_with("%PDF"));
        // 50 lines: 43 on the first page, 7 on the second
        assert!(text.contains("/Count 2"));
        assert_eq!(text.matches(" mg/dL - ").count(), 50);
    }

    #[tokio::test]
    async fn security_headers_present() {
        let state = test_state();
        let response = get_path(&state, "/health").await;

        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
        assert_eq!(
            response.headers().get("content-security-policy").unwrap(),
            CONTENT_SECURITY_POLICY
        );
    }

    #[tokio::test]
    async fn body_size_limit_rejects_oversized() {
        let state = test_state();
        let big_body = "note=".to_string() + &"a".repeat(BODY_LIMIT);
        let response = post_form(&state, "/add_reading", &big_body).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn internal_error_does_not_leak_details() {
        let error = ApiError::Internal(anyhow::anyhow!("secret database path /home/user/diatrack.db"));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["error"], "Internal server error");
    }

    #[test]
    fn escape_html_escapes_markup() {
        assert_eq!(
            escape_html("<b>Tom & \"Jerry\"</b>"),
            "&lt;b&gt;Tom &amp; &quot;Jerry&quot;&lt;/b&gt;"
        );
    }
}
