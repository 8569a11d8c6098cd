use std::env;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use cambridge_exam_backend::{
    config::Config, database::pool::run_migrations, routes::build_router,
    utils::token::issue_session_token, AppState,
};
use serde_json::{json, Value as JsonValue};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "test_secret_key";

fn config_for(database_url: String) -> Config {
    Config {
        server_address: "127.0.0.1:0".into(),
        database_url,
        jwt_secret: SECRET.into(),
        api_rps: 1000,
        public_rps: 1000,
        webapp_url: "http://localhost:3000".into(),
        max_exam_parts: 8,
        groq_api_keys: vec![],
        groq_models: vec!["llama-3.3-70b-versatile".into()],
        gemini_api_key: None,
        gemini_model: "gemini-1.5-flash".into(),
        gemini_delay_ms: 0,
        openai_api_key: None,
        openai_model: "gpt-4o-mini".into(),
        elevenlabs_api_key: None,
        elevenlabs_voice_id: "voice".into(),
        huggingface_api_key: None,
        pexels_api_key: None,
    }
}

/// Needs a reachable Postgres in `DATABASE_URL`; returns `None` without one.
async fn setup_app() -> Option<Router> {
    dotenvy::dotenv().ok();
    let Ok(database_url) = env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping exam store test");
        return None;
    };
    let config = config_for(database_url);
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("pool");
    run_migrations(&pool).await.expect("migrations");

    let state = AppState::from_config(pool, &config).expect("state");
    Some(build_router(state, config.api_rps, config.public_rps))
}

fn new_user() -> String {
    let email = format!("student-{}@example.com", Uuid::new_v4());
    issue_session_token(SECRET, &email, Some(&email), 3600).expect("token")
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: &str,
    body: Option<JsonValue>,
) -> (StatusCode, JsonValue) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));
    let req = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null))
}

fn exam_body(topic: &str) -> JsonValue {
    json!({
        "type": "Reading",
        "level": "B2",
        "topic": topic,
        "data": {
            "exam": [
                {
                    "title": "Part 1",
                    "instructions": "Choose the best answer.",
                    "content": "The museum opened in 1901.",
                    "questions": [
                        {"question": "When did it open?", "options": ["1899", "1901", "1910", "1921"], "correctOption": "B"},
                        {"question": "Gap 1", "options": [], "answer": "very"}
                    ]
                }
            ]
        }
    })
}

async fn save(app: &Router, token: &str, topic: &str) -> String {
    let (status, body) = call(app, Method::POST, "/api/exams", token, Some(exam_body(topic))).await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().expect("saved id").to_string()
}

#[tokio::test]
async fn saved_exams_are_listed_newest_first() {
    let Some(app) = setup_app().await else { return };
    let token = new_user();

    let first = save(&app, &token, "Rivers").await;
    let second = save(&app, &token, "Volcanoes").await;

    let (status, body) = call(&app, Method::GET, "/api/exams", &token, None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![second.as_str(), first.as_str()]);
    assert_eq!(body[0]["topic"], "Volcanoes");
    assert_eq!(body[0]["type"], "Reading");
}

#[tokio::test]
async fn other_users_cannot_read_or_delete_an_exam() {
    let Some(app) = setup_app().await else { return };
    let owner = new_user();
    let stranger = new_user();
    let id = save(&app, &owner, "Deserts").await;
    let uri = format!("/api/exams/{}", id);

    let (status, body) = call(&app, Method::GET, &uri, &stranger, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Exam not found");

    let (status, _) = call(&app, Method::DELETE, &uri, &stranger, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(&app, Method::GET, &uri, &owner, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["topic"], "Deserts");

    let (status, body) = call(&app, Method::DELETE, &uri, &owner, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);

    let (status, _) = call(&app, Method::GET, &uri, &owner, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn submitted_attempts_store_the_graded_score() {
    let Some(app) = setup_app().await else { return };
    let owner = new_user();
    let id = save(&app, &owner, "Museums").await;
    let uri = format!("/api/exams/{}/attempts", id);

    let attempt = json!({
        "session": {
            "total_questions": 2,
            "answers": {"1": "b", "2": "quite"},
            "flagged": [2],
            "submitted": [1, 2]
        },
        "time_spent_seconds": 125
    });
    let (status, body) = call(&app, Method::POST, &uri, &owner, Some(attempt)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["score"], 1);
    assert_eq!(body["max_score"], 2);
    assert_eq!(body["time_spent"], "00:02:05");
    assert_eq!(body["time_remaining"], "87:55");
    assert_eq!(body["finished_in_last_minute"], false);

    let (status, body) = call(&app, Method::GET, &uri, &owner, None).await;
    assert_eq!(status, StatusCode::OK);
    let attempts = body.as_array().unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0]["score"], 1);
    assert_eq!(attempts[0]["max_score"], 2);
    assert_eq!(attempts[0]["time_spent_seconds"], 125);
    assert_eq!(attempts[0]["flagged"], json!([2]));

    let (status, body) = call(&app, Method::GET, &uri, &new_user(), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn attempts_for_a_different_question_count_are_rejected() {
    let Some(app) = setup_app().await else { return };
    let owner = new_user();
    let id = save(&app, &owner, "Bridges").await;
    let uri = format!("/api/exams/{}/attempts", id);

    let attempt = json!({
        "session": {"total_questions": 5, "answers": {"1": "B"}},
        "time_spent_seconds": 30
    });
    let (status, _) = call(&app, Method::POST, &uri, &owner, Some(attempt)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = call(&app, Method::GET, &uri, &owner, None).await;
    assert!(body.as_array().unwrap().is_empty());

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/api/exams/{}/attempts", Uuid::new_v4()),
        &owner,
        Some(json!({"session": {"total_questions": 2}})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
