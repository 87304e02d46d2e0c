//! API integration tests.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use jobboard_api::auth::hash_password;
use jobboard_api::services::{LogMailer, StaticGeocoder};
use jobboard_api::{create_router, ApiConfig, AppState};
use jobboard_models::{Coordinates, Role, User};
use jobboard_storage::LocalResumeStore;
use jobboard_store::MemoryStore;

const BOUNDARY: &str = "jobboard-test-boundary";

struct TestApp {
    router: Router,
    state: AppState,
    mailer: Arc<LogMailer>,
    uploads: TempDir,
}

fn test_config() -> ApiConfig {
    ApiConfig {
        bcrypt_cost: 4,
        ..ApiConfig::default()
    }
}

fn test_app_with(config: ApiConfig) -> TestApp {
    let uploads = tempfile::tempdir().unwrap();
    let mailer = Arc::new(LogMailer::new());
    let state = AppState::from_parts(
        config,
        Arc::new(MemoryStore::new()),
        Arc::new(LocalResumeStore::new(uploads.path())),
        Arc::new(StaticGeocoder::new(Coordinates::new(-71.06, 42.36))),
        mailer.clone(),
    );
    TestApp {
        router: create_router(state.clone(), None),
        state,
        mailer,
        uploads,
    }
}

fn test_app() -> TestApp {
    test_app_with(test_config())
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, body)
    }

    async fn call(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let (status, _, body) = self.send(request).await;
        (status, body)
    }

    async fn register(&self, name: &str, email: &str, role: &str) -> String {
        let (status, body) = self
            .call(
                "POST",
                "/api/v1/register",
                None,
                Some(json!({
                    "name": name,
                    "email": email,
                    "password": "password123",
                    "role": role
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    async fn admin_token(&self) -> String {
        let hash = hash_password("password123".into(), 4).await.unwrap();
        let admin = User::new("Admin", "admin@example.com", Role::Admin, hash, Utc::now());
        self.state.users.repo().insert(&admin).await.unwrap();
        let (_, body) = self
            .call(
                "POST",
                "/api/v1/login",
                None,
                Some(json!({"email": "admin@example.com", "password": "password123"})),
            )
            .await;
        body["token"].as_str().unwrap().to_string()
    }

    async fn create_job(&self, token: &str, title: &str, salary: u64) -> Value {
        let (status, body) = self
            .call("POST", "/api/v1/job/new", Some(token), Some(job_body(title, salary)))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["data"].clone()
    }

    async fn apply(&self, token: &str, job_id: &str, file_name: &str, bytes: &[u8]) -> (StatusCode, Value) {
        let mut payload = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        payload.extend_from_slice(bytes);
        payload.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method("PUT")
            .uri(format!("/api/v1/job/{}/apply", job_id))
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(payload))
            .unwrap();
        let (status, _, body) = self.send(request).await;
        (status, body)
    }
}

fn job_body(title: &str, salary: u64) -> Value {
    json!({
        "title": title,
        "description": format!("{title} wanted for backend services"),
        "email": "jobs@example.com",
        "address": "1 Main St, Boston, MA 02108",
        "company": "Acme",
        "industry": ["IT"],
        "jobType": "Permanent",
        "minEducation": "Bachelors",
        "positions": 2,
        "experience": "2 years - 5 years",
        "salary": salary
    })
}

#[tokio::test]
async fn test_health_and_unknown_route() {
    let app = test_app();

    let (status, headers, body) = app
        .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(headers.contains_key("X-Request-ID"));
    assert_eq!(headers["X-Content-Type-Options"], "nosniff");

    let (status, body) = app.call("GET", "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["store"]["backend"], "memory");

    let (status, body) = app.call("GET", "/api/v1/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"success": false, "message": "/api/v1/nope route not found"}));
}

#[tokio::test]
async fn test_register_login_and_profile() {
    let app = test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"name": "Jane", "email": "jane@example.com", "password": "password123"}).to_string(),
        ))
        .unwrap();
    let (status, headers, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User registered successfully");
    let cookie = headers[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(cookie.starts_with("token="));
    assert!(cookie.contains("HttpOnly"));

    let (status, body) = app
        .call(
            "POST",
            "/api/v1/register",
            None,
            Some(json!({"name": "Jane", "email": "jane@example.com", "password": "password123"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Duplicate email entered.");

    let (status, body) = app
        .call("POST", "/api/v1/login", None, Some(json!({"email": "jane@example.com"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please enter your credentials");

    let (status, body) = app
        .call(
            "POST",
            "/api/v1/login",
            None,
            Some(json!({"email": "jane@example.com", "password": "wrong-password"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid credentials");

    // Session cookie alone authenticates
    let session = cookie.split(';').next().unwrap().to_string();
    let request = Request::builder()
        .uri("/api/v1/me")
        .header(header::COOKIE, session)
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "jane@example.com");
    assert_eq!(body["data"]["role"], "user");
    assert!(body["data"].get("password").is_none());
}

#[tokio::test]
async fn test_authentication_errors() {
    let app = test_app();

    let (status, body) = app.call("GET", "/api/v1/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Login is required to access this resource.");

    let (status, body) = app.call("GET", "/api/v1/me", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "JSON Web token is invalid. Try Again.");

    let token = app.register("Jane", "jane@example.com", "user").await;
    let (status, body) = app
        .call("POST", "/api/v1/job/new", Some(&token), Some(job_body("Rust Developer", 1)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Role(user) is not allowed to access this resource.");
}

#[tokio::test]
async fn test_job_listing_queries() {
    let app = test_app();
    let employer = app.register("Acme HR", "hr@acme.com", "employer").await;
    for (title, salary) in [("Rust Developer", 90000), ("Java Developer", 60000), ("Intern", 40000)] {
        app.create_job(&employer, title, salary).await;
    }

    let (status, body) = app.call("GET", "/api/v1/jobs", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"], 3);
    // Newest first by default
    assert_eq!(body["data"][0]["title"], "Intern");
    assert!(body["data"][0].get("applicantsApplied").is_none());
    assert!(body["data"][0].get("__v").is_none());

    let (_, body) = app
        .call(
            "GET",
            "/api/v1/jobs?salary%5Bgte%5D=50000&sort=salary&fields=title,salary",
            None,
            None,
        )
        .await;
    assert_eq!(body["results"], 2);
    assert_eq!(body["data"][0]["title"], "Java Developer");
    assert_eq!(body["data"][1]["salary"], 90000);
    assert!(body["data"][0].get("description").is_none());

    let (_, body) = app
        .call("GET", "/api/v1/jobs?jobType%5Bin%5D=Temporary,Internship", None, None)
        .await;
    assert_eq!(body["results"], 0);

    let (_, body) = app.call("GET", "/api/v1/jobs?q=rust", None, None).await;
    assert_eq!(body["results"], 1);

    let (_, body) = app.call("GET", "/api/v1/jobs?limit=2&page=2", None, None).await;
    assert_eq!(body["results"], 1);
}

#[tokio::test]
async fn test_job_by_slug_stats_and_radius() {
    let app = test_app();
    let employer = app.register("Acme HR", "hr@acme.com", "employer").await;
    let job = app.create_job(&employer, "Rust Developer", 90000).await;
    let id = job["_id"].as_str().unwrap();
    assert_eq!(job["slug"], "rust-developer");
    assert_eq!(job["location"]["coordinates"], json!([-71.06, 42.36]));

    let (status, body) = app
        .call("GET", &format!("/api/v1/job/{id}/rust-developer"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["title"], "Rust Developer");

    let (status, body) = app
        .call("GET", &format!("/api/v1/job/{id}/wrong-slug"), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Job not found");

    let (status, body) = app.call("GET", "/api/v1/stats/rust", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"][0]["_id"], "2 YEARS - 5 YEARS");
    assert_eq!(body["data"][0]["avgSalary"], 90000.0);

    let (status, body) = app.call("GET", "/api/v1/stats/cobol", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"success": false, "message": "No stats available for cobol"})
    );

    let (_, body) = app.call("GET", "/api/v1/jobs/02108/25", None, None).await;
    assert_eq!(body["results"], 1);

    let (status, _) = app.call("GET", "/api/v1/jobs/02108/far", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_job_validation_and_malformed_body() {
    let app = test_app();
    let employer = app.register("Acme HR", "hr@acme.com", "employer").await;

    let (status, body) = app
        .call("POST", "/api/v1/job/new", Some(&employer), Some(json!({"salary": 10})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("Please enter Job title"), "{message}");
    assert!(message.contains("Please enter the company name"), "{message}");

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/job/new")
        .header(header::AUTHORIZATION, format!("Bearer {}", employer))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_update_and_delete_require_ownership() {
    let app = test_app();
    let owner = app.register("Acme HR", "hr@acme.com", "employer").await;
    let rival = app.register("Other HR", "hr@other.com", "employer").await;
    let job = app.create_job(&owner, "Rust Developer", 90000).await;
    let uri = format!("/api/v1/job/{}", job["_id"].as_str().unwrap());

    let (status, _) = app
        .call("PUT", &uri, Some(&rival), Some(json!({"salary": 1})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call("PUT", &uri, Some(&owner), Some(json!({"title": "Senior Rust Developer"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Job updated successfully");
    assert_eq!(body["data"]["slug"], "senior-rust-developer");

    let (status, _) = app.call("DELETE", &uri, Some(&rival), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.call("DELETE", &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Job deleted successfully");

    let (status, body) = app.call("DELETE", &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Job not found");
}

#[tokio::test]
async fn test_apply_with_resume() {
    let app = test_app();
    let employer = app.register("Acme HR", "hr@acme.com", "employer").await;
    let seeker = app.register("Jane Doe", "jane@example.com", "user").await;
    let job = app.create_job(&employer, "Rust Developer", 90000).await;
    let id = job["_id"].as_str().unwrap();

    let (status, body) = app.apply(&employer, id, "cv.pdf", b"%PDF").await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");

    let (status, body) = app.apply(&seeker, id, "cv.txt", b"text").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please upload document file.");

    let (status, body) = app.apply(&seeker, id, "cv.pdf", b"%PDF-1.7").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Applied to Job successfully.");
    assert!(app.uploads.path().join(format!("Jane_Doe_{id}.pdf")).exists());

    let (status, body) = app.apply(&seeker, id, "cv.pdf", b"%PDF-1.7").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "You have already applied to this job.");

    let (_, body) = app.call("GET", "/api/v1/jobs/applied", Some(&seeker), None).await;
    assert_eq!(body["results"], 1);

    let (_, body) = app.call("GET", "/api/v1/jobs/published", Some(&employer), None).await;
    assert_eq!(body["results"], 1);
    assert_eq!(body["data"][0]["applicantsApplied"][0]["resume"], format!("Jane_Doe_{id}.pdf"));

    let (status, _) = app.call("GET", "/api/v1/jobs/published", Some(&seeker), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Applicants never leak through the public listing
    let (_, body) = app
        .call("GET", "/api/v1/jobs?fields=title,applicantsApplied", None, None)
        .await;
    assert_eq!(body["data"][0]["title"], "Rust Developer");
    assert!(body["data"][0].get("applicantsApplied").is_none());
}

#[tokio::test]
async fn test_password_recovery_flow() {
    let app = test_app();
    app.register("Jane", "jane@example.com", "user").await;

    let (status, body) = app
        .call("POST", "/api/v1/password/forgot", None, Some(json!({"email": "nobody@example.com"})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{body}");

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/password/forgot")
        .header(header::HOST, "jobs.example.com")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"email": "jane@example.com"}).to_string()))
        .unwrap();
    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Email sent successfully to: jane@example.com");

    let sent = app.mailer.sent().await;
    let link = sent[0]
        .text
        .split_whitespace()
        .find(|word| word.starts_with("http://jobs.example.com/api/v1/password/reset/"))
        .unwrap()
        .to_string();
    let path = link.trim_start_matches("http://jobs.example.com");

    let (status, body) = app
        .call("PUT", path, None, Some(json!({"password": "a-new-password"})))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["token"].is_string());

    let (status, body) = app
        .call("PUT", path, None, Some(json!({"password": "a-new-password"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "Password Reset token is invalid or has been expired."
    );

    let (status, _) = app
        .call(
            "POST",
            "/api/v1/login",
            None,
            Some(json!({"email": "jane@example.com", "password": "a-new-password"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_reset_link_uses_public_url() {
    let app = test_app_with(ApiConfig {
        public_url: Some("https://jobs.example.com".into()),
        ..test_config()
    });
    app.register("Jane", "jane@example.com", "user").await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/password/forgot")
        .header(header::HOST, "evil.example")
        .header("X-Forwarded-Proto", "http")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"email": "jane@example.com"}).to_string()))
        .unwrap();
    let (status, _, _) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);

    let sent = app.mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0]
        .text
        .contains("https://jobs.example.com/api/v1/password/reset/"));
    assert!(!sent[0].text.contains("evil.example"));
}

#[tokio::test]
async fn test_account_management() {
    let app = test_app();
    let token = app.register("Jane", "jane@example.com", "user").await;

    let (status, body) = app
        .call(
            "PUT",
            "/api/v1/password/update",
            Some(&token),
            Some(json!({"currentPassword": "incorrect-one", "newPassword": "another-password"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Current password is incorrect");

    let (status, body) = app
        .call(
            "PUT",
            "/api/v1/password/update",
            Some(&token),
            Some(json!({"currentPassword": "password123", "newPassword": "another-password"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());

    let (status, body) = app
        .call("PUT", "/api/v1/me/update", Some(&token), Some(json!({"name": "Janet"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Janet");

    let request = Request::builder()
        .uri("/api/v1/logout")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::SET_COOKIE].to_str().unwrap().contains("Max-Age=0"));

    let (status, body) = app.call("DELETE", "/api/v1/me/delete", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User deleted successfully");

    let (status, _) = app.call("GET", "/api/v1/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_user_management() {
    let app = test_app();
    let employer = app.register("Acme HR", "hr@acme.com", "employer").await;
    app.register("Jane", "jane@example.com", "user").await;
    app.create_job(&employer, "Rust Developer", 90000).await;
    let admin = app.admin_token().await;

    let (status, _) = app.call("GET", "/api/v1/users", Some(&employer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.call("GET", "/api/v1/users?role=employer", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"], 1);
    assert!(body["data"][0].get("password").is_none());
    let employer_id = body["data"][0]["_id"].as_str().unwrap().to_string();

    let (_, body) = app
        .call("GET", "/api/v1/users?fields=name,password,resetPasswordToken", Some(&admin), None)
        .await;
    assert!(body["data"][0].get("name").is_some());
    assert!(body["data"][0].get("password").is_none());
    assert!(body["data"][0].get("resetPasswordToken").is_none());

    let (status, body) = app
        .call("DELETE", &format!("/api/v1/user/{employer_id}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    // The employer's listings go with the account
    let (_, body) = app.call("GET", "/api/v1/jobs", None, None).await;
    assert_eq!(body["results"], 0);

    let (status, _) = app
        .call("DELETE", &format!("/api/v1/user/{employer_id}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rate_limiting() {
    let app = test_app_with(ApiConfig {
        rate_limit_max: 2,
        ..test_config()
    });

    let request = || {
        Request::builder()
            .uri("/api/v1/jobs")
            .header("X-Forwarded-For", "203.0.113.9")
            .body(Body::empty())
            .unwrap()
    };

    for _ in 0..2 {
        let (status, _, _) = app.send(request()).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, headers, body) = app.send(request()).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(headers.contains_key("Retry-After"));
    assert_eq!(body["success"], false);

    // Health checks sit outside the limiter
    let (status, _, _) = app
        .send(
            Request::builder()
                .uri("/health")
                .header("X-Forwarded-For", "203.0.113.9")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}
