use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde::Serialize;
use tracing::{error, info};

use staffdir_core::types::NewEmployee;
use staffdir_storage::{EmployeeError, NewEmployeeRecord};

use crate::mailer::WelcomeEmail;
use crate::router::AppState;

const CREATED_MESSAGE: &str = "Employee created successfully";
const CREATE_FAILED_MESSAGE: &str = "An error occurred while creating the employee";
const FETCH_FAILED_MESSAGE: &str = "An error occurred while fetching the employee";
const NOT_FOUND_MESSAGE: &str = "Employee not found";
const GENERIC_ERROR: &str = "Internal server error";

#[derive(Debug, Serialize)]
struct DataEnvelope<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    data: T,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    success: bool,
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// `POST /employees` — persists a new employee and queues the welcome email.
///
/// The payload has already been shape-checked by the `Json` extractor;
/// rejected bodies never reach this handler. The welcome email is handed
/// off only after the insert succeeded.
pub async fn create(State(state): State<AppState>, Json(payload): Json<NewEmployee>) -> Response {
    let record = NewEmployeeRecord::generate(&payload, state.now());
    match state.storage().employees().insert(record).await {
        Ok(employee) => {
            counter!("employees_created_total").increment(1);
            info!(
                stage = "employees",
                id = %employee.id,
                department = %employee.department,
                "employee created"
            );
            state.mailer().enqueue(WelcomeEmail {
                email: employee.email.clone(),
            });
            (
                StatusCode::CREATED,
                Json(DataEnvelope {
                    success: true,
                    message: Some(CREATED_MESSAGE),
                    data: employee,
                }),
            )
                .into_response()
        }
        Err(err) => {
            counter!("employee_create_failures_total").increment(1);
            error!(stage = "employees", error = %err, "employee creation failed");
            failure_response(CREATE_FAILED_MESSAGE, &err, state.debug())
        }
    }
}

/// `GET /employees/{id}` — loads a single employee.
pub async fn fetch(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.storage().employees().fetch(&id).await {
        Ok(Some(employee)) => (
            StatusCode::OK,
            Json(DataEnvelope {
                success: true,
                message: None,
                data: employee,
            }),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorEnvelope {
                success: false,
                message: NOT_FOUND_MESSAGE,
                error: None,
            }),
        )
            .into_response(),
        Err(err) => {
            error!(stage = "employees", error = %err, %id, "employee fetch failed");
            failure_response(FETCH_FAILED_MESSAGE, &err, state.debug())
        }
    }
}

/// `GET /employees` — lists all employees ordered by creation time.
pub async fn list(State(state): State<AppState>) -> Response {
    match state.storage().employees().list().await {
        Ok(employees) => (
            StatusCode::OK,
            Json(DataEnvelope {
                success: true,
                message: None,
                data: employees,
            }),
        )
            .into_response(),
        Err(err) => {
            error!(stage = "employees", error = %err, "employee list failed");
            failure_response(FETCH_FAILED_MESSAGE, &err, state.debug())
        }
    }
}

/// Converts a storage failure into the fixed 500 envelope.
///
/// Raw error detail is only exposed when debug mode is on; production
/// callers always see the generic string.
fn failure_response(message: &'static str, err: &EmployeeError, debug: bool) -> Response {
    let detail = if debug {
        err.to_string()
    } else {
        GENERIC_ERROR.to_string()
    };
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorEnvelope {
            success: false,
            message,
            error: Some(detail),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use staffdir_storage::Database;

    use crate::mailer::{mailer_channel, MailerWorker, WelcomeEmail};
    use crate::router::{app_router, AppState};
    use crate::telemetry;

    static DB_COUNTER: std::sync::atomic::AtomicU32 = std::sync::atomic::AtomicU32::new(0);

    async fn setup() -> (AppState, MailerWorker) {
        setup_with_debug(false).await
    }

    // Named in-memory databases keep concurrently running tests isolated.
    async fn setup_with_debug(debug: bool) -> (AppState, MailerWorker) {
        let metrics = telemetry::init_metrics().expect("metrics init");
        let id = DB_COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let url = format!("sqlite:file:employees-test-{id}?mode=memory&cache=shared");
        let database = Database::connect(&url).await.expect("connect");
        database.run_migrations().await.expect("migrations");

        let (mailer, worker) = mailer_channel();
        (AppState::new(metrics, database, mailer, debug), worker)
    }

    fn jane_payload() -> Value {
        json!({
            "first_name": "Jane",
            "last_name": "Doe",
            "email": "jane@doe.com",
            "salary": 50000,
            "department": "Eng",
        })
    }

    fn post_employees(payload: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/employees")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .expect("request builds")
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let collected = response
            .into_body()
            .collect()
            .await
            .expect("body should read");
        serde_json::from_slice(&collected.to_bytes()).expect("body is json")
    }

    async fn break_employees_table(state: &AppState) {
        sqlx::query("DROP TABLE employees")
            .execute(state.storage().pool())
            .await
            .expect("drop table");
    }

    #[tokio::test]
    async fn create_returns_201_with_the_stored_record() {
        let (state, mut worker) = setup().await;
        let app = app_router(state);

        let response = app
            .oneshot(post_employees(&jane_payload()))
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = read_json(response).await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["message"], json!("Employee created successfully"));
        assert_eq!(body["data"]["first_name"], json!("Jane"));
        assert_eq!(body["data"]["last_name"], json!("Doe"));
        assert_eq!(body["data"]["email"], json!("jane@doe.com"));
        assert_eq!(body["data"]["salary"], json!("50000.00"));
        assert_eq!(body["data"]["department"], json!("Eng"));
        assert!(
            body["data"]["id"].as_str().is_some_and(|id| !id.is_empty()),
            "created record carries an assigned id"
        );

        assert_eq!(
            worker.try_next(),
            Some(WelcomeEmail {
                email: "jane@doe.com".to_string()
            }),
            "welcome email is enqueued after a successful insert"
        );
    }

    #[tokio::test]
    async fn create_failure_returns_generic_500_without_debug() {
        let (state, mut worker) = setup_with_debug(false).await;
        break_employees_table(&state).await;
        let app = app_router(state);

        let response = app
            .oneshot(post_employees(&jane_payload()))
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(response).await;
        assert_eq!(body["success"], json!(false));
        assert_eq!(
            body["message"],
            json!("An error occurred while creating the employee")
        );
        assert_eq!(body["error"], json!("Internal server error"));

        assert_eq!(
            worker.try_next(),
            None,
            "no welcome email is enqueued when the insert fails"
        );
    }

    #[tokio::test]
    async fn create_failure_exposes_detail_in_debug_mode() {
        let (state, _worker) = setup_with_debug(true).await;
        break_employees_table(&state).await;
        let app = app_router(state);

        let response = app
            .oneshot(post_employees(&jane_payload()))
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(response).await;
        assert_eq!(body["success"], json!(false));
        let detail = body["error"].as_str().expect("error detail is a string");
        assert_ne!(detail, "Internal server error");
        assert!(!detail.is_empty());
    }

    #[tokio::test]
    async fn malformed_body_is_rejected_before_the_handler() {
        let (state, mut worker) = setup().await;
        let app = app_router(state);

        let payload = json!({
            "first_name": "Jane",
            "last_name": "Doe",
            "email": "jane@doe.com",
            "department": "Eng",
        });
        let response = app
            .oneshot(post_employees(&payload))
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(worker.try_next(), None);
    }

    #[tokio::test]
    async fn identical_payloads_create_two_records() {
        let (state, _worker) = setup().await;
        let app = app_router(state);

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(post_employees(&jane_payload()))
                .await
                .expect("handler should respond");
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/employees")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("handler should respond");
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["data"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn fetch_round_trips_a_created_employee() {
        let (state, _worker) = setup().await;
        let app = app_router(state);

        let created = app
            .clone()
            .oneshot(post_employees(&jane_payload()))
            .await
            .expect("handler should respond");
        let created_body = read_json(created).await;
        let id = created_body["data"]["id"]
            .as_str()
            .expect("id is present")
            .to_string();

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/employees/{id}"))
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["data"]["id"], json!(id));
        assert_eq!(body["data"]["salary"], json!("50000.00"));
    }

    #[tokio::test]
    async fn fetch_returns_404_for_unknown_id() {
        let (state, _worker) = setup().await;
        let app = app_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/employees/missing")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = read_json(response).await;
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["message"], json!("Employee not found"));
    }
}
