// src/web/routes.rs
use crate::{
    state::AppState,
    web::{admin_handlers, attendance_handlers, leave_handlers, mw_actor, mw_admin},
};
use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

pub fn create_router(app_state: AppState) -> Router {
    let attendance_routes = Router::new()
        .route("/query", post(attendance_handlers::handle_attendance_query))
        .route("/roster", get(attendance_handlers::handle_roster))
        .route("/{sin}/day/{date}", get(attendance_handlers::handle_person_day));

    let leave_routes = Router::new()
        .route("/", post(leave_handlers::handle_submit_leave))
        .route("/pending", get(leave_handlers::handle_pending_leaves))
        .route("/{request_id}", get(leave_handlers::handle_get_leave))
        .route("/{request_id}/decision", post(leave_handlers::handle_decision));

    // Admin role on top of the actor check applied below
    let admin_routes = Router::new()
        .route("/users/{sin}", delete(admin_handlers::handle_delete_user))
        .route("/users/{sin}/restore", post(admin_handlers::handle_restore_user))
        .route_layer(middleware::from_fn(mw_admin::require_admin));

    let identified_routes = Router::new()
        .nest("/attendance", attendance_routes)
        .nest("/leaves", leave_routes)
        .nest("/admin", admin_routes)
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            mw_actor::require_actor,
        ));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(identified_routes)
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, PersonSeed};
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn app() -> (Router, sqlx::SqlitePool) {
        let pool = test_support::pool().await;
        test_support::seed_config(&pool, "00:15:00", "01:00:00").await;
        test_support::seed_person(&pool, PersonSeed::staff("T1", "CSE", "staff")).await;
        test_support::seed_person(&pool, PersonSeed::staff("H1", "CSE", "hod")).await;
        test_support::seed_person(&pool, PersonSeed::staff("A1", "ADMIN", "admin")).await;
        let router = create_router(AppState { db_pool: pool.clone() });
        (router, pool)
    }

    fn request(method: Method, uri: &str, actor: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(sin) = actor {
            builder = builder.header(mw_actor::ACTOR_HEADER, sin);
        }
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn missing_or_unknown_actor_is_unauthorized() {
        let (router, _) = app().await;
        let anonymous = router
            .clone()
            .oneshot(request(Method::GET, "/leaves/pending", None, None))
            .await
            .unwrap();
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let ghost = router
            .oneshot(request(Method::GET, "/leaves/pending", Some("ghost"), None))
            .await
            .unwrap();
        assert_eq!(ghost.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn leave_flow_over_http() {
        let (router, _) = app().await;
        let submitted = router
            .clone()
            .oneshot(request(
                Method::POST,
                "/leaves",
                Some("T1"),
                Some(json!({
                    "request_type": "leave",
                    "reason": "medical",
                    "startDate": "2024-03-04",
                    "endDate": "2024-03-05"
                })),
            ))
            .await
            .unwrap();
        assert_eq!(submitted.status(), StatusCode::CREATED);
        let request_id = json_body(submitted).await["request_id"].as_str().unwrap().to_string();

        let pending = router
            .clone()
            .oneshot(request(Method::GET, "/leaves/pending", Some("H1"), None))
            .await
            .unwrap();
        assert_eq!(json_body(pending).await.as_array().unwrap().len(), 1);

        let decision_uri = format!("/leaves/{request_id}/decision");
        let decided = router
            .clone()
            .oneshot(request(
                Method::POST,
                &decision_uri,
                Some("H1"),
                Some(json!({ "approval_status": "approved" })),
            ))
            .await
            .unwrap();
        assert_eq!(decided.status(), StatusCode::OK);
        assert_eq!(json_body(decided).await["overall_status"], "Pending Principal Approval");

        let again = router
            .clone()
            .oneshot(request(
                Method::POST,
                &decision_uri,
                Some("H1"),
                Some(json!({ "approval_status": "rejected", "stage": "hod" })),
            ))
            .await
            .unwrap();
        assert_eq!(again.status(), StatusCode::CONFLICT);
        let body = json_body(again).await;
        assert_eq!(body["error"], "already_decided");
        assert_eq!(body["current"]["approvals"]["hod"]["state"], "approved");

        let fetched = router
            .oneshot(request(Method::GET, &format!("/leaves/{request_id}"), Some("T1"), None))
            .await
            .unwrap();
        assert_eq!(json_body(fetched).await["status"], "submitted");
    }

    #[tokio::test]
    async fn invalid_submission_names_the_field() {
        let (router, _) = app().await;
        let response = router
            .oneshot(request(
                Method::POST,
                "/leaves",
                Some("T1"),
                Some(json!({
                    "request_type": "od",
                    "reason": "symposium",
                    "start_date": "2024-03-06",
                    "end_date": "2024-03-04"
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["field"], "end_date");
    }

    #[tokio::test]
    async fn admin_routes_require_admin_role() {
        let (router, _) = app().await;
        let forbidden = router
            .clone()
            .oneshot(request(Method::DELETE, "/admin/users/T1", Some("H1"), None))
            .await
            .unwrap();
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

        let deleted = router
            .clone()
            .oneshot(request(Method::DELETE, "/admin/users/T1", Some("A1"), None))
            .await
            .unwrap();
        assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

        // The deleted person can no longer act
        let gone = router
            .clone()
            .oneshot(request(Method::GET, "/leaves/pending", Some("T1"), None))
            .await
            .unwrap();
        assert_eq!(gone.status(), StatusCode::UNAUTHORIZED);

        let restored = router
            .oneshot(request(Method::POST, "/admin/users/T1/restore", Some("A1"), None))
            .await
            .unwrap();
        assert_eq!(restored.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn bad_dates_are_validation_errors() {
        let (router, _) = app().await;
        let response = router
            .clone()
            .oneshot(request(Method::GET, "/attendance/T1/day/2024-13-01", Some("H1"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let roster = router
            .oneshot(request(
                Method::GET,
                "/attendance/roster?department=CSE&date=2024-03-05&population=staff",
                Some("H1"),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(roster.status(), StatusCode::OK);
        assert_eq!(json_body(roster).await.as_array().unwrap().len(), 2);
    }
}
