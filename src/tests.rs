#[cfg(test)]
mod articles;

#[cfg(test)]
mod integration_tests {
    use crate::schemas::HealthResponse;
    use crate::test_utils::test_utils::{assert_template_used, create_test_user, setup_test_app};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_health_check() {
        let app = setup_test_app().await;

        let response = app.server.get("/health").await;

        response.assert_status(StatusCode::OK);
        let body: HealthResponse = response.json();
        assert_eq!(body.status, "healthy");
        assert_eq!(body.database, "connected");
    }

    #[tokio::test]
    async fn test_prometheus_metrics_endpoint_is_not_mounted_in_tests() {
        let app = setup_test_app().await;

        // the recorder is global, so only the served binary installs it
        let response = app.server.get("/metrics").await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_openapi_document_is_served() {
        let app = setup_test_app().await;

        let response = app.server.get("/api-docs/openapi.json").await;

        response.assert_status(StatusCode::OK);
        let body: serde_json::Value = response.json();
        assert!(body["paths"]["/articles/"].is_object());
    }

    #[tokio::test]
    async fn test_home_for_anonymous_visitor() {
        let app = setup_test_app().await;

        let response = app.server.get("/").await;

        response.assert_status(StatusCode::OK);
        assert_template_used(&response, "home.html");
        assert!(response.text().contains("You are not logged in"));
    }

    #[tokio::test]
    async fn test_home_greets_logged_in_user() {
        let app = setup_test_app().await;
        create_test_user(app.db(), "testuser").await;
        let session = app.login("testuser", crate::test_utils::test_utils::TEST_PASSWORD).await;

        let response = app.server.get("/").add_cookie(session).await;

        response.assert_status(StatusCode::OK);
        assert!(response.text().contains("Hi testuser!"));
        assert!(!response.text().contains("You are not logged in"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = setup_test_app().await;
        app.server.get("/no/such/page/").await.assert_status(StatusCode::NOT_FOUND);
    }
}
