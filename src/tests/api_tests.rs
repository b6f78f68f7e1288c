//! Router tests driven with `tower::ServiceExt::oneshot`.

#[cfg(test)]
mod tests {
    use crate::api::create_router;
    use crate::tests::common::*;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_group_lifecycle_over_http() {
        let adapter = StubAdapter::new();
        let services = setup(adapter.clone()).await;
        let app = create_router(services);

        let (status, body) = send(
            &app,
            Method::POST,
            "/networks",
            Some(json!({"id": "eth", "type": "evm", "rpc_urls": ["https://rpc.example.org"]})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["id"], "eth");

        let (status, _) = send(
            &app,
            Method::POST,
            "/coins",
            Some(json!({"network": "eth", "symbol": "USDC", "decimals": 6, "token": USDC_TOKEN})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(
            &app,
            Method::POST,
            "/groups",
            Some(json!({
                "name": "treasury",
                "network_type": "evm",
                "accounts": [ACCOUNT_A],
                "coins": ["eth__usdc"],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let group_id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, Method::GET, &format!("/groups/{}/account-balances", group_id), None).await;
        assert_eq!(status, StatusCode::OK);
        let row_id = body["data"][0]["id"].as_i64().unwrap();

        adapter.push_balance(Ok(2_500_000));
        let (status, body) = send(&app, Method::POST, &format!("/account-balances/{}/check", row_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["balance"], "2.50000");

        let (status, body) = send(&app, Method::GET, &format!("/groups/{}/balances", group_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["balances"][ACCOUNT_A], "2.50000");

        let (status, _) = send(&app, Method::DELETE, &format!("/groups/{}", group_id), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let services = setup(StubAdapter::new()).await;
        create_eth_network(&services).await;
        let app = create_router(services);

        let (status, body) = send(&app, Method::GET, "/groups/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("group missing"));

        let (status, _) = send(
            &app,
            Method::POST,
            "/groups",
            Some(json!({"name": "g", "network_type": "evm", "namings": ["ans"]})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            Method::POST,
            "/groups",
            Some(json!({"name": "g", "network_type": "evm", "accounts": ["0x12"]})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, Method::POST, "/account-balances/42/check", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bot_endpoints() {
        let services = setup(StubAdapter::new()).await;
        let app = create_router(services);

        let (status, body) = send(&app, Method::POST, "/bot/toggle-balances", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["enabled"], false);

        let (status, body) = send(&app, Method::PUT, "/bot/settings", Some(json!({"round_ndigits": 3}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["round_ndigits"], 3);

        let (status, body) = send(&app, Method::GET, "/bot", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["runtime"]["check_balances"], false);

        let (status, body) = send(&app, Method::GET, "/rpc-monitoring?limit=5", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!([]));
    }
}
