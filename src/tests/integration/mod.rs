//! Integration tests
//!
//! Drive the assembled filter the way a miner, a dashboard and an operator
//! would, with recording doubles behind it.

#[cfg(test)]
mod tests {
    use crate::application::use_cases;
    use crate::domain::events::BroadcastEvent;
    use crate::domain::mining::NonceSubmission;
    use crate::infrastructure::http::routes::{RouteBuilder, RouteComponents, RouteConfig};
    use crate::tests::common::{test_components_with_pool, test_mining_info, FakePool, TestDoubles, GIB};
    use crate::tests::config;
    use serde_json::Value;
    use std::convert::Infallible;
    use std::time::{Duration, Instant};
    use warp::http::StatusCode;
    use warp::reply::Response;
    use warp::Filter;

    const SECRET: &str = "test-secret";

    fn routes_with(
        components: &RouteComponents,
        require_auth: bool,
    ) -> impl Filter<Extract = (Response,), Error = Infallible> + Clone + 'static {
        config::init();
        let mut app_config = config::test_config();
        app_config.broadcast.require_auth = require_auth;
        let route_config = RouteConfig::from_app_config(&app_config);
        let (_dispatcher, routes) = RouteBuilder::build_routes(&route_config, components).unwrap();
        routes
    }

    fn routes(components: &RouteComponents) -> impl Filter<Extract = (Response,), Error = Infallible> + Clone + 'static {
        routes_with(components, false)
    }

    fn setup(pool_url: &str) -> (RouteComponents, TestDoubles) {
        test_components_with_pool(SECRET, pool_url, false)
    }

    fn json_body(body: &[u8]) -> Value {
        serde_json::from_slice(body).unwrap()
    }

    fn frame_json(message: &warp::ws::Message) -> Value {
        serde_json::from_str(message.to_str().unwrap()).unwrap()
    }

    /// A port nothing listens on
    async fn closed_port_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{}", port)
    }

    #[tokio::test]
    async fn test_unmatched_requests_touch_no_collaborator() {
        let (components, doubles) = setup("http://127.0.0.1:9");
        let filter = routes(&components);

        for (method, path) in [("POST", "/nowhere"), ("DELETE", "/rescan"), ("PUT", "/burst"), ("POST", "/")] {
            let response = warp::test::request().method(method).path(path).reply(&filter).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{} {}", method, path);
        }

        assert_eq!(doubles.collaborator_calls(), 0);
    }

    #[tokio::test]
    async fn test_admin_action_requires_credentials() {
        let (components, doubles) = setup("http://127.0.0.1:9");
        let node = components.node.clone();
        let mut subscription = node.subscribe().await.unwrap();
        subscription.receiver.recv().await.unwrap();
        let filter = routes(&components);

        let response = warp::test::request().method("POST").path("/rescan").reply(&filter).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key("www-authenticate"));

        let response = warp::test::request()
            .method("POST")
            .path("/rescan")
            .header("x-auth-token", "wrong")
            .reply(&filter)
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        assert_eq!(doubles.server.rescans(), 0);
        assert!(subscription.receiver.try_recv().is_err());

        let response = warp::test::request()
            .method("POST")
            .path("/rescan")
            .header("x-auth-token", SECRET)
            .reply(&filter)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(doubles.server.rescans(), 1);

        let body = json_body(response.body());
        assert_eq!(body["action"], "rescanPlotfiles");

        let event = subscription.receiver.recv().await.unwrap();
        assert!(event.contains("\"type\":\"config\""));
    }

    #[tokio::test]
    async fn test_basic_credentials_accepted() {
        use base64::Engine;

        let (components, doubles) = setup("http://127.0.0.1:9");
        let filter = routes(&components);
        let encoded = base64::engine::general_purpose::STANDARD.encode(format!("admin:{}", SECRET));

        let response = warp::test::request()
            .method("POST")
            .path("/rescan")
            .header("authorization", format!("Basic {}", encoded))
            .reply(&filter)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(doubles.server.rescans(), 1);
    }

    #[tokio::test]
    async fn test_submit_nonce_relays_pool_response_unchanged() {
        let pool = FakePool::respond(
            "202 Accepted",
            &[("Content-Type", "application/octet-stream"), ("X-Pool", "yes")],
            b"\x00\xffresult=ok\r\n",
        )
        .await;
        let (components, doubles) = setup(&pool.url());
        let filter = routes(&components);

        let response = warp::test::request()
            .method("POST")
            .path("/burst?requestType=submitNonce&accountId=7&nonce=42&deadline=100")
            .header("authorization", format!("Bearer {}", SECRET))
            .body("payload")
            .reply(&filter)
            .await;

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.body().as_ref(), b"\x00\xffresult=ok\r\n");
        assert_eq!(response.headers()["content-type"], "application/octet-stream");
        assert_eq!(response.headers()["x-pool"], "yes");

        let head = pool.head(0);
        assert!(head.starts_with("post /burst?requesttype=submitnonce&accountid=7&nonce=42&deadline=100 http/1.1"));
        assert!(!head.contains("authorization:"));
        assert!(pool.requests()[0].ends_with(b"payload"));

        assert_eq!(
            doubles.miner.submissions(),
            vec![NonceSubmission {
                account_id: 7,
                nonce: 42,
                deadline: Some(100),
            }]
        );
    }

    #[tokio::test]
    async fn test_refused_nonce_is_not_recorded() {
        let pool = FakePool::respond("500 Internal Server Error", &[], b"{\"error\":\"bad nonce\"}").await;
        let (components, doubles) = setup(&pool.url());
        let filter = routes(&components);

        let response = warp::test::request()
            .method("POST")
            .path("/burst?requestType=submitNonce&accountId=7&nonce=42")
            .reply(&filter)
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.body().as_ref(), b"{\"error\":\"bad nonce\"}");
        assert!(doubles.miner.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_nonce_never_reaches_pool() {
        let pool = FakePool::json("{}").await;
        let (components, doubles) = setup(&pool.url());
        let filter = routes(&components);

        for path in [
            "/burst?requestType=submitNonce&accountId=7",
            "/burst?requestType=submitNonce&accountId=7&nonce=abc",
        ] {
            let response = warp::test::request().method("POST").path(path).reply(&filter).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", path);
        }

        // Submissions sent with GET fall through to the pass-through, which refuses them.
        let response = warp::test::request()
            .path("/burst?requestType=submitNonce&accountId=7&nonce=42")
            .reply(&filter)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        assert!(pool.requests().is_empty());
        assert!(doubles.miner.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_silent_pool_times_out() {
        let pool = FakePool::hang().await;
        let (components, _doubles) = setup(&pool.url());
        let filter = routes(&components);

        let started = Instant::now();
        let response = warp::test::request()
            .method("POST")
            .path("/burst?requestType=submitNonce&accountId=7&nonce=42")
            .reply(&filter)
            .await;

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_unreachable_pool_is_bad_gateway() {
        let (components, doubles) = setup(&closed_port_url().await);
        let filter = routes(&components);

        let response = warp::test::request()
            .method("POST")
            .path("/burst?requestType=submitNonce&accountId=7&nonce=42")
            .reply(&filter)
            .await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(doubles.miner.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_pass_through_keeps_path_and_query() {
        let pool = FakePool::json("{\"blocks\":[]}").await;
        let (components, _doubles) = setup(&pool.url());
        let filter = routes(&components);

        let response = warp::test::request()
            .path("/burst?requestType=getBlocks&firstIndex=0")
            .reply(&filter)
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_ref(), b"{\"blocks\":[]}");
        assert!(pool.head(0).starts_with("get /burst?requesttype=getblocks&firstindex=0 http/1.1"));
    }

    #[tokio::test]
    async fn test_mining_info_on_get_and_post() {
        let (components, _doubles) = setup("http://127.0.0.1:9");
        let filter = routes(&components);

        for method in ["GET", "POST"] {
            let response = warp::test::request()
                .method(method)
                .path("/burst?requestType=getMiningInfo")
                .reply(&filter)
                .await;
            assert_eq!(response.status(), StatusCode::OK, "{}", method);

            let body = json_body(response.body());
            assert_eq!(body["height"], "482113");
            assert_eq!(body["generationSignature"], test_mining_info().generation_signature);
        }
    }

    #[tokio::test]
    async fn test_settings_change_is_broadcast_in_order() {
        let (components, _doubles) = setup("http://127.0.0.1:9");
        let node = components.node.clone();
        let mut subscription = node.subscribe().await.unwrap();
        let filter = routes(&components);

        let response = warp::test::request()
            .method("POST")
            .path("/settings")
            .header("x-auth-token", SECRET)
            .body(r#"{"target_deadline":1200}"#)
            .reply(&filter)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response.body())["details"]["target_deadline"], 1200);

        node.hub.publish(BroadcastEvent::NewBlock(test_mining_info())).await;

        let frames: Vec<Value> = [
            subscription.receiver.recv().await.unwrap(),
            subscription.receiver.recv().await.unwrap(),
            subscription.receiver.recv().await.unwrap(),
        ]
        .iter()
        .map(|frame| serde_json::from_str(frame).unwrap())
        .collect();

        assert_eq!(frames[0]["type"], "snapshot");
        assert_eq!(frames[1]["type"], "config");
        assert_eq!(frames[1]["settings"]["target_deadline"], 1200);
        assert_eq!(frames[2]["type"], "newBlock");
    }

    #[tokio::test]
    async fn test_invalid_settings_rejected() {
        let (components, doubles) = setup("http://127.0.0.1:9");
        let filter = routes(&components);

        for body in [r#"{"target_deadline":0}"#, r#"{"bogus":1}"#, "{}", "not json"] {
            let response = warp::test::request()
                .method("POST")
                .path("/settings")
                .header("x-auth-token", SECRET)
                .body(body)
                .reply(&filter)
                .await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", body);
        }

        assert_eq!(doubles.miner.calls(), 0);
    }

    #[tokio::test]
    async fn test_plot_directory_changes() {
        let (components, doubles) = setup("http://127.0.0.1:9");
        let filter = routes(&components);

        let post = |path: &'static str, body: &'static str| {
            warp::test::request()
                .method("POST")
                .path(path)
                .header("x-auth-token", SECRET)
                .body(body)
        };

        let response = post("/plotdirs/add", r#"{"path":"/plots/b"}"#).reply(&filter).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response.body())["action"], "addPlotDir");
        assert_eq!(doubles.server.paths(), vec!["/plots/a", "/plots/b"]);

        let response = post("/plotdirs/add", "/plots/a").reply(&filter).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = post("/plotdirs/add", "/plots/missing").reply(&filter).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = post("/plotdirs/remove", "\"/plots/a\"").reply(&filter).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(doubles.server.paths(), vec!["/plots/b"]);

        let response = post("/plotdirs/remove", "/plots/zzz").reply(&filter).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_websocket_receives_snapshot_then_events() {
        let (components, _doubles) = setup("http://127.0.0.1:9");
        let filter = routes(&components);

        let mut client = warp::test::ws().path("/ws").handshake(filter.clone()).await.unwrap();

        let snapshot = frame_json(&client.recv().await.unwrap());
        assert_eq!(snapshot["type"], "snapshot");
        assert_eq!(snapshot["config"]["mining_info"]["height"], "482113");
        assert_eq!(snapshot["config"]["pool_url"], "http://127.0.0.1:9");
        assert_eq!(snapshot["config"]["total_plot_bytes"], 2 * GIB);
        assert_eq!(snapshot["config"]["plot_dirs"][0]["plot_files"], 2);

        let response = warp::test::request()
            .method("POST")
            .path("/rescan")
            .header("x-auth-token", SECRET)
            .reply(&filter)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response.body())["details"]["total_bytes"], 3 * GIB);

        // The very next frame carries the rescanned plots.
        let event = frame_json(&client.recv().await.unwrap());
        assert_eq!(event["type"], "config");
        assert_eq!(event["total_plot_bytes"], 3 * GIB);
        assert_eq!(event["plot_dirs"][0]["path"], "/plots/a");
        assert_eq!(event["plot_dirs"][0]["plot_files"], 3);

        assert!(tokio::time::timeout(Duration::from_millis(100), client.recv()).await.is_err());
    }

    #[tokio::test]
    async fn test_websocket_credentials_when_required() {
        let (components, _doubles) = test_components_with_pool(SECRET, "http://127.0.0.1:9", true);
        let filter = routes_with(&components, true);

        assert!(warp::test::ws().path("/ws").handshake(filter.clone()).await.is_err());
        assert!(warp::test::ws()
            .path("/ws?token=wrong")
            .handshake(filter.clone())
            .await
            .is_err());

        let mut client = warp::test::ws()
            .path(&format!("/ws?token={}", SECRET))
            .handshake(filter.clone())
            .await
            .unwrap();
        let snapshot = frame_json(&client.recv().await.unwrap());
        assert_eq!(snapshot["config"]["websocket_requires_auth"], true);
    }

    #[tokio::test]
    async fn test_plain_get_on_event_stream_is_bad_request() {
        let (components, _doubles) = setup("http://127.0.0.1:9");
        let filter = routes(&components);

        let response = warp::test::request().path("/ws").reply(&filter).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_dashboard_page_is_templated() {
        let (components, _doubles) = setup("http://127.0.0.1:9");
        let filter = routes(&components);

        let response = warp::test::request().path("/").reply(&filter).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/html"));

        let page = String::from_utf8(response.body().to_vec()).unwrap();
        assert!(page.contains(&format!("Node {}", env!("CARGO_PKG_VERSION"))));
        assert!(page.contains("Block 482113"));
        assert!(page.contains("%UNKNOWN%"));
        assert!(page.contains("src=\"/ws\""));

        let response = warp::test::request().path("/app.js").reply(&filter).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_ref(), b"const ws = '/ws';");
    }

    #[tokio::test]
    async fn test_asset_paths_cannot_escape_root() {
        let (components, _doubles) = setup("http://127.0.0.1:9");
        let filter = routes(&components);

        for path in ["/..%2F..%2Fetc%2Fpasswd", "/%2e%2e/%2e%2e/etc/passwd", "/missing.html"] {
            let response = warp::test::request().path(path).reply(&filter).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", path);
        }
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let (components, doubles) = setup("http://127.0.0.1:9");
        let filter = routes(&components);

        let response = warp::test::request()
            .method("POST")
            .path("/settings")
            .header("x-auth-token", SECRET)
            .body(vec![b' '; 5000])
            .reply(&filter)
            .await;

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(doubles.collaborator_calls(), 0);
    }

    #[tokio::test]
    async fn test_admin_get_redirects_to_dashboard() {
        let (components, doubles) = setup("http://127.0.0.1:9");
        let filter = routes(&components);

        for path in ["/rescan", "/shutdown", "/settings"] {
            let response = warp::test::request().path(path).reply(&filter).await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER, "{}", path);
            assert_eq!(response.headers()["location"], "/");
        }

        assert_eq!(doubles.collaborator_calls(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_then_unavailable() {
        let (components, doubles) = setup("http://127.0.0.1:9");
        let node = components.node.clone();
        let filter = routes(&components);

        let response = warp::test::request()
            .method("POST")
            .path("/shutdown")
            .header("x-auth-token", SECRET)
            .reply(&filter)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response.body())["action"], "shutdown");
        assert!(node.shutdown.is_triggered());
        assert_eq!(doubles.server.shutdown_requests(), 1);

        let response = warp::test::request()
            .path("/burst?requestType=getMiningInfo")
            .reply(&filter)
            .await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        // A second request is harmless.
        use_cases::request_shutdown(&node);
        assert_eq!(doubles.server.shutdown_requests(), 1);
    }
}
