//! End-to-end tests for the synchronous test client.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderName, HeaderValue, Method, StatusCode};
use serde_json::{json, Value};
use sextant_core::{
    app_fn, app_instance, AppEntry, AppResult, ApplicationPanic, BoxError, CloseCode, Frame,
    Message, ProtocolError, Request, Response, Scope, WebSocket,
};
use sextant_router::{from_fn, MethodRouter, Router};
use sextant_telemetry::init_test_logging;
use sextant_test::{MultipartForm, TestClient, TestError};

#[derive(Debug, thiserror::Error)]
#[error("startup hook failed")]
struct StartupError;

fn mock_service() -> Router {
    async fn mock(_request: Request) -> AppResult<Response> {
        Ok(Response::json(&json!({"mock": "example"}))?)
    }

    Router::new()
        .route("/", MethodRouter::new().get(mock))
        .unwrap()
}

fn echo_headers() -> Router {
    async fn headers(request: Request) -> AppResult<Response> {
        let pairs: Vec<(String, String)> = request
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        Ok(Response::json(&pairs)?)
    }

    Router::new()
        .route("/", MethodRouter::new().get(headers).post(headers))
        .unwrap()
}

fn header_names(response: &sextant_test::TestResponse) -> Vec<String> {
    let pairs: Vec<(String, String)> = response.json().unwrap();
    pairs.into_iter().map(|(name, _)| name).collect()
}

#[test]
fn test_use_testclient_in_endpoint() {
    init_test_logging();

    async fn homepage(_request: Request) -> AppResult<Response> {
        let client = TestClient::new(mock_service());
        let response = client.get("/").send()?;
        Ok(Response::json(&response.json_value()?)?)
    }

    let app = Router::new()
        .route("/", MethodRouter::new().get(homepage))
        .unwrap();
    let client = TestClient::new(app);

    let response = client.get("/").send().unwrap();
    assert_eq!(response.json_value().unwrap(), json!({"mock": "example"}));
}

#[test]
fn test_two_stage_application() {
    let entry = AppEntry::two_stage(|_scope| {
        app_instance(|_receive, send| async move {
            Response::text("Hello, world!").send(&send).await?;
            Ok::<(), BoxError>(())
        })
    });
    let client = TestClient::from_entry(entry);

    let response = client.get("/").send().unwrap();
    response.assert_success().assert_body_eq("Hello, world!");
}

#[test]
fn test_single_stage_application() {
    let entry = AppEntry::from_fn(|_scope, _receive, send| async move {
        Response::text("Hello, world!").send(&send).await?;
        Ok::<(), BoxError>(())
    });
    let client = TestClient::from_entry(entry);

    let response = client.get("/").send().unwrap();
    assert_eq!(response.text().unwrap(), "Hello, world!");
}

#[test]
fn test_lifespan_hooks_run_once() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let on_start = Arc::clone(&events);
    let on_stop = Arc::clone(&events);

    let app = mock_service()
        .on_startup(move || {
            let events = Arc::clone(&on_start);
            async move {
                events.lock().unwrap().push("startup");
                Ok::<(), BoxError>(())
            }
        })
        .on_shutdown(move || {
            let events = Arc::clone(&on_stop);
            async move {
                events.lock().unwrap().push("shutdown");
                Ok::<(), BoxError>(())
            }
        });

    let client = TestClient::new(app).enter().unwrap();
    assert_eq!(*events.lock().unwrap(), vec!["startup"]);

    client.get("/").send().unwrap().assert_success();
    client.exit().unwrap();
    assert_eq!(*events.lock().unwrap(), vec!["startup", "shutdown"]);
}

#[test]
fn test_lifespan_shutdown_on_drop() {
    let stopped = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&stopped);

    let app = mock_service().on_shutdown(move || {
        let flag = Arc::clone(&flag);
        async move {
            *flag.lock().unwrap() = true;
            Ok::<(), BoxError>(())
        }
    });

    {
        let _client = TestClient::new(app).enter().unwrap();
        assert!(!*stopped.lock().unwrap());
    }
    assert!(*stopped.lock().unwrap());
}

#[test]
fn test_error_on_startup() {
    async fn failing_startup() -> AppResult {
        Err(Box::new(StartupError))
    }

    let app = mock_service().on_startup(failing_startup);
    let err = TestClient::new(app).enter().unwrap_err();

    let source = err.application_error().expect("application error");
    assert!(source.downcast_ref::<StartupError>().is_some());
}

#[test]
fn test_application_without_lifespan_support() {
    let app = app_fn(|scope, _receive, send| async move {
        if let Scope::Lifespan = scope {
            return Ok::<(), BoxError>(());
        }
        Response::text("ok").send(&send).await?;
        Ok::<(), BoxError>(())
    });

    let client = TestClient::new(app).enter().unwrap();
    client.get("/").send().unwrap().assert_body_eq("ok");
    client.exit().unwrap();
}

#[test]
fn test_lifespan_error_without_lifespan_messages() {
    let app = app_fn(|scope, receive, send| async move {
        if let Scope::Lifespan = scope {
            receive.receive().await;
            return Err::<(), BoxError>(Box::new(StartupError));
        }
        Response::text("ok").send(&send).await?;
        Ok(())
    });

    let err = TestClient::new(app).enter().unwrap_err();
    let source = err.application_error().expect("application error");
    assert!(source.downcast_ref::<StartupError>().is_some());
}

#[test]
fn test_exit_then_drop_runs_shutdown_once() {
    let shutdowns = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&shutdowns);

    let app = mock_service().on_shutdown(move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<(), BoxError>(())
        }
    });

    let client = TestClient::new(app).enter().unwrap();
    client.exit().unwrap();
    assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failed_startup_releases_runtime() {
    let resource = Arc::new(());
    let held = Arc::clone(&resource);

    let app = app_fn(move |scope, receive, send| {
        let held = Arc::clone(&held);
        async move {
            if let Scope::Lifespan = scope {
                receive.receive().await;
                // Never finishes on its own; only runtime shutdown drops it.
                tokio::spawn(async move {
                    let _held = held;
                    std::future::pending::<()>().await;
                });
                send.send(Message::LifespanStartupFailed {
                    message: "no database".to_string(),
                })
                .await?;
            }
            Ok::<(), BoxError>(())
        }
    });

    let err = TestClient::new(app).enter().unwrap_err();
    assert!(matches!(err, TestError::StartupFailed(ref message) if message == "no database"));
    assert_eq!(Arc::strong_count(&resource), 1);
}

#[test]
fn test_error_with_middleware_is_not_raised_again_on_exit() {
    async fn error(_request: Request) -> AppResult<Response> {
        Err("should_only_fail_once".into())
    }

    let app = Router::new()
        .route("/error", MethodRouter::new().get(error))
        .unwrap()
        .middleware(from_fn("passthrough", |request, next| next.run(request)));

    let client = TestClient::new(app).enter().unwrap();
    let err = client.get("/error").send().unwrap_err();
    assert_eq!(
        err.application_error().unwrap().to_string(),
        "should_only_fail_once"
    );
    client.exit().unwrap();
}

#[test]
fn test_server_exceptions_disabled_returns_response() {
    async fn error(_request: Request) -> AppResult<Response> {
        Err("boom".into())
    }

    let app = Router::new()
        .route("/error", MethodRouter::new().get(error))
        .unwrap();
    let client = TestClient::new(app).raise_server_exceptions(false);

    let response = client.get("/error").send().unwrap();
    response
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR)
        .assert_body_eq("Internal Server Error");
}

#[test]
fn test_error_without_response_gives_empty_500() {
    fn app() -> impl sextant_core::Application {
        app_fn(|_scope, _receive, _send| async move { Err::<(), BoxError>("no response".into()) })
    }

    let err = TestClient::new(app()).get("/").send().unwrap_err();
    assert_eq!(err.application_error().unwrap().to_string(), "no response");

    let response = TestClient::new(app())
        .raise_server_exceptions(false)
        .get("/")
        .send()
        .unwrap();
    assert_eq!(response.status_code(), 500);
    assert!(response.body().is_empty());
}

#[test]
fn test_application_panic_is_captured() {
    let app = app_fn(|scope, _receive, _send| async move {
        if scope.connection().is_some() {
            panic!("handler exploded");
        }
        Ok::<(), BoxError>(())
    });

    let err = TestClient::new(app).get("/").send().unwrap_err();
    let panic = err
        .application_error()
        .and_then(|source| source.downcast_ref::<ApplicationPanic>())
        .expect("panic captured");
    assert_eq!(panic.message(), "handler exploded");
}

#[test]
fn test_not_found_and_method_not_allowed() {
    let client = TestClient::new(mock_service());

    let response = client.get("/missing").send().unwrap();
    response
        .assert_status(StatusCode::NOT_FOUND)
        .assert_body_eq("Not Found");

    let response = client.post("/").send().unwrap();
    response
        .assert_status(StatusCode::METHOD_NOT_ALLOWED)
        .assert_header("allow", "GET, HEAD");
}

#[test]
fn test_head_request_has_no_body() {
    let client = TestClient::new(mock_service());

    let response = client.head("/").send().unwrap();
    response.assert_success();
    assert!(response.body().is_empty());
    assert_eq!(response.content_length(), Some(18));
}

#[test]
fn test_request_header_order() {
    let client = TestClient::new(echo_headers()).default_header(
        HeaderName::from_static("x-default"),
        HeaderValue::from_static("1"),
    );

    let response = client
        .post("/")
        .header("x-b", "2")
        .header("x-a", "3")
        .json(&json!({"key": "value"}))
        .send()
        .unwrap();

    assert_eq!(
        header_names(&response),
        vec![
            "host",
            "user-agent",
            "accept-encoding",
            "accept",
            "connection",
            "x-default",
            "x-b",
            "x-a",
            "content-type",
            "content-length",
        ]
    );
}

#[test]
fn test_request_headers_override_defaults() {
    let client = TestClient::new(echo_headers());

    let response = client
        .get("/")
        .header("User-Agent", "custom-agent")
        .send()
        .unwrap();
    let pairs: Vec<(String, String)> = response.json().unwrap();

    let agents: Vec<&str> = pairs
        .iter()
        .filter(|(name, _)| name == "user-agent")
        .map(|(_, value)| value.as_str())
        .collect();
    assert_eq!(agents, vec!["custom-agent"]);
    assert_eq!(pairs.last().unwrap().0, "user-agent");
}

#[test]
fn test_scope_reflects_url() {
    let app = app_fn(|scope, _receive, send| async move {
        let connection = scope.connection().cloned().unwrap_or_else(|| {
            sextant_core::ConnectionScope::new(Method::GET, "/")
        });
        let summary = json!({
            "scheme": connection.scheme,
            "path": connection.path,
            "root_path": connection.root_path,
            "query": String::from_utf8_lossy(&connection.query_string),
            "server": connection.server,
            "client": connection.client,
            "host": connection.header_str("host"),
        });
        Response::json(&summary)?.send(&send).await?;
        Ok::<(), BoxError>(())
    });

    let client = TestClient::new(app)
        .base_url("https://example.org:8443")
        .root_path("/api");
    let response = client
        .get("/caf%C3%A9?a=1")
        .query(&[("b", "two words")])
        .send()
        .unwrap();

    assert_eq!(
        response.json_value().unwrap(),
        json!({
            "scheme": "https",
            "path": "/café",
            "root_path": "/api",
            "query": "a=1&b=two+words",
            "server": ["example.org", 8443],
            "client": ["testclient", 50000],
            "host": "example.org:8443",
        })
    );
}

#[test]
fn test_chunked_request_body() {
    let app = app_fn(|_scope, receive, send| async move {
        let mut chunks = 0;
        let mut body = Vec::new();
        loop {
            match receive.receive().await {
                Message::HttpRequest {
                    body: chunk,
                    more_body,
                } => {
                    if !chunk.is_empty() {
                        chunks += 1;
                    }
                    body.extend_from_slice(&chunk);
                    if !more_body {
                        break;
                    }
                }
                other => return Err(ProtocolError::unexpected("http.request", other.kind()).into()),
            }
        }
        let text = format!("{chunks}:{}", String::from_utf8_lossy(&body));
        Response::text(text).send(&send).await?;
        Ok::<(), BoxError>(())
    });

    let client = TestClient::new(app);
    let response = client
        .post("/")
        .body_chunks(["a", "b", "c"].map(|s: &'static str| Bytes::from_static(s.as_bytes())))
        .send()
        .unwrap();
    response.assert_body_eq("3:abc");
}

#[test]
fn test_chunked_request_sets_transfer_encoding() {
    let client = TestClient::new(echo_headers());
    let response = client
        .post("/")
        .body_chunks([Bytes::from_static(b"data")])
        .send()
        .unwrap();

    let pairs: Vec<(String, String)> = response.json().unwrap();
    let last = pairs.last().unwrap();
    assert_eq!(last, &("transfer-encoding".to_string(), "chunked".to_string()));
}

#[test]
fn test_multipart_upload() {
    async fn upload(mut request: Request) -> AppResult<Response> {
        let content_type = request.header("content-type").unwrap_or_default().to_string();
        let boundary = multer::parse_boundary(content_type)?;
        let body = request.body().await?;
        let stream = futures_util::stream::once(async move { Ok::<_, std::convert::Infallible>(body) });
        let mut multipart = multer::Multipart::new(stream, boundary);

        let mut fields = Vec::new();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            let filename = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(ToString::to_string);
            let text = field.text().await?;
            fields.push(json!({
                "name": name,
                "filename": filename,
                "content_type": content_type,
                "text": text,
            }));
        }
        Ok(Response::json(&fields)?)
    }

    let app = Router::new()
        .route("/upload", MethodRouter::new().post(upload))
        .unwrap();
    let client = TestClient::new(app);

    let form = MultipartForm::new()
        .text("title", "report")
        .file("attachment", "notes.txt", "text/plain", "line one\nline two");
    let response = client.post("/upload").multipart(form).send().unwrap();

    assert_eq!(
        response.json_value().unwrap(),
        json!([
            {"name": "title", "filename": null, "content_type": null, "text": "report"},
            {
                "name": "attachment",
                "filename": "notes.txt",
                "content_type": "text/plain",
                "text": "line one\nline two",
            },
        ])
    );
}

#[test]
fn test_form_body() {
    async fn form(mut request: Request) -> AppResult<Response> {
        let values: Vec<(String, String)> = request.form().await?;
        Ok(Response::json(&values)?)
    }

    let app = Router::new()
        .route("/form", MethodRouter::new().post(form))
        .unwrap();
    let client = TestClient::new(app);

    let response = client
        .post("/form")
        .form(&[("name", "Ada Lovelace"), ("lang", "en")])
        .send()
        .unwrap();
    response.assert_json_eq(&json!([["name", "Ada Lovelace"], ["lang", "en"]]));
}

#[test]
fn test_websocket_blocking_receive() {
    let entry = AppEntry::two_stage(|scope| {
        app_instance(move |receive, send| async move {
            let Some(connection) = scope.connection().cloned() else {
                return Ok(());
            };
            let websocket = WebSocket::new(connection, receive, send);
            websocket.accept(None).await?;

            let responder = websocket.clone();
            tokio::spawn(async move {
                let _ = responder.send_json(&json!({"message": "test"})).await;
            });

            match websocket.receive_json::<Value>().await {
                Err(err) if err.is_disconnect() => Ok(()),
                Err(err) => Err(err.into()),
                Ok(_) => Ok::<(), BoxError>(()),
            }
        })
    });
    let client = TestClient::from_entry(entry);

    client
        .with_websocket("/", &[], |session| {
            let data: Value = session.receive_json()?;
            assert_eq!(data, json!({"message": "test"}));
            Ok(())
        })
        .unwrap();
}

fn websocket_app() -> Router {
    async fn echo(socket: WebSocket) -> AppResult {
        let subprotocol = socket.subprotocols().first().cloned();
        socket.accept(subprotocol.as_deref()).await?;
        loop {
            match socket.receive_frame().await {
                Ok(Frame::Text(text)) => socket.send_text(format!("echo: {text}")).await?,
                Ok(Frame::Binary(data)) => socket.send_bytes(data).await?,
                Err(err) if err.is_disconnect() => return Ok(()),
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn reject(socket: WebSocket) -> AppResult {
        socket.close(CloseCode::PolicyViolation).await?;
        Ok(())
    }

    async fn goodbye(socket: WebSocket) -> AppResult {
        socket.accept(None).await?;
        socket.send_text("bye").await?;
        socket.close(CloseCode::GoingAway).await?;
        Ok(())
    }

    async fn binary(socket: WebSocket) -> AppResult {
        socket.accept(None).await?;
        socket.send_bytes(Bytes::from_static(b"\x00\x01")).await?;
        socket.close(CloseCode::Normal).await?;
        Ok(())
    }

    async fn failing(socket: WebSocket) -> AppResult {
        socket.accept(None).await?;
        Err("websocket handler failed".into())
    }

    Router::new()
        .websocket_route("/echo", echo)
        .unwrap()
        .websocket_route("/reject", reject)
        .unwrap()
        .websocket_route("/goodbye", goodbye)
        .unwrap()
        .websocket_route("/binary", binary)
        .unwrap()
        .websocket_route("/failing", failing)
        .unwrap()
}

#[test]
fn test_websocket_echo_with_subprotocol() {
    let client = TestClient::new(websocket_app());

    let mut session = client.websocket_connect("/echo", &["chat", "superchat"]).unwrap();
    assert_eq!(session.accepted_subprotocol(), Some("chat"));

    session.send_text("hello").unwrap();
    assert_eq!(session.receive_text().unwrap(), "echo: hello");

    session.send_bytes(Bytes::from_static(b"raw")).unwrap();
    assert_eq!(session.receive_bytes().unwrap(), Bytes::from_static(b"raw"));

    session.close(CloseCode::Normal).unwrap();
    session.close(CloseCode::Normal).unwrap();
}

#[test]
fn test_websocket_reject_before_accept() {
    let client = TestClient::new(websocket_app());

    let err = client.websocket_connect("/reject", &[]).unwrap_err();
    assert!(matches!(err, TestError::WebSocketDisconnect(_)));
    assert_eq!(err.close_code(), Some(1008));
}

#[test]
fn test_websocket_unknown_route_closes() {
    let client = TestClient::new(websocket_app());

    let err = client.websocket_connect("/nowhere", &[]).unwrap_err();
    assert_eq!(err.close_code(), Some(1000));
}

#[test]
fn test_websocket_close_code_is_sticky() {
    let client = TestClient::new(websocket_app());

    let mut session = client.websocket_connect("/goodbye", &[]).unwrap();
    assert_eq!(session.receive_text().unwrap(), "bye");

    let err = session.receive_text().unwrap_err();
    assert_eq!(err.close_code(), Some(1001));
    assert_eq!(session.close_code(), Some(1001));

    let err = session.receive_text().unwrap_err();
    assert_eq!(err.close_code(), Some(1001));
}

#[test]
fn test_websocket_send_after_application_close() {
    let app = app_fn(|scope, receive, send| async move {
        if let Scope::WebSocket(_) = scope {
            receive.receive().await;
            send.send(Message::WebSocketAccept {
                subprotocol: None,
                headers: Vec::new(),
            })
            .await?;
            send.send(Message::WebSocketClose {
                code: 1001,
                reason: None,
            })
            .await?;
            // Stay alive until the client goes away.
            while !matches!(receive.receive().await, Message::WebSocketDisconnect { .. }) {}
        }
        Ok::<(), BoxError>(())
    });
    let client = TestClient::new(app);

    let mut session = client.websocket_connect("/", &[]).unwrap();
    assert_eq!(session.receive_text().unwrap_err().close_code(), Some(1001));

    let err = session.send_text("after close").unwrap_err();
    assert!(matches!(err, TestError::WebSocketDisconnect(_)));
    assert_eq!(err.close_code(), Some(1001));
}

#[test]
fn test_websocket_send_after_client_close() {
    let client = TestClient::new(websocket_app());

    let mut session = client.websocket_connect("/echo", &[]).unwrap();
    session.close(CloseCode::Normal).unwrap();

    let err = session.send_text("after close").unwrap_err();
    assert!(matches!(
        err,
        TestError::Protocol(ProtocolError::InvalidState(_))
    ));
}

#[test]
fn test_websocket_wrong_frame_type() {
    let client = TestClient::new(websocket_app());

    let mut session = client.websocket_connect("/binary", &[]).unwrap();
    let err = session.receive_text().unwrap_err();
    assert!(matches!(
        err,
        TestError::Protocol(ProtocolError::UnexpectedMessage { .. })
    ));
}

#[test]
fn test_websocket_raw_close_message() {
    let client = TestClient::new(websocket_app());

    let mut session = client.websocket_connect("/goodbye", &[]).unwrap();
    assert!(matches!(
        session.receive().unwrap(),
        Message::WebSocketSend(Frame::Text(_))
    ));
    assert!(matches!(
        session.receive().unwrap(),
        Message::WebSocketClose { code: 1001, .. }
    ));
}

#[test]
fn test_websocket_application_error_reported_once() {
    let client = TestClient::new(websocket_app());

    let result = client.with_websocket("/failing", &[], |session| {
        let err = session.receive_text().unwrap_err();
        assert_eq!(
            err.application_error().unwrap().to_string(),
            "websocket handler failed"
        );
        session.close(CloseCode::Normal)
    });
    assert!(result.is_ok());
}

#[test]
fn test_websocket_json_round_trip() {
    async fn doubler(socket: WebSocket) -> AppResult {
        socket.accept(None).await?;
        let value: Value = socket.receive_json().await?;
        let number = value["n"].as_i64().unwrap_or_default();
        socket.send_json(&json!({"n": number * 2})).await?;
        Ok(())
    }

    let app = Router::new().websocket_route("/double", doubler).unwrap();
    let client = TestClient::new(app);

    let value: Value = client
        .with_websocket("/double", &[], |session| {
            session.send_json(&json!({"n": 21}))?;
            session.receive_json()
        })
        .unwrap();
    assert_eq!(value, json!({"n": 42}));
}

#[test]
fn test_response_headers_preserve_order_and_duplicates() {
    let app = app_fn(|_scope, _receive, send| async move {
        send.send(Message::HttpResponseStart {
            status: StatusCode::OK,
            headers: vec![
                (HeaderName::from_static("set-cookie"), HeaderValue::from_static("a=1")),
                (CONTENT_TYPE, HeaderValue::from_static("text/plain")),
                (HeaderName::from_static("set-cookie"), HeaderValue::from_static("b=2")),
            ],
        })
        .await?;
        send.send(Message::HttpResponseBody {
            body: Bytes::from_static(b"part one, "),
            more_body: true,
        })
        .await?;
        send.send(Message::HttpResponseBody {
            body: Bytes::from_static(b"part two"),
            more_body: false,
        })
        .await?;
        Ok::<(), BoxError>(())
    });

    let response = TestClient::new(app).get("/").send().unwrap();
    assert_eq!(response.header_all("set-cookie"), vec!["a=1", "b=2"]);
    assert_eq!(response.headers()[1].0, CONTENT_TYPE);
    response.assert_body_eq("part one, part two");
}

#[test]
fn test_request_disconnect_after_response() {
    let app = app_fn(|_scope, receive, send| async move {
        let _ = receive.receive().await;
        Response::text("done").send(&send).await?;
        match receive.receive().await {
            Message::HttpDisconnect => Ok::<(), BoxError>(()),
            other => Err(ProtocolError::unexpected("http.disconnect", other.kind()).into()),
        }
    });

    TestClient::new(app)
        .get("/")
        .send()
        .unwrap()
        .assert_body_eq("done");
}

#[test]
fn test_custom_method_and_bearer_token() {
    let client = TestClient::new(echo_headers());

    let response = client
        .request(Method::GET, "/")
        .bearer_token("secret")
        .send()
        .unwrap();
    let pairs: Vec<(String, String)> = response.json().unwrap();
    assert!(pairs.contains(&("authorization".to_string(), "Bearer secret".to_string())));
}

#[test]
fn test_mounted_router_receives_root_path() {
    async fn whoami(request: Request) -> AppResult<Response> {
        Ok(Response::json(&json!({
            "path": request.path(),
            "root_path": request.scope().root_path,
            "id": request.path_param("id"),
        }))?)
    }

    let users = Router::new()
        .route("/{id}", MethodRouter::new().get(whoami))
        .unwrap();
    let app = Router::new().mount("/users", users).unwrap();
    let client = TestClient::new(app);

    let response = client.get("/users/7").send().unwrap();
    response.assert_json_eq(&json!({"path": "/7", "root_path": "/users", "id": "7"}));
}

mod properties {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn header_values_reach_the_application(value in "[a-zA-Z0-9 _.-]{1,32}") {
            let client = TestClient::new(echo_headers());
            let response = client.get("/").header("x-probe", value.trim()).send().unwrap();
            let pairs: Vec<(String, String)> = response.json().unwrap();
            let probe = pairs.iter().find(|(name, _)| name == "x-probe").map(|(_, v)| v.clone());
            prop_assert_eq!(probe, Some(value.trim().to_string()));
        }
    }
}
