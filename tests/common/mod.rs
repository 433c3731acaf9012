//! Shared test utilities for running against a local echo server.
//!
//! The server implements just the endpoints the test suite needs. Set
//! `ZENSCHEMA_TEST_BASE_URL` to point the suite at another server.

#![allow(dead_code)]

use std::{io::Cursor, io::Read, thread};

use once_cell::sync::OnceCell;
use serde_json::{Map, Value, json};
use tiny_http::{Header, Request, Response, Server, StatusCode};
use url::Url;

#[derive(Debug)]
pub struct TestServer {
    base: String,
    // Keep the thread alive for the duration of the tests.
    _thread: thread::JoinHandle<()>,
}

/// Base URL of the test server.
pub fn server_base() -> String {
    if let Ok(base) = std::env::var("ZENSCHEMA_TEST_BASE_URL") {
        return base.trim_end_matches('/').to_string();
    }
    test_server().base.clone()
}

/// Full URL against the test server. Template braces are kept as written.
pub fn server_url(path: &str) -> String {
    format!("{}/{}", server_base(), path.trim_start_matches('/'))
}

pub fn test_server() -> &'static TestServer {
    static INSTANCE: OnceCell<TestServer> = OnceCell::new();
    INSTANCE.get_or_init(TestServer::start)
}

impl TestServer {
    fn start() -> Self {
        let server = Server::http("127.0.0.1:0").expect("start test server");
        let base = format!("http://{}", server.server_addr());
        let thread = thread::spawn(move || run_server(&server));

        Self {
            base,
            _thread: thread,
        }
    }
}

fn run_server(server: &Server) {
    for mut request in server.incoming_requests() {
        let response = handle_request(&mut request);
        let _ = request.respond(response);
    }
}

fn handle_request(request: &mut Request) -> Response<Cursor<Vec<u8>>> {
    // tiny_http only provides the path/query, so prefix with a dummy scheme/host.
    let url = Url::parse(&format!("http://localhost{}", request.url())).unwrap();
    let path = url.path().to_string();

    match path.as_str() {
        "/anything" => echo(request, &url),
        "/text" => text_response(StatusCode(200), "plain text body"),
        "/html" => text_response(StatusCode(200), "<html><body>not json</body></html>"),
        "/redirect" => Response::from_string("redirect")
            .with_status_code(StatusCode(302))
            .with_header(Header::from_bytes("Location", "/todos/1").unwrap()),
        _ => {
            if let Some(id) = path.strip_prefix("/todos/") {
                return handle_todo(id);
            }
            if let Some(code) = path.strip_prefix("/status/") {
                let status = code.parse::<u16>().unwrap_or(400);
                return text_response(StatusCode(status), format!("status {status}"));
            }
            text_response(StatusCode(404), format!("no route for {path}"))
        }
    }
}

fn handle_todo(id: &str) -> Response<Cursor<Vec<u8>>> {
    let Ok(id) = id.parse::<u64>() else {
        return json_response(StatusCode(404), &json!({"error": "not found"}));
    };
    // Odd ids come back with a malformed `completed` field.
    let completed = if id % 2 == 0 {
        json!(true)
    } else {
        json!("no")
    };
    json_response(
        StatusCode(200),
        &json!({
            "userId": 1,
            "id": id,
            "title": format!("todo {id}"),
            "completed": completed,
        }),
    )
}

/// Echo the request back as JSON.
fn echo(request: &mut Request, url: &Url) -> Response<Cursor<Vec<u8>>> {
    let mut body = String::new();
    let _ = request.as_reader().read_to_string(&mut body);

    let query: Map<String, Value> = url
        .query_pairs()
        .map(|(key, value)| (key.into_owned(), Value::from(value.into_owned())))
        .collect();
    let headers: Map<String, Value> = request
        .headers()
        .iter()
        .map(|header| {
            (
                header.field.to_string().to_ascii_lowercase(),
                Value::from(String::from_utf8_lossy(header.value.as_ref()).into_owned()),
            )
        })
        .collect();

    json_response(
        StatusCode(200),
        &json!({
            "method": request.method().to_string(),
            "path": url.path(),
            "query": query,
            "headers": headers,
            "body": body,
        }),
    )
}

fn json_response(status: StatusCode, body: &Value) -> Response<Cursor<Vec<u8>>> {
    let content_type = Header::from_bytes("Content-Type", "application/json").unwrap();
    Response::from_string(body.to_string())
        .with_status_code(status)
        .with_header(content_type)
}

fn text_response(status: StatusCode, body: impl Into<String>) -> Response<Cursor<Vec<u8>>> {
    let content_type = Header::from_bytes("Content-Type", "text/plain").unwrap();
    Response::from_string(body.into())
        .with_status_code(status)
        .with_header(content_type)
}
