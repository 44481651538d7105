#![allow(dead_code)]

use std::convert::Infallible;
use std::net::TcpListener;
use std::sync::Arc;

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use serde_json::{json, Value};

/// Serve `handler` on a random local port. Returns the base URL.
///
/// The handler also receives the base URL so it can build `Link` headers.
pub fn spawn_stub<F>(handler: F) -> String
where
    F: Fn(&Request<Body>, &str) -> Response<Body> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let handler = Arc::new(handler);

    let served_base = base.clone();
    let make_svc = make_service_fn(move |_conn| {
        let handler = handler.clone();
        let base = served_base.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                let resp = handler(&req, &base);
                async move { Ok::<_, Infallible>(resp) }
            }))
        }
    });
    let server = Server::from_tcp(listener).unwrap().serve(make_svc);
    tokio::spawn(server);
    base
}

pub fn json_response(status: StatusCode, body: &Value) -> Response<Body> {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn status(status: StatusCode) -> Response<Body> {
    Response::builder().status(status).body(Body::empty()).unwrap()
}

pub fn bearer(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

pub fn repo(owner: &str, name: &str) -> Value {
    json!({
        "id": name.len(),
        "name": name,
        "full_name": format!("{owner}/{name}"),
        "html_url": format!("https://github.com/{owner}/{name}"),
        "description": format!("{name} description"),
        "private": false,
        "fork": false,
        "language": "Rust",
        "stargazers_count": 3,
        "watchers_count": 3,
        "forks_count": 1,
        "open_issues_count": 0,
        "owner": {"login": owner, "id": 1},
        "license": {"spdx_id": "MIT", "name": "MIT License"}
    })
}

/// A repository payload without an `owner` object.
pub fn ownerless_repo(owner: &str, name: &str) -> Value {
    let mut repo = repo(owner, name);
    if let Some(fields) = repo.as_object_mut() {
        fields.remove("owner");
    }
    repo
}

/// A GitHub lookalike that accepts the token `good` and knows `octocat`
/// (two repositories over two pages, the second without an owner) and
/// `empty` (no repositories).
pub fn github_stub() -> String {
    spawn_stub(|req, base| {
        if bearer(req) != Some("good") {
            return status(StatusCode::UNAUTHORIZED);
        }
        let page = req.uri().query().unwrap_or("");
        match req.uri().path() {
            "/user" => json_response(StatusCode::OK, &json!({"login": "octocat"})),
            "/users/octocat" | "/users/empty" => json_response(StatusCode::OK, &json!({})),
            "/users/octocat/repos" if page == "page=2" => {
                json_response(StatusCode::OK, &json!([ownerless_repo("octocat", "linguist")]))
            }
            "/users/octocat/repos" => {
                let mut resp = json_response(StatusCode::OK, &json!([repo("octocat", "hello-world")]));
                let link = format!(
                    "<{base}/users/octocat/repos?page=2>; rel=\"next\", <{base}/users/octocat/repos?page=2>; rel=\"last\""
                );
                resp.headers_mut().insert("link", link.parse().unwrap());
                resp
            }
            "/users/empty/repos" => json_response(StatusCode::OK, &json!([])),
            _ => json_response(StatusCode::NOT_FOUND, &json!({"message": "Not Found"})),
        }
    })
}
