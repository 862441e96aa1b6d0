//! Routing and hooks example.
//!
//! Demonstrates path parameters, typed segments, an accept predicate, and
//! both hook kinds (a request decoder and a response encoder adding a
//! `Date` header).
//!
//! To run:
//! ```bash
//! cargo run --example routing
//! curl http://127.0.0.1:8080/hello/world
//! curl http://127.0.0.1:8080/user/alice/file/42
//! curl -d 'some data' http://127.0.0.1:8080/echo
//! ```

use std::sync::Arc;
use std::time::SystemTime;

use nano_http::handler::{decode_request_fn, encode_response_fn, handler_fn, Handler};
use nano_http::protocol::{Request, Response, StatusCode};
use nano_http::route::PathParams;
use nano_http::server::Server;
use tracing::info;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    let mut server = Server::builder().address("127.0.0.1:8080").max_body_size(1024 * 1024).build();

    server.get("/hello/{name}", |params, _req| async move {
        let name = params.get("name").unwrap_or("world").to_string();
        Ok(Response::with_string(format!("hello {name}\n")))
    });

    server.get("/user/{name}/file/{id:int}", |params: PathParams, _req| async move {
        let name = params.get("name").unwrap().to_string();
        let id = params.get_int("id").unwrap();
        Ok(Response::with_string(format!("file {id} of {name}\n")))
    });

    server.post("/echo", |_params, req| async move { Ok(Response::with_string(req.into_body())) });

    // an accept predicate rejects pre-body, before any payload is read
    server.add_path_handler(
        None,
        "/admin/{action}",
        Some(Box::new(|req: &Request<()>| match req.headers().get("Authorization") {
            Some(_) => Ok(()),
            None => Err((StatusCode::FORBIDDEN, "authorization required".to_string())),
        })),
        |params| {
            let action = params.get("action")?.to_string();
            Some(Arc::new(handler_fn(move |_req| {
                let action = action.clone();
                async move { Ok(Response::with_string(format!("did {action}\n"))) }
            })) as Arc<dyn Handler>)
        },
    );

    // a decoder hook observing every request before its body is read
    server.add_decode_request(decode_request_fn(|req: &mut Request<()>| {
        info!(target = req.target(), "inbound request");
        None
    }));

    // an encoder hook stamping every response with a Date header
    server.add_encode_response(encode_response_fn(|_req, mut resp: Response| {
        resp.headers_mut().set("Date", httpdate::fmt_http_date(SystemTime::now()));
        resp
    }));

    server.run().await.unwrap();
}
