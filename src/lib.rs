//! A minimal, embeddable HTTP/1.1 origin server.
//!
//! `nano_http` accepts TCP connections, parses requests (including chunked
//! bodies), dispatches them through a pluggable handler pipeline, and writes
//! responses, optionally as chunked streams. It deliberately stops there:
//! no TLS, no HTTP/2, no static file serving. The embedding application owns
//! those layers.
//!
//! # Example
//!
//! ```no_run
//! use nano_http::protocol::Response;
//! use nano_http::server::Server;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut server = Server::builder().address("127.0.0.1:8080").build();
//!
//!     server.get("/hello/{name}", |params, _req| async move {
//!         let name = params.get("name").unwrap_or("world").to_string();
//!         Ok(Response::with_string(format!("hi {name}\n")))
//!     });
//!
//!     server.run().await.unwrap();
//! }
//! ```

pub mod buffer;
pub mod codec;
pub mod connection;
pub mod debug;
pub mod handler;
pub mod protocol;
pub mod route;
pub mod server;

pub(crate) use help::ensure;

mod help {

    macro_rules! ensure {
        ($predicate:expr, $error:expr) => {
            if !$predicate {
                return Err($error);
            }
        };
    }
    pub(crate) use ensure;
}
