//! Streamed response example.
//!
//! The handler returns a body of unknown length, which goes out with
//! chunked transfer encoding, one chunk per refill.
//!
//! To run:
//! ```bash
//! cargo run --example streaming
//! curl -N http://127.0.0.1:8080/ticks
//! ```

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use nano_http::protocol::{BodyStream, Response};
use nano_http::server::Server;

/// Emits ten numbered lines, one per second.
struct Ticks {
    remaining: u32,
}

#[async_trait]
impl BodyStream for Ticks {
    async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
        self.remaining -= 1;
        Ok(Some(Bytes::from(format!("tick {}\n", self.remaining))))
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    let mut server = Server::builder().address("127.0.0.1:8080").build();

    server.get("/ticks", |_params, _req| async {
        Ok(Response::with_stream(Ticks { remaining: 10 }))
    });

    server.run().await.unwrap();
}
