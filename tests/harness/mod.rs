//! Test harness utilities for probing a local echo endpoint.
//!
//! Spawns loopback WebSocket servers whose delivery pattern can be chosen per
//! test, so probes run without touching the public network.

#![allow(dead_code)]

mod server;

pub use server::{ServerOptions, TestServer};

use std::net::SocketAddr;

use wsprobe::Endpoint;

/// An address nothing is listening on.
pub async fn unused_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// `ws://` endpoint for `addr`.
pub fn endpoint(addr: SocketAddr) -> Endpoint {
    Endpoint::parse(format!("ws://{addr}")).unwrap()
}
