//! WebSocket echo server for probe tests.
//!
//! Provides a TestServer that listens on a random loopback port and delivers
//! every text message according to a configurable fan-out.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use wsprobe::{Endpoint, FanOut};

type Peers = Arc<Mutex<Vec<(u64, mpsc::UnboundedSender<Message>)>>>;

/// Delivery behaviour of a [`TestServer`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerOptions {
    pub fan_out: FanOut,
    pub corrupt: bool,
}

impl ServerOptions {
    pub fn fan_out(fan_out: FanOut) -> Self {
        Self {
            fan_out,
            corrupt: false,
        }
    }

    pub fn corrupting() -> Self {
        Self {
            fan_out: FanOut::broadcast(),
            corrupt: true,
        }
    }
}

pub struct TestServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Spawn a server that echoes to the sender and relays to everyone else.
    pub async fn spawn() -> (Self, SocketAddr) {
        Self::spawn_with(ServerOptions::default()).await
    }

    pub async fn spawn_with(options: ServerOptions) -> (Self, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let peers: Peers = Arc::new(Mutex::new(Vec::new()));

        let handle = tokio::spawn(async move {
            let mut connections = JoinSet::new();
            let mut next_id = 0u64;
            while let Ok((stream, _)) = listener.accept().await {
                connections.spawn(serve(stream, next_id, peers.clone(), options));
                next_id += 1;
            }
        });

        (Self { addr, handle }, addr)
    }

    pub fn endpoint(&self) -> Endpoint {
        super::endpoint(self.addr)
    }

    /// Stop accepting and drop every connection.
    pub async fn shutdown(self) {
        self.handle.abort();
        let _ = self.handle.await;
    }
}

async fn serve(stream: TcpStream, id: u64, peers: Peers, options: ServerOptions) {
    let (tx, mut rx) = mpsc::unbounded_channel();

    // Register before the handshake response goes out, so a relay sent right
    // after the client sees the upgrade already reaches this connection.
    let register = {
        let peers = peers.clone();
        move |_req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            peers.lock().unwrap().push((id, tx));
            Ok(resp)
        }
    };

    let Ok(ws) = accept_hdr_async(stream, register).await else {
        unregister(&peers, id);
        return;
    };
    let (mut write, mut read) = ws.split();

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if write.send(msg).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = read.next().await {
        match msg {
            Message::Text(text) => {
                let text = if options.corrupt {
                    format!("{text}\u{fffd}")
                } else {
                    text
                };
                for (peer, tx) in peers.lock().unwrap().iter() {
                    let wanted = if *peer == id {
                        options.fan_out.self_echo
                    } else {
                        options.fan_out.relay
                    };
                    if wanted {
                        let _ = tx.send(Message::Text(text.clone()));
                    }
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    unregister(&peers, id);
    writer.abort();
}

fn unregister(peers: &Peers, id: u64) {
    peers.lock().unwrap().retain(|(peer, _)| *peer != id);
}
