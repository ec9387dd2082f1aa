//! TCP server implementation.

use crate::error::ServerError;
use crate::handler::MessageHandler;
use docwire_protocol::{Decoder, DEFAULT_PORT};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(Ipv4Addr::LOCALHOST.into(), DEFAULT_PORT),
            max_connections: 1000,
        }
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub frames_total: AtomicU64,
    pub errors_total: AtomicU64,
}

/// TCP front door server.
pub struct Server {
    config: ServerConfig,
    handler: Arc<MessageHandler>,
    stats: Arc<ServerStats>,
    shutdown: broadcast::Sender<()>,
    running: AtomicBool,
}

impl Server {
    /// Creates a new server.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            handler: Arc::new(MessageHandler::new()),
            stats: Arc::new(ServerStats::default()),
            shutdown: shutdown_tx,
            running: AtomicBool::new(false),
        }
    }

    /// Runs the accept loop until a shutdown signal arrives.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.running.store(true, Ordering::SeqCst);
        tracing::info!("Server listening on {}", self.config.bind_addr);

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.stats.connections_active.load(Ordering::Relaxed)
                                >= self.config.max_connections as u64
                            {
                                tracing::warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
                            self.stats.connections_active.fetch_add(1, Ordering::Relaxed);

                            let handler = self.handler.clone();
                            let stats = self.stats.clone();
                            let mut conn_shutdown = self.shutdown.subscribe();

                            tokio::spawn(async move {
                                let result = Self::handle_connection(
                                    stream,
                                    addr,
                                    handler,
                                    stats.clone(),
                                    &mut conn_shutdown,
                                )
                                .await;

                                if let Err(e) = result {
                                    tracing::debug!("Connection {} error: {}", addr, e);
                                    stats.errors_total.fetch_add(1, Ordering::Relaxed);
                                }

                                stats.connections_active.fetch_sub(1, Ordering::Relaxed);
                                tracing::info!("Client disconnected: {}", addr);
                            });
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Server shutting down");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Signals the accept loop and all connection tasks to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Returns whether the accept loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns the server's statistics.
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    /// Handles one connection's message loop to completion.
    ///
    /// Frames are processed strictly in order. A read failure or a
    /// malformed frame ends this connection only; the accept loop keeps
    /// serving others.
    async fn handle_connection<S>(
        mut stream: S,
        addr: SocketAddr,
        handler: Arc<MessageHandler>,
        stats: Arc<ServerStats>,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<(), ServerError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        tracing::info!("Client connected: {}", addr);

        let mut decoder = Decoder::new();
        let mut buf = [0u8; 8192];

        loop {
            tokio::select! {
                result = stream.read(&mut buf) => {
                    match result {
                        Ok(0) => {
                            if decoder.buffered() > 0 {
                                tracing::warn!(
                                    "[{}] connection closed mid-frame ({} bytes buffered)",
                                    addr,
                                    decoder.buffered()
                                );
                            } else {
                                tracing::debug!("[{}] connection closed by client", addr);
                            }
                            return Ok(());
                        }
                        Ok(n) => decoder.extend(&buf[..n]),
                        Err(e) => {
                            tracing::warn!("[{}] read error: {}", addr, e);
                            return Err(ServerError::Io(e));
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("[{}] shutdown signal received", addr);
                    // Messages already buffered are served before closing.
                    Self::dispatch_buffered(&mut stream, addr, &mut decoder, &handler, &stats)
                        .await?;
                    return Ok(());
                }
            }

            Self::dispatch_buffered(&mut stream, addr, &mut decoder, &handler, &stats).await?;
        }
    }

    /// Dispatches every complete frame currently in the receive buffer.
    async fn dispatch_buffered<S>(
        stream: &mut S,
        addr: SocketAddr,
        decoder: &mut Decoder,
        handler: &MessageHandler,
        stats: &ServerStats,
    ) -> Result<(), ServerError>
    where
        S: AsyncWrite + Unpin,
    {
        loop {
            let frame = match decoder.decode_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => return Ok(()),
                Err(e) if e.is_connection_fatal() => return Err(e.into()),
                Err(e) => {
                    // Framing is intact; drop the buffered bytes and let the
                    // client resynchronize with its next message.
                    tracing::warn!("[{}] discarding undecodable input: {}", addr, e);
                    decoder.clear();
                    return Ok(());
                }
            };
            stats.frames_total.fetch_add(1, Ordering::Relaxed);
            if let Some(reply) = handler.handle(&frame) {
                if let Err(e) = stream.write_all(&reply).await {
                    tracing::warn!("[{}] could not write reply: {}", addr, e);
                    return Err(ServerError::ReplyWrite(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{BufMut, Bytes, BytesMut};
    use docwire_bson::DocBuilder;
    use docwire_protocol::{Frame, OpCode, REPLY_SIZE};

    fn test_addr() -> SocketAddr {
        "127.0.0.1:1".parse().unwrap()
    }

    fn spawn_connection(
        stream: tokio::io::DuplexStream,
    ) -> (
        broadcast::Sender<()>,
        Arc<ServerStats>,
        tokio::task::JoinHandle<Result<(), ServerError>>,
    ) {
        let handler = Arc::new(MessageHandler::new());
        let stats = Arc::new(ServerStats::default());
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let task_stats = stats.clone();
        let task = tokio::spawn(async move {
            Server::handle_connection(
                stream,
                test_addr(),
                handler,
                task_stats,
                &mut shutdown_rx,
            )
            .await
        });
        (shutdown_tx, stats, task)
    }

    fn int_doc() -> Bytes {
        let mut b = DocBuilder::new();
        b.append_i32("a", 1).unwrap();
        b.finish().unwrap()
    }

    fn insert_frame(request_id: i32) -> Frame {
        let mut payload = BytesMut::new();
        payload.put_i32_le(0);
        payload.put_slice(b"test.foo\0");
        payload.put_slice(&int_doc());
        Frame::new(OpCode::Insert.as_i32(), request_id, 0, payload.freeze())
    }

    fn query_frame(request_id: i32) -> Frame {
        let mut payload = BytesMut::new();
        payload.put_i32_le(0);
        payload.put_slice(b"test.foo\0");
        payload.put_i32_le(0);
        payload.put_i32_le(10);
        payload.put_slice(&int_doc());
        Frame::new(OpCode::Query.as_i32(), request_id, 0, payload.freeze())
    }

    #[tokio::test]
    async fn test_insert_writes_nothing_back() {
        let (mut client, server_side) = tokio::io::duplex(4096);
        let (_shutdown, stats, task) = spawn_connection(server_side);

        client.write_all(&insert_frame(11).encode()).await.unwrap();
        client.shutdown().await.unwrap();

        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        assert!(out.is_empty());
        assert!(task.await.unwrap().is_ok());
        assert_eq!(stats.frames_total.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_query_gets_one_empty_reply() {
        let (mut client, server_side) = tokio::io::duplex(4096);
        let (_shutdown, _stats, task) = spawn_connection(server_side);

        client.write_all(&query_frame(77).encode()).await.unwrap();
        client.shutdown().await.unwrap();

        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        assert_eq!(out.len(), REPLY_SIZE);
        // response_to correlates to the request
        assert_eq!(i32::from_le_bytes([out[8], out[9], out[10], out[11]]), 77);
        // number_returned is zero
        assert_eq!(i32::from_le_bytes([out[32], out[33], out[34], out[35]]), 0);
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_pipelined_queries_each_get_a_reply() {
        let (mut client, server_side) = tokio::io::duplex(4096);
        let (_shutdown, stats, task) = spawn_connection(server_side);

        let mut bytes = BytesMut::new();
        bytes.extend_from_slice(&query_frame(1).encode());
        bytes.extend_from_slice(&query_frame(2).encode());
        client.write_all(&bytes).await.unwrap();
        client.shutdown().await.unwrap();

        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        assert_eq!(out.len(), REPLY_SIZE * 2);
        assert!(task.await.unwrap().is_ok());
        assert_eq!(stats.frames_total.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_short_read_closes_without_reply() {
        let (mut client, server_side) = tokio::io::duplex(4096);
        let (_shutdown, _stats, task) = spawn_connection(server_side);

        // A header promising a payload that never arrives.
        let frame = query_frame(5).encode();
        client.write_all(&frame[..16]).await.unwrap();
        client.shutdown().await.unwrap();

        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        assert!(out.is_empty());
        // The connection ends cleanly; the accept loop is unaffected.
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_malformed_length_is_connection_fatal() {
        let (mut client, server_side) = tokio::io::duplex(4096);
        let (_shutdown, _stats, task) = spawn_connection(server_side);

        let mut bytes = BytesMut::new();
        bytes.put_i32_le(5); // below header size
        bytes.put_i32_le(0);
        bytes.put_i32_le(0);
        bytes.put_i32_le(2002);
        client.write_all(&bytes).await.unwrap();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(ServerError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_buffered_frames_served_before_close() {
        // The shutdown path drains the receive buffer through this same
        // dispatch before the connection closes.
        let (mut client, mut server_side) = tokio::io::duplex(4096);
        let handler = MessageHandler::new();
        let stats = ServerStats::default();
        let mut decoder = Decoder::new();
        decoder.extend(&query_frame(9).encode());

        Server::dispatch_buffered(&mut server_side, test_addr(), &mut decoder, &handler, &stats)
            .await
            .unwrap();
        drop(server_side);

        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        assert_eq!(out.len(), REPLY_SIZE);
        assert_eq!(i32::from_le_bytes([out[8], out[9], out[10], out[11]]), 9);
        assert_eq!(stats.frames_total.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_shutdown_signal_ends_connection() {
        let (_client, server_side) = tokio::io::duplex(4096);
        let (shutdown, _stats, task) = spawn_connection(server_side);

        shutdown.send(()).unwrap();
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_server_not_running_before_start() {
        let config = ServerConfig::new("127.0.0.1:0".parse().unwrap());
        let server = Server::new(config);
        assert!(!server.is_running());
        assert_eq!(server.stats().connections_total.load(Ordering::Relaxed), 0);
    }
}
