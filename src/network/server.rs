//! TCP Transport
//!
//! One task per connection reads bytes, reassembles frames, decodes requests
//! and forwards them as [`Action`]s to the authoritative loop. The same task
//! writes whatever the loop queues on the connection's outbound channel.
//! Socket tasks never touch game state.

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, instrument, warn};

use crate::network::packet::{FrameDecoder, ProtocolError};
use crate::network::protocol::{ClientRequest, DecodeOutcome};

/// Connection slot index.
pub type SlotId = u32;

/// Outbound frame channel of one connection.
pub type Outbound = mpsc::UnboundedSender<Bytes>;

/// Work marshalled from socket tasks to the loop.
#[derive(Debug)]
pub enum Action {
    /// A slot got a connection; frames for it go to `outbound`.
    Connected { slot: SlotId, outbound: Outbound },
    /// Decoded request.
    Request { slot: SlotId, request: ClientRequest },
    /// Connection is gone. Sent exactly once per `Connected`.
    Disconnected { slot: SlotId },
}

/// Transport errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// The loop stopped consuming actions.
    #[error("Action queue closed")]
    QueueClosed,
}

// =============================================================================
// SLOT POOL
// =============================================================================

/// Fixed pool of connection slots.
#[derive(Debug)]
pub struct SlotPool {
    free: Mutex<BTreeSet<SlotId>>,
    capacity: usize,
}

impl SlotPool {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            free: Mutex::new((0..capacity as SlotId).collect()),
            capacity,
        })
    }

    /// Take the lowest free slot.
    pub fn acquire(self: &Arc<Self>) -> Option<SlotGuard> {
        let mut free = self.free.lock().unwrap_or_else(|e| e.into_inner());
        let slot = *free.iter().next()?;
        free.remove(&slot);
        Some(SlotGuard {
            slot,
            pool: Arc::clone(self),
        })
    }

    pub fn available(&self) -> usize {
        self.free.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn release(&self, slot: SlotId) {
        self.free.lock().unwrap_or_else(|e| e.into_inner()).insert(slot);
    }
}

/// Held slot; released on drop.
#[derive(Debug)]
pub struct SlotGuard {
    slot: SlotId,
    pool: Arc<SlotPool>,
}

impl SlotGuard {
    pub fn slot(&self) -> SlotId {
        self.slot
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.pool.release(self.slot);
    }
}

// =============================================================================
// SERVER
// =============================================================================

/// The TCP listener side.
pub struct GameServer {
    bind_addr: SocketAddr,
    pool: Arc<SlotPool>,
    actions: mpsc::UnboundedSender<Action>,
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a server forwarding actions to `actions`.
    pub fn new(bind_addr: SocketAddr, pool_size: usize, actions: mpsc::UnboundedSender<Action>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            bind_addr,
            pool: SlotPool::new(pool_size),
            actions,
            shutdown_tx,
        }
    }

    /// Bind and serve until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(&self.bind_addr).await?;
        info!("Game server listening on {}", self.bind_addr);
        self.serve(listener).await
    }

    /// Serve on an already bound listener.
    #[instrument(skip_all)]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => self.handle_connection(stream, addr),
                        Err(e) => error!("Accept error: {}", e),
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
            if self.actions.is_closed() {
                return Err(ServerError::QueueClosed);
            }
        }

        Ok(())
    }

    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let guard = match self.pool.acquire() {
            Some(guard) => guard,
            None => {
                warn!("Connection pool exhausted, rejecting {}", addr);
                return;
            }
        };
        info!(slot = guard.slot(), "New connection from {}", addr);

        let actions = self.actions.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(run_connection(stream, addr, guard, actions, shutdown_rx));
    }

    /// Signal the listener and every connection to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    pub fn free_slots(&self) -> usize {
        self.pool.available()
    }
}

/// Per-connection task: read, reassemble, decode, forward; write outbound.
async fn run_connection(
    stream: TcpStream,
    addr: SocketAddr,
    guard: SlotGuard,
    actions: mpsc::UnboundedSender<Action>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let slot = guard.slot();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Bytes>();
    if actions.send(Action::Connected { slot, outbound }).is_err() {
        return;
    }

    let (mut reader, mut writer) = stream.into_split();
    let mut decoder = FrameDecoder::default();

    loop {
        tokio::select! {
            read = reader.read_buf(decoder.read_target()) => {
                match read {
                    Ok(0) => {
                        debug!(slot, "Client {} closed the connection", addr);
                        break;
                    }
                    Ok(_) => {
                        if let Err(e) = forward_frames(&mut decoder, slot, &actions) {
                            warn!(slot, "Protocol error from {}: {}", addr, e);
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(slot, "Read error from {}: {}", addr, e);
                        break;
                    }
                }
            }
            frame = outbound_rx.recv() => {
                match frame {
                    Some(bytes) => {
                        if let Err(e) = writer.write_all(&bytes).await {
                            warn!(slot, "Write to {} failed: {}", addr, e);
                        }
                    }
                    // Loop dropped the sender: server-side disconnect
                    None => break,
                }
            }
            _ = shutdown_rx.recv() => break,
        }
    }

    let _ = actions.send(Action::Disconnected { slot });
    drop(guard);
    info!(slot, "Client {} cleaned up", addr);
}

/// Decode every buffered frame and forward the requests.
///
/// Requests that arrived ahead of a malformed frame are forwarded before
/// the error is returned.
fn forward_frames(
    decoder: &mut FrameDecoder,
    slot: SlotId,
    actions: &mpsc::UnboundedSender<Action>,
) -> Result<(), ProtocolError> {
    let (frames, framing_error) = decoder.drain_frames();
    for frame in frames {
        match ClientRequest::decode(&frame)? {
            DecodeOutcome::Request(request) => {
                let _ = actions.send(Action::Request { slot, request });
            }
            DecodeOutcome::Unhandled(tag) => {
                warn!(slot, tag, "Unhandled request type");
            }
        }
    }
    match framing_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    use crate::game::state::MatchMode;
    use crate::network::packet::encode_frame;
    use crate::network::protocol::{LogInRequest, PutPlayerIntoQueueRequest};

    async fn start(pool_size: usize) -> (Arc<GameServer>, SocketAddr, mpsc::UnboundedReceiver<Action>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Arc::new(GameServer::new(addr, pool_size, tx));
        let serving = Arc::clone(&server);
        tokio::spawn(async move { serving.serve(listener).await });
        (server, addr, rx)
    }

    async fn next_action(rx: &mut mpsc::UnboundedReceiver<Action>) -> Action {
        timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap()
    }

    #[test]
    fn test_slot_pool_releases_on_drop() {
        let pool = SlotPool::new(2);
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert_eq!((a.slot(), b.slot()), (0, 1));
        assert!(pool.acquire().is_none());

        drop(a);
        assert_eq!(pool.available(), 1);
        assert_eq!(pool.acquire().unwrap().slot(), 0);
        assert_eq!(pool.capacity(), 2);
    }

    #[tokio::test]
    async fn test_connection_lifecycle() {
        let (server, addr, mut rx) = start(4).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        let outbound = match next_action(&mut rx).await {
            Action::Connected { slot, outbound } => {
                assert_eq!(slot, 0);
                outbound
            }
            other => panic!("unexpected {:?}", other),
        };

        // Request split across two writes
        let bytes = ClientRequest::LogIn(LogInRequest { player_id: None, name: "ada".into() })
            .encode()
            .unwrap();
        client.write_all(&bytes[..3]).await.unwrap();
        client.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        client.write_all(&bytes[3..]).await.unwrap();

        match next_action(&mut rx).await {
            Action::Request { slot: 0, request: ClientRequest::LogIn(req) } => assert_eq!(req.name, "ada"),
            other => panic!("unexpected {:?}", other),
        }

        // Outbound frames reach the client untouched
        let reply = encode_frame(3, b"ok");
        outbound.send(reply.clone()).unwrap();
        let mut received = vec![0u8; reply.len()];
        timeout(Duration::from_secs(5), client.read_exact(&mut received)).await.unwrap().unwrap();
        assert_eq!(&received[..], &reply[..]);

        drop(client);
        assert!(matches!(next_action(&mut rx).await, Action::Disconnected { slot: 0 }));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(server.free_slots(), 4);
    }

    #[tokio::test]
    async fn test_unknown_tag_keeps_connection() {
        let (_server, addr, mut rx) = start(1).await;
        let mut client = TcpStream::connect(addr).await.unwrap();
        assert!(matches!(next_action(&mut rx).await, Action::Connected { .. }));

        client.write_all(&encode_frame(555, b"")).await.unwrap();
        let queue = ClientRequest::Queue(PutPlayerIntoQueueRequest { mode: MatchMode::Versus });
        client.write_all(&queue.encode().unwrap()).await.unwrap();

        match next_action(&mut rx).await {
            Action::Request { request, .. } => assert_eq!(request, queue),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_frame_disconnects() {
        let (server, addr, mut rx) = start(1).await;
        let mut client = TcpStream::connect(addr).await.unwrap();
        assert!(matches!(next_action(&mut rx).await, Action::Connected { .. }));

        client.write_all(&0i32.to_le_bytes()).await.unwrap();
        assert!(matches!(next_action(&mut rx).await, Action::Disconnected { slot: 0 }));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(server.free_slots(), 1);
    }

    #[test]
    fn test_requests_ahead_of_bad_frame_are_forwarded() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let queue = ClientRequest::Queue(PutPlayerIntoQueueRequest { mode: MatchMode::Practice });
        let mut decoder = FrameDecoder::default();
        decoder.extend(&queue.encode().unwrap());
        decoder.extend(&0i32.to_le_bytes());

        let result = forward_frames(&mut decoder, 3, &tx);
        assert!(matches!(result, Err(ProtocolError::InvalidLength(0))));
        match rx.try_recv() {
            Ok(Action::Request { slot: 3, request }) => assert_eq!(request, queue),
            other => panic!("unexpected {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_pool_exhaustion_rejects() {
        let (_server, addr, mut rx) = start(1).await;
        let _first = TcpStream::connect(addr).await.unwrap();
        assert!(matches!(next_action(&mut rx).await, Action::Connected { .. }));

        let mut second = TcpStream::connect(addr).await.unwrap();
        let mut buf = [0u8; 1];
        let read = timeout(Duration::from_secs(5), second.read(&mut buf)).await.unwrap();
        assert!(matches!(read, Ok(0) | Err(_)));
    }

    #[tokio::test]
    async fn test_dropping_outbound_disconnects() {
        let (_server, addr, mut rx) = start(1).await;
        let _client = TcpStream::connect(addr).await.unwrap();
        let outbound = match next_action(&mut rx).await {
            Action::Connected { outbound, .. } => outbound,
            other => panic!("unexpected {:?}", other),
        };

        drop(outbound);
        assert!(matches!(next_action(&mut rx).await, Action::Disconnected { slot: 0 }));
    }
}
