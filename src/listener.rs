use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::net::TcpListener as TokioTcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::config::WebSocketConfig;
use crate::error::Error;
use crate::peer::{run_reader, run_writer, ListenerHandler, Peer};

/// A monotonically increasing, never-reused connection identifier.
///
/// A `u64` counter rather than a `Uuid`: the data model calls for an ordering-friendly key, not
/// global uniqueness across processes.
pub type PeerId = u64;

struct PeerEntry {
    peer: Arc<Peer>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

/// State shared between the public [`Listener`] handle, its accept task, and its reaper task.
pub(crate) struct ListenerShared {
    next_id: AtomicU64,
    peers: Mutex<HashMap<PeerId, PeerEntry>>,
    reap_notify: Notify,
    running: std::sync::atomic::AtomicBool,
}

impl ListenerShared {
    pub(crate) fn notify_disconnect(&self) {
        self.reap_notify.notify_one();
    }
}

/// Owns a bound TCP socket, accepts connections, and hands each one off to a host-supplied
/// [`ListenerHandler`] to decide whether and how to speak to it.
///
/// Accept and reap both run as ordinary Tokio tasks rather than dedicated OS threads — the
/// listener has no blocking work of its own, so collapsing its concurrency onto the async
/// runtime the host already has costs nothing and avoids a second threading model.
pub struct Listener {
    shared: Arc<ListenerShared>,
    accept_task: JoinHandle<()>,
    reaper_task: JoinHandle<()>,
}

impl Listener {
    /// Binds `addr` and starts accepting connections immediately, dispatching each one to
    /// `handler`. Returns as soon as the socket is bound; acceptance happens in the background.
    pub async fn bind<H>(addr: SocketAddr, config: WebSocketConfig, handler: H) -> Result<Self, Error>
    where
        H: ListenerHandler,
    {
        let tcp_listener = TokioTcpListener::bind(addr).await?;
        let handler: Arc<dyn ListenerHandler> = Arc::new(handler);

        let shared = Arc::new(ListenerShared {
            next_id: AtomicU64::new(1),
            peers: Mutex::new(HashMap::new()),
            reap_notify: Notify::new(),
            running: std::sync::atomic::AtomicBool::new(true),
        });

        let accept_task = tokio::spawn(accept_loop(
            tcp_listener,
            config,
            handler,
            Arc::clone(&shared),
        ));
        let reaper_task = tokio::spawn(reap_loop(Arc::clone(&shared)));

        Ok(Listener {
            shared,
            accept_task,
            reaper_task,
        })
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn peer_count(&self) -> usize {
        self.shared.peers.lock().unwrap().len()
    }

    /// Requests the named peer disconnect, if it is still live. A no-op if it is not.
    pub fn disconnect(&self, peer_id: PeerId) {
        if let Some(entry) = self.shared.peers.lock().unwrap().get(&peer_id) {
            entry.peer.disconnect();
        }
    }

    /// Stops accepting new connections and disconnects every live peer. Accept is cancelled via
    /// task abort rather than closing the listening socket — Tokio gives no portable way to
    /// interrupt an in-flight `accept()` by closing the fd out from under it, so aborting the
    /// task that owns it is the idiomatic substitute.
    pub async fn stop(self) {
        self.shared.running.store(false, Ordering::Release);
        self.accept_task.abort();
        let _ = self.accept_task.await;

        let entries: Vec<PeerEntry> = {
            let mut peers = self.shared.peers.lock().unwrap();
            peers.drain().map(|(_, entry)| entry).collect()
        };
        for entry in &entries {
            entry.peer.disconnect();
        }
        for entry in entries {
            let _ = entry.reader.await;
            let _ = entry.writer.await;
        }

        self.reaper_task.abort();
        let _ = self.reaper_task.await;
    }
}

async fn accept_loop(
    tcp_listener: TokioTcpListener,
    config: WebSocketConfig,
    handler: Arc<dyn ListenerHandler>,
    shared: Arc<ListenerShared>,
) {
    loop {
        let (mut stream, addr) = match tcp_listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                log::warn!("accept failed: {}", err);
                continue;
            }
        };

        let id = shared.next_id.fetch_add(1, Ordering::Relaxed);

        let accepted = handler.accept(&mut stream, addr, id).await;
        let (decoder, encoder) = match accepted {
            Ok(pair) => pair,
            Err(err) => {
                log::debug!("peer {} rejected during accept: {}", id, err);
                continue;
            }
        };

        let peer = Peer::new(id, addr, config.clone(), Arc::clone(&handler), Arc::downgrade(&shared));
        let (read_half, write_half) = stream.into_split();

        let reader = tokio::spawn(run_reader(Arc::clone(&peer), read_half, decoder));
        let writer = tokio::spawn(run_writer(Arc::clone(&peer), write_half, encoder));

        shared.peers.lock().unwrap().insert(
            id,
            PeerEntry {
                peer: Arc::clone(&peer),
                reader,
                writer,
            },
        );

        handler.on_connect(&peer);
    }
}

/// Watches for peers that have requested close and removes them from the live set, firing
/// `on_disconnect` once each.
async fn reap_loop(shared: Arc<ListenerShared>) {
    loop {
        shared.reap_notify.notified().await;

        let finished: Vec<(PeerId, PeerEntry)> = {
            let mut peers = shared.peers.lock().unwrap();
            let done: Vec<PeerId> = peers
                .iter()
                .filter(|(_, entry)| entry.peer.is_close_requested())
                .map(|(id, _)| *id)
                .collect();
            done.into_iter()
                .filter_map(|id| peers.remove(&id).map(|entry| (id, entry)))
                .collect()
        };

        for (_, entry) in finished {
            entry.peer.fire_on_disconnect();
            // `close_requested` only promises the peer has *asked* to stop, not that either
            // worker has actually exited yet (the reader sets it then keeps running until its
            // current iteration's socket call returns). Join both before releasing the peer.
            let _ = entry.reader.await;
            let _ = entry.writer.await;
        }
    }
}
