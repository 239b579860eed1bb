use std::collections::HashMap;
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use roswire_core::error::{CoreError, Result};
use roswire_core::gate::PeerGate;
use roswire_core::naming;

use crate::header;
use crate::message::Message;
use crate::support::log_core_error;
use crate::wire;

/// Emitted when a subscriber link completes its header exchange or goes
/// away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Attached { caller_id: String },
    Detached { caller_id: String },
}

/// Frames queued per link before the link is considered stuck and dropped.
const LINK_QUEUE_DEPTH: usize = 64;

struct Link {
    id: u64,
    tx: mpsc::Sender<Arc<Vec<u8>>>,
}

struct PubShared {
    topic: String,
    caller_id: String,
    latching: bool,
    gate: PeerGate,
    links: Mutex<Vec<Link>>,
    latched: Mutex<Option<Arc<Vec<u8>>>>,
    // broadcast is used so link bookkeeping never blocks on a slow
    // listener; lagging receivers drop old events rather than stalling.
    events: broadcast::Sender<LinkEvent>,
    next_link_id: AtomicU64,
}

/// TCPROS topic publisher.
///
/// Accepts subscriber links on its own listener task and fans each sent
/// message out to every attached link. A link that cannot keep up is
/// dropped; the publisher itself never blocks in `send`.
pub struct Publisher<T: Message> {
    shared: Arc<PubShared>,
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
    phantom: PhantomData<T>,
}

impl<T: Message> Publisher<T> {
    /// Bind a listener for `topic`.
    ///
    /// With `latching`, the most recently sent message is delivered to
    /// each newly attached link.
    pub async fn bind(addr: &str, topic: &str, caller_id: &str, latching: bool) -> Result<Self> {
        naming::validate(topic)?;
        naming::validate(caller_id)?;

        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let (events, _rx) = broadcast::channel(32);

        let shared = Arc::new(PubShared {
            topic: topic.to_string(),
            caller_id: caller_id.to_string(),
            latching,
            gate: PeerGate::new(),
            links: Mutex::new(Vec::new()),
            latched: Mutex::new(None),
            events,
            next_link_id: AtomicU64::new(0),
        });

        info!(topic, %local_addr, latching, "topic listening");
        let accept_task = tokio::spawn(accept_loop::<T>(listener, Arc::clone(&shared)));

        Ok(Self {
            shared,
            local_addr,
            accept_task,
            phantom: PhantomData,
        })
    }

    pub fn topic(&self) -> &str {
        &self.shared.topic
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The `tcpros://` URI subscribers connect to.
    pub fn uri(&self) -> String {
        format!("tcpros://{}", self.local_addr)
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.gate.peer_count()
    }

    /// Subscribe to link attach/detach events.
    pub fn subscribe_link_events(&self) -> broadcast::Receiver<LinkEvent> {
        self.shared.events.subscribe()
    }

    /// Send a message to every attached link.
    ///
    /// Returns:
    /// - Ok(true): handed to at least one link
    /// - Ok(false): suppressed because no link is attached
    /// - Err(_): encoding failure
    ///
    /// A latched publisher still records the message while suppressed.
    pub fn send(&self, msg: &T) -> Result<bool> {
        let frame = Arc::new(wire::encode_framed(msg)?);

        if self.shared.latching {
            *lock(&self.shared.latched, "latched message") = Some(Arc::clone(&frame));
        }

        if !self.shared.gate.has_peers() {
            return Ok(false);
        }

        let mut links = lock(&self.shared.links, "subscriber links");
        let mut delivered = false;
        links.retain(|link| match link.tx.try_send(Arc::clone(&frame)) {
            Ok(()) => {
                delivered = true;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                // Dropping the sender ends the link task, which does the
                // gate/event bookkeeping on its way out.
                warn!(topic = %self.shared.topic, "subscriber link stalled; dropping link");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });

        Ok(delivered)
    }
}

impl<T: Message> Drop for Publisher<T> {
    fn drop(&mut self) {
        self.accept_task.abort();
        // Closing the queues lets every link task run down.
        lock(&self.shared.links, "subscriber links").clear();
    }
}

fn lock<'a, V>(mutex: &'a Mutex<V>, what: &'static str) -> MutexGuard<'a, V> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poison) => {
            warn!("{what} mutex poisoned");
            poison.into_inner()
        }
    }
}

async fn accept_loop<T: Message>(listener: TcpListener, shared: Arc<PubShared>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!(%peer, topic = %shared.topic, "subscriber connection accepted");
                let shared = Arc::clone(&shared);
                tokio::spawn(async move {
                    if let Err(err) = handle_link::<T>(stream, shared).await {
                        log_core_error(err);
                    }
                });
            }
            Err(err) => {
                warn!(topic = %shared.topic, "topic accept failed: {err}");
            }
        }
    }
}

async fn handle_link<T: Message>(mut stream: TcpStream, shared: Arc<PubShared>) -> Result<()> {
    let fields = header::read(&mut stream).await?;
    if let Err(err) = validate_subscriber::<T>(&fields, &shared.topic) {
        header::write(&mut stream, &header::error_fields(&err.message)).await?;
        return Err(err);
    }
    let sub_caller_id = header::require(&fields, "callerid")?.to_string();

    let mut reply = HashMap::new();
    reply.insert("callerid".to_string(), shared.caller_id.clone());
    reply.insert("topic".to_string(), shared.topic.clone());
    reply.insert("md5sum".to_string(), T::md5sum().to_string());
    reply.insert("type".to_string(), T::msg_type().to_string());
    reply.insert(
        "latching".to_string(),
        if shared.latching { "1" } else { "0" }.to_string(),
    );
    header::write(&mut stream, &reply).await?;

    let (tx, mut rx) = mpsc::channel(LINK_QUEUE_DEPTH);

    // Seed the latched message before registering so it is first in line.
    if let Some(frame) = lock(&shared.latched, "latched message").clone() {
        let _ = tx.try_send(frame);
    }

    let id = shared.next_link_id.fetch_add(1, Ordering::Relaxed);
    lock(&shared.links, "subscriber links").push(Link {
        id,
        tx,
    });
    shared.gate.attach();
    let _ = shared.events.send(LinkEvent::Attached {
        caller_id: sub_caller_id.clone(),
    });
    info!(topic = %shared.topic, subscriber = %sub_caller_id, "subscriber link attached");

    let (mut rd, mut wr) = stream.into_split();
    let mut drain = [0u8; 64];
    let outcome: Result<()> = loop {
        tokio::select! {
            queued = rx.recv() => match queued {
                Some(frame) => {
                    if let Err(err) = wr.write_all(&frame).await {
                        break Err(err.into());
                    }
                }
                // Publisher dropped us (stall or shutdown).
                None => break Ok(()),
            },
            read = rd.read(&mut drain) => match read {
                // Subscriber closed its end.
                Ok(0) => break Ok(()),
                // Subscribers send nothing after the header; ignore noise.
                Ok(_) => {}
                Err(err) => break Err(err.into()),
            },
        }
    };

    lock(&shared.links, "subscriber links").retain(|link| link.id != id);
    shared.gate.detach();
    let _ = shared.events.send(LinkEvent::Detached {
        caller_id: sub_caller_id.clone(),
    });
    debug!(topic = %shared.topic, subscriber = %sub_caller_id, "subscriber link detached");

    outcome
}

fn validate_subscriber<T: Message>(
    fields: &HashMap<String, String>,
    topic: &str,
) -> Result<()> {
    header::require(fields, "callerid")?;

    let requested = header::require(fields, "topic")?;
    if requested != topic {
        return Err(CoreError::header_mismatch("topic"));
    }

    header::match_field(fields, "md5sum", T::md5sum())?;
    header::match_field(fields, "type", T::msg_type())
}
