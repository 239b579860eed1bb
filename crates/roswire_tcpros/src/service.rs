use std::collections::HashMap;
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use roswire_core::codec::RosMsg;
use roswire_core::error::{CoreError, ErrorKind, Result};
use roswire_core::gate::PeerGate;
use roswire_core::naming;

use crate::header;
use crate::message::{ServicePair, ServiceResult};
use crate::support::log_core_error;
use crate::wire;

/// TCPROS service server.
///
/// Owns a listener task; each accepted connection validates its header,
/// then serves framed requests until the client disconnects. Dropping the
/// server stops accepting new connections.
pub struct ServiceServer<T: ServicePair> {
    service: String,
    local_addr: SocketAddr,
    gate: Arc<PeerGate>,
    accept_task: JoinHandle<()>,
    phantom: PhantomData<T>,
}

struct ServerCtx<T: ServicePair, F> {
    service: String,
    caller_id: String,
    max_frame_len: u32,
    handler: F,
    gate: Arc<PeerGate>,
    phantom: PhantomData<fn() -> T>,
}

impl<T: ServicePair> ServiceServer<T> {
    /// Bind a listener and start serving `service` with `handler`.
    ///
    /// The handler returning `Err(text)` is a domain-level refusal relayed
    /// to the caller; it does not close the connection.
    pub async fn bind<F>(addr: &str, service: &str, caller_id: &str, handler: F) -> Result<Self>
    where
        F: Fn(T::Request) -> ServiceResult<T::Response> + Send + Sync + 'static,
    {
        naming::validate(service)?;
        naming::validate(caller_id)?;

        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let gate = Arc::new(PeerGate::new());

        let ctx = Arc::new(ServerCtx::<T, F> {
            service: service.to_string(),
            caller_id: caller_id.to_string(),
            max_frame_len: wire::DEFAULT_MAX_FRAME_LEN,
            handler,
            gate: Arc::clone(&gate),
            phantom: PhantomData,
        });

        info!(service, %local_addr, "service listening");
        let accept_task = tokio::spawn(accept_loop(listener, ctx));

        Ok(Self {
            service: service.to_string(),
            local_addr,
            gate,
            accept_task,
            phantom: PhantomData,
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The `rosrpc://` URI clients connect to.
    pub fn uri(&self) -> String {
        format!("rosrpc://{}", self.local_addr)
    }

    pub fn active_connections(&self) -> usize {
        self.gate.peer_count()
    }
}

impl<T: ServicePair> Drop for ServiceServer<T> {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn accept_loop<T, F>(listener: TcpListener, ctx: Arc<ServerCtx<T, F>>)
where
    T: ServicePair,
    F: Fn(T::Request) -> ServiceResult<T::Response> + Send + Sync + 'static,
{
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!(%peer, service = %ctx.service, "service connection accepted");
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move {
                    ctx.gate.attach();
                    if let Err(err) = serve_connection(stream, &ctx).await {
                        log_core_error(err);
                    }
                    ctx.gate.detach();
                });
            }
            Err(err) => {
                warn!(service = %ctx.service, "service accept failed: {err}");
            }
        }
    }
}

async fn serve_connection<T, F>(mut stream: TcpStream, ctx: &ServerCtx<T, F>) -> Result<()>
where
    T: ServicePair,
    F: Fn(T::Request) -> ServiceResult<T::Response> + Send + Sync + 'static,
{
    let fields = header::read(&mut stream).await?;
    if let Err(err) = validate_request::<T>(&fields, &ctx.service) {
        // Refusals are reported in-band before closing.
        header::write(&mut stream, &header::error_fields(&err.message)).await?;
        return Err(err);
    }

    let mut reply = HashMap::new();
    reply.insert("callerid".to_string(), ctx.caller_id.clone());
    reply.insert("md5sum".to_string(), T::md5sum().to_string());
    reply.insert("type".to_string(), T::service_type().to_string());
    header::write(&mut stream, &reply).await?;

    // Probe connections only want the negotiated header.
    if fields.get("probe").map(String::as_str) == Some("1") {
        debug!(service = %ctx.service, "probe connection served");
        return Ok(());
    }

    loop {
        let body = match wire::read_frame(&mut stream, ctx.max_frame_len).await {
            Ok(body) => body,
            // Disconnect between requests ends the session.
            Err(err) if err.kind == ErrorKind::Io => break,
            Err(err) => return Err(err),
        };
        let request = wire::decode_frame::<T::Request>(&body)?;

        let outcome = catch_unwind(AssertUnwindSafe(|| (ctx.handler)(request)))
            .unwrap_or_else(|_| Err("service handler panicked".to_string()));

        match outcome {
            Ok(response) => {
                wire::write_flag(&mut stream, true).await?;
                stream.write_all(&wire::encode_framed(&response)?).await?;
            }
            Err(text) => {
                // The error string's own length prefix doubles as the frame
                // length, mirroring what clients decode.
                wire::write_flag(&mut stream, false).await?;
                let mut buf = Vec::new();
                text.encode(&mut buf)?;
                stream.write_all(&buf).await?;
            }
        }
    }
    Ok(())
}

fn validate_request<T: ServicePair>(
    fields: &HashMap<String, String>,
    service: &str,
) -> Result<()> {
    header::require(fields, "callerid")?;

    let requested = header::require(fields, "service")?;
    if requested != service {
        return Err(CoreError::header_mismatch("service"));
    }

    header::match_field(fields, "md5sum", T::md5sum())
}
