use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use roswire_core::error::{CoreError, Domain, ErrorKind, Payload, Result};
use roswire_core::naming;

use crate::header;
use crate::message::{ServicePair, ServiceResult};
use crate::wire;

/// An in-flight detached service call.
pub struct PendingResponse<T> {
    handle: JoinHandle<Result<ServiceResult<T>>>,
}

impl<T> PendingResponse<T> {
    pub async fn wait(self) -> Result<ServiceResult<T>> {
        self.handle.await.unwrap_or_else(|_| {
            Err(CoreError::error()
                .domain(Domain::Transport)
                .kind(ErrorKind::Other)
                .msg("service call task ended without a response")
                .build())
        })
    }
}

#[derive(Debug)]
struct ClientInfo {
    caller_id: String,
    uri: String,
    service: String,
    max_frame_len: u32,
}

/// TCPROS service client.
///
/// Cheap to clone; every call opens its own connection to the service URI
/// (`rosrpc://host:port`) and exchanges connection headers before the
/// request travels.
#[derive(Debug)]
pub struct ServiceClient<T: ServicePair> {
    info: Arc<ClientInfo>,
    phantom: PhantomData<T>,
}

impl<T: ServicePair> Clone for ServiceClient<T> {
    fn clone(&self) -> Self {
        Self {
            info: Arc::clone(&self.info),
            phantom: PhantomData,
        }
    }
}

impl<T: ServicePair> ServiceClient<T> {
    pub fn new(caller_id: &str, uri: &str, service: &str) -> Result<Self> {
        naming::validate(caller_id)?;
        naming::validate(service)?;
        Ok(Self {
            info: Arc::new(ClientInfo {
                caller_id: caller_id.to_string(),
                uri: uri.to_string(),
                service: service.to_string(),
                max_frame_len: wire::DEFAULT_MAX_FRAME_LEN,
            }),
            phantom: PhantomData,
        })
    }

    /// Override the response frame bound (defaults to
    /// [`wire::DEFAULT_MAX_FRAME_LEN`]).
    pub fn with_max_frame_len(self, max_frame_len: u32) -> Self {
        Self {
            info: Arc::new(ClientInfo {
                caller_id: self.info.caller_id.clone(),
                uri: self.info.uri.clone(),
                service: self.info.service.clone(),
                max_frame_len,
            }),
            phantom: PhantomData,
        }
    }

    pub fn uri(&self) -> &str {
        &self.info.uri
    }

    pub fn service(&self) -> &str {
        &self.info.service
    }

    /// Call the service and wait for the outcome.
    ///
    /// `Ok(Err(text))` is the remote handler declining the request; `Err(_)`
    /// is a transport or protocol fault.
    pub async fn call(&self, req: &T::Request) -> Result<ServiceResult<T::Response>> {
        Self::request_body(req, &self.info).await
    }

    /// Fire the call on its own task; the response is picked up later.
    pub fn call_detached(&self, req: T::Request) -> PendingResponse<T::Response>
    where
        T::Request: Sync,
    {
        let info = Arc::clone(&self.info);
        PendingResponse {
            handle: tokio::spawn(async move { Self::request_body(&req, &info).await }),
        }
    }

    async fn request_body(
        req: &T::Request,
        info: &ClientInfo,
    ) -> Result<ServiceResult<T::Response>> {
        let addr = info.uri.trim_start_matches("rosrpc://");
        let mut stream = TcpStream::connect(addr)
            .await
            .map_err(|e| connection_failed(&info.service, &info.uri, e))?;

        // Service calls start by exchanging connection headers
        exchange_headers::<T, _>(&mut stream, &info.caller_id, &info.service).await?;

        let framed = wire::encode_framed(req)?;
        stream.write_all(&framed).await?;

        // One verification byte decides which payload follows: the encoded
        // response on success, an error string from the remote handler on
        // failure. Both are length-prefixed frames.
        let ok = wire::read_flag(&mut stream)
            .await
            .map_err(|_| response_interrupted(&info.service))?;
        let body = wire::read_frame(&mut stream, info.max_frame_len).await?;

        if ok {
            Ok(Ok(wire::decode_frame(&body)?))
        } else {
            let text = String::from_utf8(body)
                .map_err(|_| CoreError::decode("service error text is not valid UTF-8"))?;
            Ok(Err(text))
        }
    }
}

fn connection_failed(service: &str, uri: &str, err: std::io::Error) -> CoreError {
    CoreError::error()
        .domain(Domain::Transport)
        .kind(ErrorKind::Transport)
        .msgf(format_args!("failed to connect to service: {err}"))
        .payload(Payload::Endpoint {
            name: service.to_string().into(),
            uri: uri.to_string().into(),
        })
        .build()
}

fn response_interrupted(service: &str) -> CoreError {
    CoreError::error()
        .domain(Domain::Transport)
        .kind(ErrorKind::Transport)
        .msg("service response interrupted")
        .payload(Payload::Context {
            key: "service",
            value: service.to_string().into(),
        })
        .build()
}

async fn write_request<T, U>(stream: &mut U, caller_id: &str, service: &str) -> Result<()>
where
    T: ServicePair,
    U: AsyncWrite + Unpin,
{
    let mut fields = HashMap::new();
    fields.insert("callerid".to_string(), caller_id.to_string());
    fields.insert("service".to_string(), service.to_string());
    fields.insert("md5sum".to_string(), T::md5sum().to_string());
    fields.insert("type".to_string(), T::service_type().to_string());
    header::write(stream, &fields).await
}

async fn read_response<U>(stream: &mut U) -> Result<()>
where
    U: AsyncRead + Unpin,
{
    let fields = header::read(stream).await?;
    header::reject_on_error(&fields)?;
    header::require(&fields, "callerid")?;
    Ok(())
}

async fn exchange_headers<T, U>(stream: &mut U, caller_id: &str, service: &str) -> Result<()>
where
    T: ServicePair,
    U: AsyncRead + AsyncWrite + Unpin,
{
    write_request::<T, U>(stream, caller_id, service).await?;
    read_response(stream).await
}
