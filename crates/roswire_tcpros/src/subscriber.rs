use std::collections::HashMap;

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use roswire_core::error::{CoreError, Domain, ErrorKind, Payload, Result};
use roswire_core::naming;

use crate::header;
use crate::message::Message;
use crate::support::log_core_error;
use crate::wire;

/// What a publisher declared about its topic during the header exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicInfo {
    pub msg_type: String,
    pub md5sum: String,
    pub latching: bool,
}

/// Typed TCPROS subscriber link.
///
/// Connects to one publisher URI and hands every decoded message to the
/// callback on a dedicated task. Dropping the subscriber closes the link.
#[derive(Debug)]
pub struct Subscriber {
    topic: String,
    task: JoinHandle<()>,
}

impl Subscriber {
    pub async fn connect<T, F>(uri: &str, topic: &str, caller_id: &str, callback: F) -> Result<Self>
    where
        T: Message,
        F: Fn(T) + Send + 'static,
    {
        naming::validate(topic)?;
        naming::validate(caller_id)?;

        let (mut stream, reply) =
            open_link(uri, topic, caller_id, T::md5sum(), T::msg_type()).await?;
        header::match_field(&reply, "md5sum", T::md5sum())?;
        header::match_field(&reply, "type", T::msg_type())?;

        let topic_owned = topic.to_string();
        let task = tokio::spawn(async move {
            loop {
                let body = match wire::read_frame(&mut stream, wire::DEFAULT_MAX_FRAME_LEN).await {
                    Ok(body) => body,
                    Err(err) => {
                        if err.kind == ErrorKind::Io {
                            debug!(topic = %topic_owned, "publisher link closed");
                        } else {
                            log_core_error(err);
                        }
                        break;
                    }
                };
                match wire::decode_frame::<T>(&body) {
                    Ok(msg) => callback(msg),
                    Err(err) => {
                        warn!(topic = %topic_owned, "message decode failed; dropping link");
                        log_core_error(err);
                        break;
                    }
                }
            }
        });

        Ok(Self {
            topic: topic.to_string(),
            task,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Untyped subscriber link: wildcard negotiation, raw frame bodies out.
///
/// This is how inspection tooling watches a topic without knowing its
/// message type.
pub struct RawSubscriber {
    info: TopicInfo,
    rx: mpsc::Receiver<Vec<u8>>,
    task: JoinHandle<()>,
}

impl RawSubscriber {
    pub async fn connect(uri: &str, topic: &str, caller_id: &str) -> Result<Self> {
        naming::validate(topic)?;
        naming::validate(caller_id)?;

        let (mut stream, reply) = open_link(uri, topic, caller_id, "*", "*").await?;
        let info = declared_info(&reply)?;

        let (tx, rx) = mpsc::channel(32);
        let task = tokio::spawn(async move {
            loop {
                let body = match wire::read_frame(&mut stream, wire::DEFAULT_MAX_FRAME_LEN).await {
                    Ok(body) => body,
                    Err(err) => {
                        if err.kind != ErrorKind::Io {
                            log_core_error(err);
                        }
                        break;
                    }
                };
                if tx.send(body).await.is_err() {
                    break;
                }
            }
        });

        Ok(Self { info, rx, task })
    }

    /// One header exchange, no message stream: report what the publisher
    /// declares about the topic.
    pub async fn probe(uri: &str, topic: &str, caller_id: &str) -> Result<TopicInfo> {
        naming::validate(topic)?;
        naming::validate(caller_id)?;

        let (_stream, reply) = open_link(uri, topic, caller_id, "*", "*").await?;
        declared_info(&reply)
    }

    pub fn info(&self) -> &TopicInfo {
        &self.info
    }

    pub fn declared_type(&self) -> &str {
        &self.info.msg_type
    }

    pub fn declared_md5sum(&self) -> &str {
        &self.info.md5sum
    }

    pub fn latching(&self) -> bool {
        self.info.latching
    }

    /// Next raw frame body, or None once the link is gone.
    pub async fn next(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }
}

impl Drop for RawSubscriber {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn open_link(
    uri: &str,
    topic: &str,
    caller_id: &str,
    md5sum: &str,
    msg_type: &str,
) -> Result<(TcpStream, HashMap<String, String>)> {
    let addr = uri.trim_start_matches("tcpros://");
    let mut stream = TcpStream::connect(addr)
        .await
        .map_err(|e| connection_failed(topic, uri, e))?;

    let mut fields = HashMap::new();
    fields.insert("callerid".to_string(), caller_id.to_string());
    fields.insert("topic".to_string(), topic.to_string());
    fields.insert("md5sum".to_string(), md5sum.to_string());
    fields.insert("type".to_string(), msg_type.to_string());
    fields.insert("tcp_nodelay".to_string(), "0".to_string());
    header::write(&mut stream, &fields).await?;

    let reply = header::read(&mut stream).await?;
    header::reject_on_error(&reply)?;
    Ok((stream, reply))
}

fn declared_info(reply: &HashMap<String, String>) -> Result<TopicInfo> {
    Ok(TopicInfo {
        msg_type: header::require(reply, "type")?.to_string(),
        md5sum: header::require(reply, "md5sum")?.to_string(),
        latching: reply.get("latching").map(String::as_str) == Some("1"),
    })
}

fn connection_failed(topic: &str, uri: &str, err: std::io::Error) -> CoreError {
    CoreError::error()
        .domain(Domain::Transport)
        .kind(ErrorKind::Transport)
        .msgf(format_args!("failed to connect to publisher: {err}"))
        .payload(Payload::Endpoint {
            name: topic.to_string().into(),
            uri: uri.to_string().into(),
        })
        .build()
}
