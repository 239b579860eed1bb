use std::collections::HashMap;
use std::io;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

use roswire_core::codec::RosMsg;
use roswire_core::error::{ErrorKind, Result};
use roswire_tcpros::{header, wire, Message, ServiceClient, ServicePair, ServiceServer};

const ADD_TWO_INTS_MD5: &str = "6a2e34150c00229791cc89ff309fff21";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AddTwoIntsRequest {
    a: i64,
    b: i64,
}

impl RosMsg for AddTwoIntsRequest {
    fn encode<W: io::Write>(&self, w: &mut W) -> Result<()> {
        self.a.encode(w)?;
        self.b.encode(w)
    }
    fn decode<R: io::Read>(r: &mut R) -> Result<Self> {
        Ok(Self {
            a: i64::decode(r)?,
            b: i64::decode(r)?,
        })
    }
}

impl Message for AddTwoIntsRequest {
    fn msg_type() -> &'static str {
        "rospy_tutorials/AddTwoIntsRequest"
    }
    fn md5sum() -> &'static str {
        ADD_TWO_INTS_MD5
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AddTwoIntsResponse {
    sum: i64,
}

impl RosMsg for AddTwoIntsResponse {
    fn encode<W: io::Write>(&self, w: &mut W) -> Result<()> {
        self.sum.encode(w)
    }
    fn decode<R: io::Read>(r: &mut R) -> Result<Self> {
        Ok(Self {
            sum: i64::decode(r)?,
        })
    }
}

impl Message for AddTwoIntsResponse {
    fn msg_type() -> &'static str {
        "rospy_tutorials/AddTwoIntsResponse"
    }
    fn md5sum() -> &'static str {
        ADD_TWO_INTS_MD5
    }
}

struct AddTwoInts;

impl ServicePair for AddTwoInts {
    type Request = AddTwoIntsRequest;
    type Response = AddTwoIntsResponse;

    fn service_type() -> &'static str {
        "rospy_tutorials/AddTwoInts"
    }
    fn md5sum() -> &'static str {
        ADD_TWO_INTS_MD5
    }
}

/// Same pair under a different checksum, for negotiation-failure tests.
struct AddTwoIntsAltered;

impl ServicePair for AddTwoIntsAltered {
    type Request = AddTwoIntsRequest;
    type Response = AddTwoIntsResponse;

    fn service_type() -> &'static str {
        "rospy_tutorials/AddTwoInts"
    }
    fn md5sum() -> &'static str {
        "0000000000000000000000000000dead"
    }
}

async fn spawn_adder() -> ServiceServer<AddTwoInts> {
    ServiceServer::<AddTwoInts>::bind("127.0.0.1:0", "/add_two_ints", "/adder", |req| {
        if req.a < 0 || req.b < 0 {
            Err(String::from("operands must be non-negative"))
        } else {
            Ok(AddTwoIntsResponse { sum: req.a + req.b })
        }
    })
    .await
    .expect("bind adder")
}

#[tokio::test]
async fn call_returns_handler_response() {
    let server = spawn_adder().await;
    let client =
        ServiceClient::<AddTwoInts>::new("/caller", &server.uri(), "/add_two_ints").unwrap();

    let outcome = timeout(
        Duration::from_secs(5),
        client.call(&AddTwoIntsRequest { a: 12, b: 30 }),
    )
    .await
    .expect("call timed out")
    .unwrap();

    assert_eq!(outcome, Ok(AddTwoIntsResponse { sum: 42 }));
}

#[tokio::test]
async fn handler_refusal_travels_as_inner_error() {
    let server = spawn_adder().await;
    let client =
        ServiceClient::<AddTwoInts>::new("/caller", &server.uri(), "/add_two_ints").unwrap();

    let outcome = client.call(&AddTwoIntsRequest { a: -1, b: 5 }).await.unwrap();

    let text = outcome.expect_err("handler should refuse");
    assert!(text.contains("non-negative"), "unexpected text: {text}");
}

#[tokio::test]
async fn detached_call_resolves_later() {
    let server = spawn_adder().await;
    let client =
        ServiceClient::<AddTwoInts>::new("/caller", &server.uri(), "/add_two_ints").unwrap();

    let pending = client.call_detached(AddTwoIntsRequest { a: 2, b: 3 });
    let outcome = timeout(Duration::from_secs(5), pending.wait())
        .await
        .expect("wait timed out")
        .unwrap();

    assert_eq!(outcome, Ok(AddTwoIntsResponse { sum: 5 }));
}

#[tokio::test]
async fn wrong_service_name_is_refused_in_band() {
    let server = spawn_adder().await;
    let client = ServiceClient::<AddTwoInts>::new("/caller", &server.uri(), "/other").unwrap();

    let err = client
        .call(&AddTwoIntsRequest { a: 1, b: 1 })
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Transport);
    assert!(err.message.contains("refused"), "unexpected: {}", err.message);
}

#[tokio::test]
async fn md5sum_mismatch_is_refused_in_band() {
    let server = spawn_adder().await;
    let client =
        ServiceClient::<AddTwoIntsAltered>::new("/caller", &server.uri(), "/add_two_ints")
            .unwrap();

    let err = client
        .call(&AddTwoIntsRequest { a: 1, b: 1 })
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Transport);
}

#[tokio::test]
async fn probe_connection_gets_header_then_eof() {
    let server = spawn_adder().await;
    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();

    let mut fields = HashMap::new();
    fields.insert("callerid".to_string(), "/prober".to_string());
    fields.insert("service".to_string(), "/add_two_ints".to_string());
    fields.insert("md5sum".to_string(), "*".to_string());
    fields.insert("probe".to_string(), "1".to_string());
    header::write(&mut stream, &fields).await.unwrap();

    let reply = timeout(Duration::from_secs(5), header::read(&mut stream))
        .await
        .expect("header timed out")
        .unwrap();
    assert_eq!(
        reply.get("type").map(String::as_str),
        Some("rospy_tutorials/AddTwoInts")
    );
    assert_eq!(reply.get("md5sum").map(String::as_str), Some(ADD_TWO_INTS_MD5));

    // No request loop after a probe: the server closes the connection.
    let mut buf = [0u8; 16];
    let read = timeout(Duration::from_secs(5), stream.read(&mut buf))
        .await
        .expect("eof timed out")
        .unwrap();
    assert_eq!(read, 0);
}

#[tokio::test]
async fn one_connection_serves_sequential_requests() {
    let server = spawn_adder().await;
    let mut stream = TcpStream::connect(server.local_addr()).await.unwrap();

    let mut fields = HashMap::new();
    fields.insert("callerid".to_string(), "/caller".to_string());
    fields.insert("service".to_string(), "/add_two_ints".to_string());
    fields.insert("md5sum".to_string(), ADD_TWO_INTS_MD5.to_string());
    fields.insert("type".to_string(), "rospy_tutorials/AddTwoInts".to_string());
    header::write(&mut stream, &fields).await.unwrap();
    header::read(&mut stream).await.unwrap();

    for (a, b) in [(1i64, 2i64), (40, 60)] {
        let framed = wire::encode_framed(&AddTwoIntsRequest { a, b }).unwrap();
        stream.write_all(&framed).await.unwrap();

        let ok = wire::read_flag(&mut stream).await.unwrap();
        assert!(ok);
        let body = wire::read_frame(&mut stream, wire::DEFAULT_MAX_FRAME_LEN)
            .await
            .unwrap();
        let response: AddTwoIntsResponse = wire::decode_frame(&body).unwrap();
        assert_eq!(response.sum, a + b);
    }
}
