use roswire_core::codec::RosMsg;

/// A typed ROS message usable on a TCPROS connection.
///
/// Implementations are hand-written (there is no `.msg` codegen here);
/// `msg_type` and `md5sum` are the negotiation strings exchanged in the
/// connection header.
pub trait Message: RosMsg + Send + 'static {
    fn msg_type() -> &'static str;
    fn md5sum() -> &'static str;
}

/// Request/response pair of a ROS service.
pub trait ServicePair: Send + 'static {
    type Request: Message;
    type Response: Message;

    fn service_type() -> &'static str;
    fn md5sum() -> &'static str;
}

/// Outcome of a service call as seen by application code.
///
/// The remote handler either produced a response or an error string; both
/// travel inside a successful transport exchange. Transport faults are the
/// outer `CoreError`.
pub type ServiceResult<T> = std::result::Result<T, String>;
