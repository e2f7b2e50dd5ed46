//! Requests, responses and status codes

use crate::message::headers;
use crate::{Message, MessageError, MessageId};
use codec::ValueMap;
use std::fmt;
use std::ops::{Deref, DerefMut};

/// Wire prefix of a request
pub const REQUEST_PREFIX: &str = "REQUEST::";

/// Wire prefix of a response
pub const RESPONSE_PREFIX: &str = "RESPONSE::";

/// Outcome carried by a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseStatus {
    Ok,
    CommandExecuted,
    Unauthorized,
    NotFound,
    Error,
    DockingApproved,
    DockingDenied,
    DockingComplete,
    DockingCancelled,
    ConnectorNotFound,
}

impl ResponseStatus {
    /// The numeric code sent on the wire
    pub fn code(&self) -> u16 {
        match self {
            ResponseStatus::Ok => 200,
            ResponseStatus::CommandExecuted => 201,
            ResponseStatus::Unauthorized => 401,
            ResponseStatus::NotFound => 404,
            ResponseStatus::Error => 500,
            ResponseStatus::DockingApproved => 600,
            ResponseStatus::DockingDenied => 601,
            ResponseStatus::DockingComplete => 602,
            ResponseStatus::DockingCancelled => 603,
            ResponseStatus::ConnectorNotFound => 604,
        }
    }

    /// Maps a numeric code back; unknown codes read as [`ResponseStatus::Error`]
    pub fn from_code(code: i64) -> Self {
        match code {
            200 => ResponseStatus::Ok,
            201 => ResponseStatus::CommandExecuted,
            401 => ResponseStatus::Unauthorized,
            404 => ResponseStatus::NotFound,
            600 => ResponseStatus::DockingApproved,
            601 => ResponseStatus::DockingDenied,
            602 => ResponseStatus::DockingComplete,
            603 => ResponseStatus::DockingCancelled,
            604 => ResponseStatus::ConnectorNotFound,
            _ => ResponseStatus::Error,
        }
    }

    /// True for the 2xx codes
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code())
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResponseStatus::Ok => "OK",
            ResponseStatus::CommandExecuted => "COMMAND_EXECUTED",
            ResponseStatus::Unauthorized => "UNAUTHORIZED",
            ResponseStatus::NotFound => "NOT_FOUND",
            ResponseStatus::Error => "ERROR",
            ResponseStatus::DockingApproved => "DOCKING_APPROVED",
            ResponseStatus::DockingDenied => "DOCKING_DENIED",
            ResponseStatus::DockingComplete => "DOCKING_COMPLETE",
            ResponseStatus::DockingCancelled => "DOCKING_CANCELLED",
            ResponseStatus::ConnectorNotFound => "CONNECTOR_NOT_FOUND",
        };
        write!(f, "{} {}", self.code(), name)
    }
}

/// A message asking a node to do something
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    message: Message,
}

impl Request {
    pub fn new(header: ValueMap, body: ValueMap) -> Self {
        Self {
            message: Message::new(header, body),
        }
    }

    /// Route this request is for
    pub fn path(&self) -> &str {
        self.header_str(headers::PATH)
    }

    pub fn target_id(&self) -> &str {
        self.header_str(headers::TARGET_ID)
    }

    pub fn target_name(&self) -> &str {
        self.header_str(headers::TARGET_NAME)
    }

    /// Addresses the request to a known node
    pub fn to(mut self, target_id: &str, target_name: &str) -> Self {
        self.set_header(headers::TARGET_ID, target_id);
        self.set_header(headers::TARGET_NAME, target_name);
        self
    }

    pub fn to_wire(&self) -> String {
        format!("{}{}", REQUEST_PREFIX, self.message.encode_sections())
    }

    /// Decodes a request, with or without its wire prefix
    pub fn from_wire(text: &str) -> Result<Self, MessageError> {
        let text = text.strip_prefix(REQUEST_PREFIX).unwrap_or(text);
        Ok(Self {
            message: Message::decode_sections(text)?,
        })
    }

    pub fn into_message(self) -> Message {
        self.message
    }
}

impl Deref for Request {
    type Target = Message;

    fn deref(&self) -> &Message {
        &self.message
    }
}

impl DerefMut for Request {
    fn deref_mut(&mut self) -> &mut Message {
        &mut self.message
    }
}

/// A message answering a request
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    message: Message,
}

impl Response {
    /// Creates a response with `status`; the caller supplies `RespondingToId`
    pub fn new(status: ResponseStatus, header: ValueMap, body: ValueMap) -> Self {
        let mut message = Message::new(header, body);
        message.set_header(headers::STATUS, status.code().to_string());
        Self { message }
    }

    pub fn status(&self) -> ResponseStatus {
        ResponseStatus::from_code(self.header_i64(headers::STATUS))
    }

    /// The id of the request this answers, if the sender included it
    pub fn responding_to_id(&self) -> Option<MessageId> {
        let id = self.header_str(headers::RESPONDING_TO_ID);
        (!id.is_empty()).then(|| MessageId::from_string(id))
    }

    pub fn target_id(&self) -> &str {
        self.header_str(headers::TARGET_ID)
    }

    pub fn to_wire(&self) -> String {
        format!("{}{}", RESPONSE_PREFIX, self.message.encode_sections())
    }

    /// Decodes a response, with or without its wire prefix
    pub fn from_wire(text: &str) -> Result<Self, MessageError> {
        let text = text.strip_prefix(RESPONSE_PREFIX).unwrap_or(text);
        Ok(Self {
            message: Message::decode_sections(text)?,
        })
    }

    pub fn into_message(self) -> Message {
        self.message
    }
}

impl Deref for Response {
    type Target = Message;

    fn deref(&self) -> &Message {
        &self.message
    }
}

impl DerefMut for Response {
    fn deref_mut(&mut self) -> &mut Message {
        &mut self.message
    }
}

/// Either kind of message, as read off the wire
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Request(Request),
    Response(Response),
}

impl Envelope {
    /// Classifies by wire prefix and decodes
    pub fn parse(text: &str) -> Result<Self, MessageError> {
        if let Some(rest) = text.strip_prefix(REQUEST_PREFIX) {
            Request::from_wire(rest).map(Envelope::Request)
        } else if let Some(rest) = text.strip_prefix(RESPONSE_PREFIX) {
            Response::from_wire(rest).map(Envelope::Response)
        } else {
            Err(MessageError::UnknownKind)
        }
    }

    pub fn to_wire(&self) -> String {
        match self {
            Envelope::Request(request) => request.to_wire(),
            Envelope::Response(response) => response.to_wire(),
        }
    }

    pub fn message(&self) -> &Message {
        match self {
            Envelope::Request(request) => &request.message,
            Envelope::Response(response) => &response.message,
        }
    }

    pub fn message_mut(&mut self) -> &mut Message {
        match self {
            Envelope::Request(request) => &mut request.message,
            Envelope::Response(response) => &mut response.message,
        }
    }
}

impl From<Request> for Envelope {
    fn from(request: Request) -> Self {
        Envelope::Request(request)
    }
}

impl From<Response> for Envelope {
    fn from(response: Response) -> Self {
        Envelope::Response(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body;

    fn ping_request() -> Request {
        let mut header = ValueMap::new();
        header.insert(headers::ORIGIN_ID.into(), "100".into());
        header.insert(headers::ORIGIN_NAME.into(), "Alpha".into());
        header.insert(headers::PATH.into(), "ping".into());
        Request::new(header, ValueMap::new())
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ResponseStatus::Ok.code(), 200);
        assert_eq!(ResponseStatus::CommandExecuted.code(), 201);
        assert_eq!(ResponseStatus::ConnectorNotFound.code(), 604);
        assert_eq!(ResponseStatus::from_code(404), ResponseStatus::NotFound);
        assert_eq!(ResponseStatus::from_code(999), ResponseStatus::Error);
        assert!(ResponseStatus::CommandExecuted.is_success());
        assert!(!ResponseStatus::Unauthorized.is_success());
        assert_eq!(ResponseStatus::NotFound.to_string(), "404 NOT_FOUND");
    }

    #[test]
    fn test_request_wire_round_trip() {
        let mut request = ping_request().to("200", "Beta");
        request.set_body(body::COMMAND, r#"print "hi; there""#);

        let wire = request.to_wire();
        assert!(wire.starts_with("REQUEST::<header>{"));

        let decoded = Request::from_wire(&wire).unwrap();
        assert_eq!(decoded.id(), request.id());
        assert_eq!(decoded.path(), "ping");
        assert_eq!(decoded.target_id(), "200");
        assert_eq!(decoded.target_name(), "Beta");
        assert_eq!(decoded.body_str(body::COMMAND), r#"print "hi; there""#);
    }

    #[test]
    fn test_response_carries_status_and_responding_id() {
        let request = ping_request();
        let mut header = ValueMap::new();
        header.insert(
            headers::RESPONDING_TO_ID.into(),
            request.id().as_str().into(),
        );
        let response = Response::new(ResponseStatus::Ok, header, ValueMap::new());

        let decoded = Response::from_wire(&response.to_wire()).unwrap();
        assert_eq!(decoded.status(), ResponseStatus::Ok);
        assert_eq!(decoded.responding_to_id(), Some(request.id()));
    }

    #[test]
    fn test_response_without_responding_id() {
        let response = Response::new(ResponseStatus::Ok, ValueMap::new(), ValueMap::new());
        assert_eq!(response.responding_to_id(), None);
    }

    #[test]
    fn test_envelope_classifies_by_prefix() {
        let request = ping_request();
        assert!(matches!(
            Envelope::parse(&request.to_wire()),
            Ok(Envelope::Request(_))
        ));

        let response = Response::new(ResponseStatus::Error, ValueMap::new(), ValueMap::new());
        let parsed = Envelope::parse(&response.to_wire()).unwrap();
        assert_eq!(parsed.message().id(), response.id());

        assert_eq!(Envelope::parse("hello"), Err(MessageError::UnknownKind));
    }

    #[test]
    fn test_malformed_header_is_an_error() {
        assert!(matches!(
            Envelope::parse(r#"REQUEST::<header>{"Id":</header><body>{}</body>"#),
            Err(MessageError::Malformed { section: "header", .. })
        ));
    }
}
