//! # Envelopes
//!
//! Every message that crosses the bus is wrapped in an [`Envelope`]: the
//! payload (a request travelling towards the backend, or a response travelling
//! back) plus the route of hops it has passed through.
//!
//! The route is append-only. The only way to touch it is [`Envelope::add_route`],
//! and envelopes move by value between stages, so there is never more than one
//! owner able to append.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier shared by a request, its envelope and its response.
///
/// Uses UUID v7 so ids are time-ordered, which keeps log correlation readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a new request id (UUID v7)
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Parse from string
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// A processing stage a message can pass through.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hop {
    /// Stage name, e.g. `gateway` or `encoder`
    pub name: String,
    /// Instance identity of the stage
    pub identity: String,
}

impl Hop {
    pub fn new(name: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identity: identity.into(),
        }
    }
}

impl fmt::Display for Hop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.identity)
    }
}

/// One traversal record in an envelope's route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub hop: Hop,
    /// When the hop was recorded
    pub at: DateTime<Utc>,
}

/// A client request. The body is opaque to the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub request_id: RequestId,
    pub body: serde_json::Value,
}

impl Request {
    /// Create a request with a fresh id
    pub fn new(body: serde_json::Value) -> Self {
        Self {
            request_id: RequestId::new(),
            body,
        }
    }
}

/// A backend response. The body is opaque to the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub request_id: RequestId,
    pub body: serde_json::Value,
    /// Hops the message traversed, filled in when the response is handed back
    /// to the client.
    #[serde(default)]
    pub route: Vec<RouteEntry>,
}

impl Response {
    pub fn new(request_id: RequestId, body: serde_json::Value) -> Self {
        Self {
            request_id,
            body,
            route: Vec::new(),
        }
    }
}

/// What an envelope carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    Request(Request),
    Response(Response),
}

/// Routing wrapper around a [`Payload`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    request_id: RequestId,
    sender: String,
    route: Vec<RouteEntry>,
    payload: Payload,
}

impl Envelope {
    /// Wrap a request sent by `sender`. The sender is recorded as the first hop.
    pub fn request(request: Request, sender: &Hop) -> Self {
        let mut envelope = Self {
            request_id: request.request_id,
            sender: sender.name.clone(),
            route: Vec::new(),
            payload: Payload::Request(request),
        };
        envelope.add_route(sender);
        envelope
    }

    /// Turn a request envelope into the matching response envelope.
    ///
    /// The route travels with the reply. `responder` becomes the sender; it is
    /// not appended to the route here.
    pub fn into_reply(self, responder: &Hop, body: serde_json::Value) -> Self {
        Self {
            request_id: self.request_id,
            sender: responder.name.clone(),
            route: self.route,
            payload: Payload::Response(Response::new(self.request_id, body)),
        }
    }

    /// Append one hop to the route.
    pub fn add_route(&mut self, hop: &Hop) {
        self.route.push(RouteEntry {
            hop: hop.clone(),
            at: Utc::now(),
        });
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Name of the stage that produced this envelope
    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn route(&self) -> &[RouteEntry] {
        &self.route
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Unwrap the response, moving the route into it.
    ///
    /// Returns the envelope untouched if it carries a request.
    pub fn into_response(self) -> Result<Response, Envelope> {
        match self.payload {
            Payload::Response(mut response) => {
                response.route = self.route;
                Ok(response)
            }
            Payload::Request(_) => Err(self),
        }
    }
}
