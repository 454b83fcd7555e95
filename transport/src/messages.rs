//! The uniform message envelope and inbound frame classification.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::requests::RequestBody;

/// The unit exchanged over the connection in both directions:
/// `{ id, isRequest, type, content }`.
///
/// `id` is generated by the sender of a request and echoed verbatim by
/// the corresponding reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: String,
    #[serde(rename = "isRequest")]
    pub is_request: bool,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub content: Option<Value>,
}

impl Envelope {
    pub fn request(id: impl Into<String>, body: RequestBody) -> Self {
        let kind = body.kind().to_owned();
        Self {
            id: id.into(),
            is_request: true,
            kind,
            content: body.into_content(),
        }
    }

    /// The response to a liveness probe: same id, empty content.
    pub fn ping_reply(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_request: false,
            kind: "ping".to_owned(),
            content: Some(Value::Object(Default::default())),
        }
    }

    /// Classifies an inbound frame as a server event, a keepalive probe
    /// or a reply to one of our requests. Unknown request kinds map to
    /// [`Inbound::Ignored`] for forward compatibility.
    pub fn classify(self) -> Result<Inbound, serde_json::Error> {
        if self.is_request {
            match self.kind.as_str() {
                "event" => {
                    let Some(content) = self.content else {
                        return Ok(Inbound::Ignored);
                    };
                    let EventContent { event, args } = serde_json::from_value(content)?;
                    Ok(Inbound::Event { event, args })
                }
                "ping" => Ok(Inbound::Ping { id: self.id }),
                _ => Ok(Inbound::Ignored),
            }
        } else {
            let ReplyContent { data, error } = match self.content {
                Some(content) => serde_json::from_value(content)?,
                None => ReplyContent::default(),
            };
            let result = match error {
                Some(message) => Err(message),
                None => Ok(data.unwrap_or(Value::Null)),
            };
            Ok(Inbound::Reply {
                id: self.id,
                result,
            })
        }
    }
}

#[derive(Debug, Deserialize)]
struct EventContent {
    event: String,
    #[serde(default)]
    args: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ReplyContent {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// An inbound frame after classification.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A server-originated lifecycle notification.
    Event { event: String, args: Option<Value> },
    /// A liveness probe that must be echoed with the same id.
    Ping { id: String },
    /// A reply to a previously sent request.
    Reply {
        id: String,
        result: Result<Value, String>,
    },
    /// A request kind we do not understand; dropped, not an error.
    Ignored,
}
