//! Wire and domain messages exchanged with players.
//!
//! Frames are decoded leniently into a [`WireMessage`] (every field optional, kept as
//! received) and validated into a typed [`Message`] only where the relay needs to act.
//! A forwarded move is re-emitted from the original `WireMessage`, so its field values
//! reach the opponent unchanged.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A player's side of the board.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    /// The side playing against this one.
    pub fn opponent(self) -> Self {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::White => "white",
            Side::Black => "black",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "white" => Some(Side::White),
            "black" => Some(Side::Black),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Piece a pawn may promote to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Promotion {
    Queen,
    Rook,
    Bishop,
    Knight,
}

impl Promotion {
    /// Parses a promotion letter. Both `n` and the legacy `k` mean knight.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "q" => Some(Promotion::Queen),
            "r" => Some(Promotion::Rook),
            "b" => Some(Promotion::Bishop),
            "n" | "k" => Some(Promotion::Knight),
            _ => None,
        }
    }
}

/// Raw frame as it travels over the socket.
///
/// Every field is optional so that a syntactically valid JSON object always decodes;
/// field constraints are checked by [`Message::try_from`].
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct WireMessage {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<String>,
}

impl WireMessage {
    pub fn start(side: Side) -> Self {
        Self {
            kind: Some(MessageKind::Start.as_str().to_string()),
            color: Some(side.as_str().to_string()),
            ..Self::default()
        }
    }

    #[cfg(test)]
    pub fn movement(from: &str, to: &str, promotion: &str) -> Self {
        Self {
            kind: Some(MessageKind::Move.as_str().to_string()),
            from: Some(from.to_string()),
            to: Some(to.to_string()),
            promotion: Some(promotion.to_string()),
            ..Self::default()
        }
    }

    #[cfg(test)]
    pub fn error() -> Self {
        Self {
            kind: Some(MessageKind::Error.as_str().to_string()),
            ..Self::default()
        }
    }
}

/// Closed set of message kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    Start,
    Move,
    Error,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Start => "start",
            MessageKind::Move => "move",
            MessageKind::Error => "error",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "start" => Some(MessageKind::Start),
            "move" => Some(MessageKind::Move),
            "error" => Some(MessageKind::Error),
            _ => None,
        }
    }
}

/// A move payload. Squares are opaque identifiers; they are never interpreted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Move {
    pub from: String,
    pub to: String,
    pub promotion: Promotion,
}

/// Validated message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    Start { color: Side },
    Move(Move),
    Error,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Start { .. } => MessageKind::Start,
            Message::Move(_) => MessageKind::Move,
            Message::Error => MessageKind::Error,
        }
    }
}

/// A frame that decoded but breaks the field constraints of its kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedMessage {
    #[error("missing message type")]
    MissingType,
    #[error("unknown message type `{0}`")]
    UnknownType(String),
    #[error("`{kind}` message is missing required field `{field}`")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },
    #[error("invalid color `{0}`")]
    InvalidColor(String),
    #[error("invalid promotion `{0}`")]
    InvalidPromotion(String),
}

/// Returns the field value when present and non-empty.
fn required<'a>(
    value: &'a Option<String>,
    kind: MessageKind,
    field: &'static str,
) -> Result<&'a str, MalformedMessage> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(MalformedMessage::MissingField {
            kind: kind.as_str(),
            field,
        }),
    }
}

impl TryFrom<&WireMessage> for Message {
    type Error = MalformedMessage;

    fn try_from(wire: &WireMessage) -> Result<Self, MalformedMessage> {
        let kind = match wire.kind.as_deref() {
            None | Some("") => return Err(MalformedMessage::MissingType),
            Some(kind) => MessageKind::parse(kind)
                .ok_or_else(|| MalformedMessage::UnknownType(kind.to_string()))?,
        };

        match kind {
            MessageKind::Start => {
                let color = required(&wire.color, kind, "color")?;
                let color = Side::parse(color)
                    .ok_or_else(|| MalformedMessage::InvalidColor(color.to_string()))?;
                Ok(Message::Start { color })
            }
            MessageKind::Move => {
                let from = required(&wire.from, kind, "from")?;
                let to = required(&wire.to, kind, "to")?;
                let promotion = required(&wire.promotion, kind, "promotion")?;
                let promotion = Promotion::parse(promotion)
                    .ok_or_else(|| MalformedMessage::InvalidPromotion(promotion.to_string()))?;
                Ok(Message::Move(Move {
                    from: from.to_string(),
                    to: to.to_string(),
                    promotion,
                }))
            }
            MessageKind::Error => Ok(Message::Error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(json: &str) -> WireMessage {
        serde_json::from_str(json).expect("valid json object")
    }

    #[test]
    fn start_frame_serializes_without_empty_fields() {
        let json = serde_json::to_string(&WireMessage::start(Side::White)).unwrap();
        assert_eq!(json, r#"{"type":"start","color":"white"}"#);
        let json = serde_json::to_string(&WireMessage::start(Side::Black)).unwrap();
        assert_eq!(json, r#"{"type":"start","color":"black"}"#);
    }

    #[test]
    fn move_frame_validates() {
        let wire = decode(r#"{"type":"move","from":"e7","to":"e8","promotion":"q"}"#);
        let msg = Message::try_from(&wire).unwrap();
        assert_eq!(
            msg,
            Message::Move(Move {
                from: "e7".into(),
                to: "e8".into(),
                promotion: Promotion::Queen,
            })
        );
    }

    #[test]
    fn move_without_to_is_malformed() {
        let wire = decode(r#"{"type":"move","from":"e2","promotion":"q"}"#);
        assert_eq!(
            Message::try_from(&wire),
            Err(MalformedMessage::MissingField {
                kind: "move",
                field: "to"
            })
        );
    }

    #[test]
    fn empty_square_counts_as_missing() {
        let wire = decode(r#"{"type":"move","from":"","to":"e4","promotion":"q"}"#);
        assert!(matches!(
            Message::try_from(&wire),
            Err(MalformedMessage::MissingField { field: "from", .. })
        ));
    }

    #[test]
    fn move_requires_known_promotion() {
        let wire = decode(r#"{"type":"move","from":"a7","to":"a8","promotion":"x"}"#);
        assert_eq!(
            Message::try_from(&wire),
            Err(MalformedMessage::InvalidPromotion("x".into()))
        );
        let wire = decode(r#"{"type":"move","from":"a7","to":"a8"}"#);
        assert!(Message::try_from(&wire).is_err());
    }

    #[test]
    fn legacy_knight_letter_is_accepted() {
        assert_eq!(Promotion::parse("k"), Some(Promotion::Knight));
        assert_eq!(Promotion::parse("n"), Some(Promotion::Knight));
    }

    #[test]
    fn start_requires_valid_color() {
        let wire = decode(r#"{"type":"start"}"#);
        assert!(matches!(
            Message::try_from(&wire),
            Err(MalformedMessage::MissingField { field: "color", .. })
        ));
        let wire = decode(r#"{"type":"start","color":"green"}"#);
        assert_eq!(
            Message::try_from(&wire),
            Err(MalformedMessage::InvalidColor("green".into()))
        );
    }

    #[test]
    fn unknown_or_missing_type_is_malformed() {
        assert_eq!(
            Message::try_from(&decode(r#"{"type":"resign"}"#)),
            Err(MalformedMessage::UnknownType("resign".into()))
        );
        assert_eq!(
            Message::try_from(&decode(r#"{"from":"e2","to":"e4"}"#)),
            Err(MalformedMessage::MissingType)
        );
    }

    #[test]
    fn fields_of_other_kinds_are_ignored() {
        let wire = decode(
            r#"{"type":"move","color":"purple","from":"g1","to":"f3","promotion":"q"}"#,
        );
        assert_eq!(Message::try_from(&wire).map(|m| m.kind()), Ok(MessageKind::Move));
        assert_eq!(Message::try_from(&WireMessage::error()), Ok(Message::Error));
    }

    #[test]
    fn error_frame_converts_through_try_into() {
        let wire = decode(r#"{"type":"error"}"#);
        let converted: Result<Message, MalformedMessage> = (&wire).try_into();
        assert_eq!(converted, Ok(Message::Error));
    }

    #[test]
    fn side_opponent_flips() {
        assert_eq!(Side::White.opponent(), Side::Black);
        assert_eq!(Side::Black.opponent(), Side::White);
    }
}
