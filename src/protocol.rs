use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::control::{Preview, ResultItem, StatusSnapshot};
use crate::display::Frame;

/// Bible translations the operator can switch between
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Version {
    #[serde(rename = "KJV")]
    Kjv,
    #[serde(rename = "NKJV")]
    Nkjv,
    #[default]
    #[serde(rename = "NLT")]
    Nlt,
    #[serde(rename = "GNT")]
    Gnt,
}

impl Version {
    #[cfg(test)]
    pub const ALL: [Version; 4] = [Version::Kjv, Version::Nkjv, Version::Nlt, Version::Gnt];

    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Kjv => "KJV",
            Version::Nkjv => "NKJV",
            Version::Nlt => "NLT",
            Version::Gnt => "GNT",
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Version {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "KJV" => Ok(Version::Kjv),
            "NKJV" => Ok(Version::Nkjv),
            "NLT" => Ok(Version::Nlt),
            "GNT" => Ok(Version::Gnt),
            other => Err(format!("Invalid version: {} (expected KJV, NKJV, NLT or GNT)", other)),
        }
    }
}

/// What the projector should show, as sent over the relay
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum DisplayCommand {
    Black,
    Slide {
        slide_url: String,
    },
    Verse {
        header: String,
        text: String,
        show_verse_numbers: bool,
        overlay_return_ms: u64,
    },
}

/// Discrete input from the clicker / hotkey listener
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteInput {
    Next,
    Prev,
    Clear,
    SetVersion(Version),
}

impl RemoteInput {
    /// Parse one of the seven remote tokens. Anything else yields `None`.
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim() {
            "NEXT" => Some(RemoteInput::Next),
            "PREV" => Some(RemoteInput::Prev),
            "CLEAR" => Some(RemoteInput::Clear),
            "SET_VER_KJV" => Some(RemoteInput::SetVersion(Version::Kjv)),
            "SET_VER_NKJV" => Some(RemoteInput::SetVersion(Version::Nkjv)),
            "SET_VER_NLT" => Some(RemoteInput::SetVersion(Version::Nlt)),
            "SET_VER_GNT" => Some(RemoteInput::SetVersion(Version::Gnt)),
            _ => None,
        }
    }

    /// Map a clicker key name onto its token
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim() {
            "PageDown" => Some(RemoteInput::Next),
            "PageUp" => Some(RemoteInput::Prev),
            "Escape" => Some(RemoteInput::Clear),
            "F1" => Some(RemoteInput::SetVersion(Version::Kjv)),
            "F2" => Some(RemoteInput::SetVersion(Version::Nkjv)),
            "F3" => Some(RemoteInput::SetVersion(Version::Nlt)),
            "F4" => Some(RemoteInput::SetVersion(Version::Gnt)),
            _ => None,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            RemoteInput::Next => "NEXT",
            RemoteInput::Prev => "PREV",
            RemoteInput::Clear => "CLEAR",
            RemoteInput::SetVersion(Version::Kjv) => "SET_VER_KJV",
            RemoteInput::SetVersion(Version::Nkjv) => "SET_VER_NKJV",
            RemoteInput::SetVersion(Version::Nlt) => "SET_VER_NLT",
            RemoteInput::SetVersion(Version::Gnt) => "SET_VER_GNT",
        }
    }
}

/// Operator console actions
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OperatorAction {
    /// List the loaded slides
    Slides,
    /// Re-read the slides folder
    ReloadSlides,
    /// Select a slide (clamped) without projecting it
    Select { index: i64 },
    /// Search the current version
    Search { query: String },
    /// Select a search result
    Pick { index: usize },
    /// Project the current selection
    Project,
    Next,
    Prev,
    Black,
    Clear,
    Lock,
    /// Close the projector; the next display command reopens it
    CloseProjector,
}

/// Messages sent from clients to the service
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Operator console action
    Operator { id: Uuid, action: OperatorAction },
    /// Raw token from the remote listener
    Remote { id: Uuid, token: String },
    /// Request service status
    Status { id: Uuid },
    /// Subscribe to projector frames
    Subscribe { id: Uuid },
}

impl ClientMessage {
    pub fn new_operator(action: OperatorAction) -> Self {
        ClientMessage::Operator {
            id: Uuid::new_v4(),
            action,
        }
    }

    pub fn new_remote(token: impl Into<String>) -> Self {
        ClientMessage::Remote {
            id: Uuid::new_v4(),
            token: token.into(),
        }
    }

    pub fn new_status() -> Self {
        ClientMessage::Status { id: Uuid::new_v4() }
    }

    pub fn new_subscribe() -> Self {
        ClientMessage::Subscribe { id: Uuid::new_v4() }
    }
}

/// One entry in a slide listing response
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SlideEntry {
    pub number: usize,
    pub file: String,
    pub active: bool,
}

/// Messages sent from the service to clients
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Operator action applied; carries the updated preview line
    Ack { id: Uuid, preview: Preview },
    /// Slide listing (`folder_missing` distinguishes a missing folder from an empty one)
    Slides {
        id: Uuid,
        folder_missing: bool,
        slides: Vec<SlideEntry>,
        preview: Preview,
    },
    /// Search outcome rendered as result items
    Results {
        id: Uuid,
        items: Vec<ResultItem>,
        preview: Preview,
    },
    /// Remote token queued (`input` is `None` when the token was not recognized)
    Accepted {
        id: Uuid,
        input: Option<RemoteInput>,
    },
    /// Status information
    Status {
        id: Uuid,
        status: StatusSnapshot,
        uptime_seconds: u64,
        started_at: String,
    },
    /// Subscription confirmation
    Subscribed { id: Uuid },
    /// Projector frame broadcast
    Frame { frame: Frame, ts: u64 },
    /// Error response
    Error { id: Uuid, error: String },
}

impl ServerMessage {
    pub fn new_frame(frame: Frame, ts: u64) -> Self {
        ServerMessage::Frame { frame, ts }
    }

    pub fn new_error(id: Uuid, error: impl Into<String>) -> Self {
        ServerMessage::Error {
            id,
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_command_wire_shape() {
        let black = serde_json::to_value(DisplayCommand::Black).unwrap();
        assert_eq!(black, serde_json::json!({ "kind": "BLACK" }));

        let slide = serde_json::to_value(DisplayCommand::Slide {
            slide_url: "file:///slides/001.png".to_string(),
        })
        .unwrap();
        assert_eq!(
            slide,
            serde_json::json!({ "kind": "SLIDE", "slideUrl": "file:///slides/001.png" })
        );

        let verse = serde_json::to_value(DisplayCommand::Verse {
            header: "John 3:16 (KJV)".to_string(),
            text: "16 For God so loved".to_string(),
            show_verse_numbers: true,
            overlay_return_ms: 60000,
        })
        .unwrap();
        assert_eq!(
            verse,
            serde_json::json!({
                "kind": "VERSE",
                "header": "John 3:16 (KJV)",
                "text": "16 For God so loved",
                "showVerseNumbers": true,
                "overlayReturnMs": 60000
            })
        );
    }

    #[test]
    fn test_remote_tokens() {
        assert_eq!(RemoteInput::parse("NEXT"), Some(RemoteInput::Next));
        assert_eq!(RemoteInput::parse("PREV"), Some(RemoteInput::Prev));
        assert_eq!(RemoteInput::parse("CLEAR"), Some(RemoteInput::Clear));
        assert_eq!(
            RemoteInput::parse("SET_VER_NKJV"),
            Some(RemoteInput::SetVersion(Version::Nkjv))
        );
        assert_eq!(RemoteInput::parse("next"), None);
        assert_eq!(RemoteInput::parse("SET_VER_ESV"), None);
        assert_eq!(RemoteInput::parse(""), None);

        for version in Version::ALL {
            let input = RemoteInput::SetVersion(version);
            assert_eq!(RemoteInput::parse(input.token()), Some(input));
        }
    }

    #[test]
    fn test_clicker_keys() {
        assert_eq!(RemoteInput::from_key("PageDown"), Some(RemoteInput::Next));
        assert_eq!(RemoteInput::from_key("PageUp"), Some(RemoteInput::Prev));
        assert_eq!(RemoteInput::from_key("Escape"), Some(RemoteInput::Clear));
        assert_eq!(
            RemoteInput::from_key("F4"),
            Some(RemoteInput::SetVersion(Version::Gnt))
        );
        assert_eq!(RemoteInput::from_key("F5"), None);
    }

    #[test]
    fn test_version_from_str() {
        assert_eq!("gnt".parse::<Version>(), Ok(Version::Gnt));
        assert_eq!(" NKJV ".parse::<Version>(), Ok(Version::Nkjv));
        assert!("ESV".parse::<Version>().is_err());
    }
}
