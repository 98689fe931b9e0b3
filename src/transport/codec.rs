//! NDJSON codec for message serialization
//!
//! Shared encoding/decoding logic for the line-delimited JSON protocol
//! spoken between the service and its clients.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::transport::SocketError;

/// Encode a client message into NDJSON format (JSON + newline)
pub fn encode_client_message(message: &ClientMessage) -> Result<String, SocketError> {
    let mut json = serde_json::to_string(message)?;
    json.push('\n');
    Ok(json)
}

/// Encode a server message into NDJSON format
pub fn encode_server_message(message: &ServerMessage) -> Result<String, SocketError> {
    let mut json = serde_json::to_string(message)?;
    json.push('\n');
    Ok(json)
}

/// Decode a line of JSON into a ClientMessage
pub fn decode_client_message(line: &str) -> Result<ClientMessage, SocketError> {
    let message: ClientMessage = serde_json::from_str(line.trim())?;
    Ok(message)
}

/// Decode a line of JSON into a ServerMessage
pub fn decode_server_message(line: &str) -> Result<ServerMessage, SocketError> {
    let message: ServerMessage = serde_json::from_str(line.trim())?;
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::Frame;
    use crate::protocol::OperatorAction;

    #[test]
    fn test_encode_client_message() {
        let message = ClientMessage::new_status();
        let encoded = encode_client_message(&message).unwrap();
        assert!(encoded.ends_with('\n'));
        assert!(encoded.contains("\"type\":\"status\""));
    }

    #[test]
    fn test_operator_action_is_nested() {
        let message = ClientMessage::new_operator(OperatorAction::Select { index: -1 });
        let encoded = encode_client_message(&message).unwrap();
        assert!(encoded.contains("\"type\":\"operator\""));
        assert!(encoded.contains("\"action\":\"select\""));

        let decoded = decode_client_message(&encoded).unwrap();
        match decoded {
            ClientMessage::Operator { action, .. } => {
                assert_eq!(action, OperatorAction::Select { index: -1 });
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        assert!(decode_client_message("{\"type\":\"shutdown\"}").is_err());
        assert!(decode_client_message("not json").is_err());
    }

    #[test]
    fn test_frame_broadcast_decodes() {
        let message = ServerMessage::new_frame(
            Frame::Slide {
                slide_url: "file:///slides/002.png".to_string(),
            },
            1500,
        );
        let encoded = encode_server_message(&message).unwrap();

        let decoded = decode_server_message(&encoded).unwrap();
        match decoded {
            ServerMessage::Frame { frame, ts } => {
                assert_eq!(ts, 1500);
                assert!(matches!(frame, Frame::Slide { .. }));
            }
            _ => panic!("Wrong message type"),
        }
    }
}
