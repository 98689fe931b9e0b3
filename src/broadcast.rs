//! Channel-based broadcast of projector frames
//!
//! The display session renders into a `BroadcastServer`; every connected
//! projector viewer receives the encoded frame. The latest frame is kept so
//! a viewer that connects late starts from the current picture.

use crate::display::{DisplaySurface, Frame};
use crate::protocol::ServerMessage;
use crate::transport::encode_server_message;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct BroadcastServer {
    tx: broadcast::Sender<String>,
    last: Arc<Mutex<Option<String>>>,
    start: Instant,
}

impl BroadcastServer {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(100);
        tracing::debug!("created frame broadcast channel");
        Self {
            tx,
            last: Arc::new(Mutex::new(None)),
            start: Instant::now(),
        }
    }

    /// Subscribe to frames, along with the one currently on screen
    pub fn subscribe(&self) -> (Option<String>, broadcast::Receiver<String>) {
        // render sends under the same lock, so each frame is either `last` or on `rx`
        let guard = self.last.lock().ok();
        let rx = self.tx.subscribe();
        let last = guard.and_then(|last| last.clone());
        tracing::debug!("projector viewer subscribed");
        (last, rx)
    }

    pub fn viewer_count(&self) -> usize {
        self.tx.receiver_count()
    }

    fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for BroadcastServer {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplaySurface for BroadcastServer {
    fn render(&mut self, frame: &Frame) {
        let message = ServerMessage::new_frame(frame.clone(), self.elapsed_ms());
        let json = match encode_server_message(&message) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("failed to encode frame: {}", e);
                return;
            }
        };

        let mut last = self.last.lock().ok();
        if let Some(last) = last.as_deref_mut() {
            *last = Some(json.clone());
        }

        match self.tx.send(json) {
            Ok(n) => tracing::debug!(frame = %frame.describe(), viewers = n, "frame broadcast"),
            Err(_) => tracing::debug!(frame = %frame.describe(), "frame rendered with no viewers"),
        }
        drop(last);
    }
}
