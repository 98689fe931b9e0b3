//! Relay channel between the control surface and the projector display
//!
//! The control side calls `send`/`clear`; the relay opens a display on first
//! use and again whenever the previous one has gone away. Remote inputs flow
//! the other way over a plain mpsc channel.

use crate::protocol::{DisplayCommand, RemoteInput};
use tokio::sync::mpsc;

/// What the relay hands to a display session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectorSignal {
    Show(DisplayCommand),
    Clear,
}

/// Sending half of an open display
#[derive(Debug, Clone)]
pub struct DisplayLink {
    tx: mpsc::UnboundedSender<ProjectorSignal>,
}

impl DisplayLink {
    pub fn new(tx: mpsc::UnboundedSender<ProjectorSignal>) -> Self {
        Self { tx }
    }

    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    fn deliver(&self, signal: ProjectorSignal) -> Result<(), ProjectorSignal> {
        self.tx.send(signal).map_err(|e| e.0)
    }
}

pub trait DisplayFactory: Send {
    /// Open a display that returns overlays to `last_slide`
    fn create(&mut self, last_slide: Option<String>) -> DisplayLink;
}

pub struct Relay {
    display: Option<DisplayLink>,
    factory: Box<dyn DisplayFactory>,
    opened: u64,
    // survives display re-creation
    last_slide: Option<String>,
}

impl Relay {
    pub fn new(factory: Box<dyn DisplayFactory>) -> Self {
        Self {
            display: None,
            factory,
            opened: 0,
            last_slide: None,
        }
    }

    pub fn send(&mut self, command: DisplayCommand) {
        if let DisplayCommand::Slide { slide_url } = &command {
            self.last_slide = Some(slide_url.clone());
        }
        self.deliver(ProjectorSignal::Show(command));
    }

    pub fn clear(&mut self) {
        self.deliver(ProjectorSignal::Clear);
    }

    /// Drop the current display; the next send opens a fresh one
    pub fn close_display(&mut self) -> bool {
        let was_open = self.display.take().is_some_and(|link| link.is_open());
        if was_open {
            tracing::info!("projector display closed by operator");
        }
        was_open
    }

    pub fn display_open(&self) -> bool {
        self.display.as_ref().is_some_and(DisplayLink::is_open)
    }

    /// How many displays have been opened so far
    pub fn displays_opened(&self) -> u64 {
        self.opened
    }

    fn get_or_create_display(&mut self) -> &DisplayLink {
        if !self.display_open() {
            self.display = None;
        }

        let factory = &mut self.factory;
        let opened = &mut self.opened;
        let last_slide = &self.last_slide;
        self.display.get_or_insert_with(|| {
            *opened += 1;
            tracing::info!(count = *opened, "opening projector display");
            factory.create(last_slide.clone())
        })
    }

    fn deliver(&mut self, signal: ProjectorSignal) {
        let signal = match self.get_or_create_display().deliver(signal) {
            Ok(()) => return,
            Err(signal) => signal,
        };

        // display went away between the check and the send
        self.display = None;
        if self.get_or_create_display().deliver(signal).is_err() {
            tracing::warn!("projector display unavailable, dropping command");
        }
    }
}

pub type RemoteSender = mpsc::UnboundedSender<RemoteInput>;
pub type RemoteReceiver = mpsc::UnboundedReceiver<RemoteInput>;

pub fn remote_channel() -> (RemoteSender, RemoteReceiver) {
    mpsc::unbounded_channel()
}

/// Factory that keeps the receiving ends, for tests
#[cfg(test)]
#[derive(Clone, Default)]
pub struct CaptureFactory {
    pub receivers:
        std::sync::Arc<std::sync::Mutex<Vec<mpsc::UnboundedReceiver<ProjectorSignal>>>>,
    pub seeds: std::sync::Arc<std::sync::Mutex<Vec<Option<String>>>>,
}

#[cfg(test)]
impl CaptureFactory {
    /// Everything sent to the `n`th display so far
    pub fn drain(&self, n: usize) -> Vec<ProjectorSignal> {
        let mut receivers = self.receivers.lock().unwrap();
        let mut out = Vec::new();
        while let Ok(signal) = receivers[n].try_recv() {
            out.push(signal);
        }
        out
    }

    /// Everything sent to the most recent display
    pub fn drain_latest(&self) -> Vec<ProjectorSignal> {
        let n = self.receivers.lock().unwrap().len();
        if n == 0 {
            return Vec::new();
        }
        self.drain(n - 1)
    }

    pub fn created(&self) -> usize {
        self.receivers.lock().unwrap().len()
    }

    /// Simulate the projector window being closed
    pub fn close_latest(&self) {
        let mut receivers = self.receivers.lock().unwrap();
        if let Some(rx) = receivers.last_mut() {
            rx.close();
        }
    }
}

#[cfg(test)]
impl DisplayFactory for CaptureFactory {
    fn create(&mut self, last_slide: Option<String>) -> DisplayLink {
        let (tx, rx) = mpsc::unbounded_channel();
        self.receivers.lock().unwrap().push(rx);
        self.seeds.lock().unwrap().push(last_slide);
        DisplayLink::new(tx)
    }
}
