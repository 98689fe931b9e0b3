//! Projector display session
//!
//! Owns what is on screen and the overlay return timer. A session is driven
//! by `ProjectorSignal`s arriving over the relay and renders every state
//! change to its `DisplaySurface`.
//!
//! States:
//! - `Black`: initial state, also reached by `Black` and `Clear`
//! - `ShowingSlide`: remembers the slide for overlay returns
//! - `ShowingVerse`: may hold a pending return deadline

mod background;
mod render;

pub use background::BackgroundPool;
pub use render::{Frame, format_verse_html};

use crate::protocol::DisplayCommand;
use crate::relay::{DisplayFactory, DisplayLink, ProjectorSignal};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Where frames end up (a projector viewer, a test recorder)
pub trait DisplaySurface: Send + 'static {
    fn render(&mut self, frame: &Frame);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayState {
    Black,
    ShowingSlide(String),
    ShowingVerse {
        header: String,
        text: String,
        show_verse_numbers: bool,
    },
}

pub struct DisplaySession<S> {
    surface: S,
    backgrounds: BackgroundPool,
    state: DisplayState,
    last_slide: Option<String>,
    overlay_deadline: Option<Instant>,
}

impl<S: DisplaySurface> DisplaySession<S> {
    pub fn new(surface: S, backgrounds: BackgroundPool) -> Self {
        let mut session = Self {
            surface,
            backgrounds,
            state: DisplayState::Black,
            last_slide: None,
            overlay_deadline: None,
        };
        let background = session.backgrounds.pick();
        session.surface.render(&Frame::Black { background });
        session
    }

    /// Start with a slide to return to once an overlay elapses
    pub fn with_last_slide(mut self, last_slide: Option<String>) -> Self {
        self.last_slide = last_slide;
        self
    }

    #[cfg(test)]
    pub fn state(&self) -> &DisplayState {
        &self.state
    }

    /// When the pending overlay returns, if one is armed
    #[cfg(test)]
    pub fn overlay_deadline(&self) -> Option<Instant> {
        self.overlay_deadline
    }

    pub fn handle(&mut self, signal: ProjectorSignal, now: Instant) {
        match signal {
            ProjectorSignal::Clear | ProjectorSignal::Show(DisplayCommand::Black) => {
                self.show_black()
            }
            ProjectorSignal::Show(DisplayCommand::Slide { slide_url }) => {
                self.show_slide(slide_url)
            }
            ProjectorSignal::Show(DisplayCommand::Verse {
                header,
                text,
                show_verse_numbers,
                overlay_return_ms,
            }) => self.show_verse(header, text, show_verse_numbers, overlay_return_ms, now),
        }
    }

    /// Overlay deadline reached: go back to the last slide, or black if there never was one
    pub fn expire_overlay(&mut self) {
        self.overlay_deadline = None;
        match self.last_slide.clone() {
            Some(slide_url) => {
                tracing::debug!(%slide_url, "overlay elapsed, returning to slide");
                self.show_slide(slide_url)
            }
            None => {
                tracing::debug!("overlay elapsed with no slide shown, going black");
                self.show_black()
            }
        }
    }

    fn show_black(&mut self) {
        self.overlay_deadline = None;
        self.state = DisplayState::Black;
        self.surface.render(&Frame::Black { background: None });
    }

    fn show_slide(&mut self, slide_url: String) {
        self.overlay_deadline = None;
        self.last_slide = Some(slide_url.clone());
        self.surface.render(&Frame::Slide {
            slide_url: slide_url.clone(),
        });
        self.state = DisplayState::ShowingSlide(slide_url);
    }

    fn show_verse(
        &mut self,
        header: String,
        text: String,
        show_verse_numbers: bool,
        overlay_return_ms: u64,
        now: Instant,
    ) {
        // Replaces any pending deadline; 0 leaves the verse up
        self.overlay_deadline =
            (overlay_return_ms > 0).then(|| now + Duration::from_millis(overlay_return_ms));

        self.surface.render(&Frame::Verse {
            background: self.backgrounds.pick(),
            header: header.clone(),
            html: format_verse_html(&text, show_verse_numbers),
        });
        self.state = DisplayState::ShowingVerse {
            header,
            text,
            show_verse_numbers,
        };
    }

    /// Consume signals until the relay drops its end
    pub async fn run(mut self, mut signals: mpsc::UnboundedReceiver<ProjectorSignal>) {
        loop {
            tokio::select! {
                signal = signals.recv() => match signal {
                    Some(signal) => {
                        self.handle(signal, Instant::now());
                        tracing::trace!(state = ?self.state, "display state");
                    }
                    None => break,
                },
                _ = overlay_elapsed(self.overlay_deadline) => self.expire_overlay(),
            }
        }
        tracing::info!("projector display closed");
    }
}

async fn overlay_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Opens each display as a session task rendering to a clone of `surface`
pub struct TaskDisplayFactory<S> {
    surface: S,
    backgrounds: BackgroundPool,
}

impl<S: DisplaySurface + Clone> TaskDisplayFactory<S> {
    pub fn new(surface: S, backgrounds: BackgroundPool) -> Self {
        Self {
            surface,
            backgrounds,
        }
    }
}

impl<S: DisplaySurface + Clone> DisplayFactory for TaskDisplayFactory<S> {
    fn create(&mut self, last_slide: Option<String>) -> DisplayLink {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = DisplaySession::new(self.surface.clone(), self.backgrounds.clone())
            .with_last_slide(last_slide);
        tokio::spawn(session.run(rx));
        DisplayLink::new(tx)
    }
}

/// Surface that keeps every frame, for tests
#[cfg(test)]
#[derive(Clone, Default)]
pub struct RecordingSurface {
    frames: std::sync::Arc<std::sync::Mutex<Vec<Frame>>>,
}

#[cfg(test)]
impl RecordingSurface {
    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<Frame> {
        self.frames.lock().unwrap().last().cloned()
    }
}

#[cfg(test)]
impl DisplaySurface for RecordingSurface {
    fn render(&mut self, frame: &Frame) {
        self.frames.lock().unwrap().push(frame.clone());
    }
}
