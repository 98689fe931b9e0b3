//! Operator control surface
//!
//! Holds the slide deck, the current selection, the active version and the
//! remote lock. Every display change goes out through the relay; every
//! operator-visible change updates the preview line.

use crate::bible::{SearchError, VerseHit};
use crate::conf::SessionConfig;
use crate::protocol::{DisplayCommand, RemoteInput, SlideEntry, Version};
use crate::relay::Relay;
use crate::slides::{SlideListing, list_slides};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What would be projected if the operator pressed Project now
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    None,
    Slide(usize),
    Verse {
        reference: String,
        version: Version,
        text: String,
    },
}

/// Status line shown to every operator client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub title: String,
    pub text: String,
}

impl Preview {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
        }
    }
}

/// One row in the search results list
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ResultItem {
    pub title: String,
    pub snippet: String,
}

impl ResultItem {
    fn new(title: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            snippet: snippet.into(),
        }
    }
}

/// Outcome of the latest search
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SearchResults {
    #[default]
    Idle,
    Hits {
        version: Version,
        hits: Vec<VerseHit>,
    },
    NoResults,
    KeyMissing,
    SetupNeeded(Version),
    Failed(String),
}

impl SearchResults {
    pub fn from_outcome(version: Version, outcome: Result<Vec<VerseHit>, SearchError>) -> Self {
        match outcome {
            Ok(hits) if hits.is_empty() => SearchResults::NoResults,
            Ok(hits) => SearchResults::Hits { version, hits },
            Err(SearchError::Credential) => SearchResults::KeyMissing,
            Err(SearchError::Configuration(version)) => SearchResults::SetupNeeded(version),
            Err(e) => SearchResults::Failed(e.to_string()),
        }
    }

    pub fn items(&self) -> Vec<ResultItem> {
        match self {
            SearchResults::Idle => Vec::new(),
            SearchResults::Hits { version, hits } => hits
                .iter()
                .map(|hit| ResultItem::new(format!("{} ({})", hit.reference, version), &hit.text))
                .collect(),
            SearchResults::NoResults => vec![ResultItem::new(
                "No results",
                "Try a different phrase or a reference.",
            )],
            SearchResults::KeyMissing => vec![ResultItem::new(
                "API key missing",
                "Open Settings → paste your API.Bible key → Save.",
            )],
            SearchResults::SetupNeeded(version) => vec![ResultItem::new(
                "Setup needed",
                format!(
                    "Open Settings → add your API.Bible key → choose a Bible ID for {}.",
                    version
                ),
            )],
            SearchResults::Failed(message) => vec![ResultItem::new("Search failed", message)],
        }
    }
}

/// Point-in-time view of the control surface for status requests
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub current_version: Version,
    pub locked: bool,
    pub slides_dir: String,
    pub slide_count: usize,
    /// 1-based, `None` when there are no slides
    pub slide_number: Option<usize>,
    pub selection: String,
    pub display_open: bool,
    pub displays_opened: u64,
    pub remote_status: Option<String>,
    pub preview: Preview,
}

pub struct ControlSurface {
    config: SessionConfig,
    slides_dir: PathBuf,
    listing: SlideListing,
    slide_index: usize,
    selection: Selection,
    current_version: Version,
    locked: bool,
    results: SearchResults,
    preview: Preview,
    remote_status: Option<String>,
    relay: Relay,
}

impl ControlSurface {
    pub fn new(config: SessionConfig, slides_dir: impl Into<PathBuf>, relay: Relay) -> Self {
        let current_version = config.default_version;
        Self {
            config,
            slides_dir: slides_dir.into(),
            listing: SlideListing::Loaded(Vec::new()),
            slide_index: 0,
            selection: Selection::None,
            current_version,
            locked: false,
            results: SearchResults::Idle,
            preview: Preview::new(format!("Current Version: {}", current_version), "Ready."),
            remote_status: None,
            relay,
        }
    }

    /// Apply the default version, load the slides and put the first one up
    pub fn start(&mut self) -> anyhow::Result<()> {
        self.set_version(self.config.default_version);
        self.reload_slides()?;
        if !self.listing.slides().is_empty() {
            self.show_slide(0);
        }
        Ok(())
    }

    pub fn preview(&self) -> &Preview {
        &self.preview
    }

    #[cfg(test)]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    #[cfg(test)]
    pub fn current_version(&self) -> Version {
        self.current_version
    }

    pub fn listing(&self) -> &SlideListing {
        &self.listing
    }

    #[cfg(test)]
    pub fn slide_index(&self) -> usize {
        self.slide_index
    }

    pub fn reload_slides(&mut self) -> anyhow::Result<()> {
        self.listing = list_slides(&self.slides_dir)?;
        self.slide_index = 0;

        let count = self.listing.slides().len();
        self.preview = match &self.listing {
            SlideListing::Missing(dir) => Preview::new(
                "No slides folder",
                format!("Create {} and add 001.png, 002.png...", dir.display()),
            ),
            SlideListing::Loaded(_) if count == 0 => Preview::new(
                "No slides found",
                format!(
                    "Put slide images in {} (001.png, 002.png...).",
                    self.slides_dir.display()
                ),
            ),
            SlideListing::Loaded(_) => {
                Preview::new("Slides ready", format!("Loaded {} slide images.", count))
            }
        };

        if count > 0 {
            self.selection = Selection::Slide(0);
        } else if matches!(self.selection, Selection::Slide(_)) {
            self.selection = Selection::None;
        }

        tracing::info!(count, dir = %self.slides_dir.display(), "slides loaded");
        Ok(())
    }

    pub fn slide_entries(&self) -> Vec<SlideEntry> {
        self.listing
            .slides()
            .iter()
            .enumerate()
            .map(|(i, slide)| SlideEntry {
                number: i + 1,
                file: slide.display_name.clone(),
                active: i == self.slide_index,
            })
            .collect()
    }

    pub fn set_version(&mut self, version: Version) {
        self.current_version = version;
        self.preview = Preview::new(format!("Current Version: {}", version), "Ready.");
        tracing::debug!(%version, "version changed");
    }

    /// Select a slide without projecting it. Out-of-range indices saturate.
    pub fn select_slide(&mut self, index: i64) -> Option<usize> {
        let slides = self.listing.slides();
        if slides.is_empty() {
            return None;
        }

        let last = slides.len() - 1;
        let index = usize::try_from(index.max(0)).unwrap_or(usize::MAX).min(last);
        let file = slides[index].display_name.clone();

        self.slide_index = index;
        self.selection = Selection::Slide(index);
        self.preview = Preview::new(format!("Slide {}", index + 1), file);
        Some(index)
    }

    /// Select and project a slide
    pub fn show_slide(&mut self, index: i64) {
        let Some(index) = self.select_slide(index) else {
            return;
        };
        let slide_url = self.listing.slides()[index].reference.clone();
        self.relay.send(DisplayCommand::Slide { slide_url });
    }

    pub fn select_verse(&mut self, reference: String, version: Version, text: String) {
        self.preview = Preview::new(format!("{} ({})", reference, version), &text);
        self.selection = Selection::Verse {
            reference,
            version,
            text,
        };
    }

    /// Send the current selection to the projector
    pub fn project(&mut self) -> Option<DisplayCommand> {
        match self.selection.clone() {
            Selection::None => {
                self.preview = Preview::new("Nothing selected", "Pick a slide or a verse first.");
                None
            }
            Selection::Slide(index) => {
                self.show_slide(index as i64);
                let slide_url = self.listing.slides().get(self.slide_index)?.reference.clone();
                Some(DisplayCommand::Slide { slide_url })
            }
            Selection::Verse {
                reference,
                version,
                text,
            } => {
                let command = DisplayCommand::Verse {
                    header: format!("{} ({})", reference, version),
                    text,
                    show_verse_numbers: self.config.show_verse_numbers,
                    overlay_return_ms: self.config.overlay_return_ms,
                };
                self.relay.send(command.clone());
                Some(command)
            }
        }
    }

    pub fn next(&mut self) {
        self.show_slide(self.slide_index as i64 + 1);
    }

    pub fn prev(&mut self) {
        self.show_slide(self.slide_index as i64 - 1);
    }

    pub fn black(&mut self) {
        self.relay.send(DisplayCommand::Black);
        self.preview = Preview::new("Black screen", "Projector is black.");
    }

    pub fn clear(&mut self) {
        self.relay.clear();
        self.preview = Preview::new("Cleared", "Projector cleared.");
    }

    pub fn close_display(&mut self) -> bool {
        self.relay.close_display()
    }

    pub fn toggle_lock(&mut self) -> bool {
        self.locked = !self.locked;
        self.preview = if self.locked {
            Preview::new("Locked", "Auto changes blocked.")
        } else {
            Preview::new("Unlocked", "Auto changes allowed.")
        };
        self.locked
    }

    /// Version switches always apply; everything else is ignored while locked
    pub fn handle_remote_input(&mut self, input: RemoteInput) {
        self.remote_status = Some(format!("Input: {}", input.token()));

        match input {
            RemoteInput::SetVersion(version) => self.set_version(version),
            _ if self.locked => {
                tracing::debug!(token = input.token(), "remote input ignored while locked");
            }
            RemoteInput::Next => self.next(),
            RemoteInput::Prev => self.prev(),
            RemoteInput::Clear => self.clear(),
        }
    }

    /// The version a search for `query` should run against, or `None` for a blank query
    pub fn search_request(&self, query: &str) -> Option<Version> {
        (!query.trim().is_empty()).then_some(self.current_version)
    }

    pub fn apply_search(
        &mut self,
        version: Version,
        outcome: Result<Vec<VerseHit>, SearchError>,
    ) -> &SearchResults {
        if let Err(e) = &outcome {
            tracing::warn!(%version, "search failed: {}", e);
        }
        self.results = SearchResults::from_outcome(version, outcome);
        &self.results
    }

    /// Select the `n`th hit (0-based) of the latest search
    pub fn pick_result(&mut self, n: usize) -> bool {
        let SearchResults::Hits { version, hits } = &self.results else {
            return false;
        };
        let Some(hit) = hits.get(n) else {
            return false;
        };

        let (reference, version, text) = (hit.reference.clone(), *version, hit.text.clone());
        self.select_verse(reference, version, text);
        true
    }

    pub fn status(&self) -> StatusSnapshot {
        let slide_count = self.listing.slides().len();
        let selection = match &self.selection {
            Selection::None => "none".to_string(),
            Selection::Slide(i) => format!("Slide {}", i + 1),
            Selection::Verse {
                reference, version, ..
            } => format!("{} ({})", reference, version),
        };

        StatusSnapshot {
            current_version: self.current_version,
            locked: self.locked,
            slides_dir: self.slides_dir.display().to_string(),
            slide_count,
            slide_number: (slide_count > 0).then_some(self.slide_index + 1),
            selection,
            display_open: self.relay.display_open(),
            displays_opened: self.relay.displays_opened(),
            remote_status: self.remote_status.clone(),
            preview: self.preview.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::{CaptureFactory, ProjectorSignal};
    use std::fs;

    fn surface_with_slides(names: &[&str]) -> (ControlSurface, CaptureFactory, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        for name in names {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        let factory = CaptureFactory::default();
        let relay = Relay::new(Box::new(factory.clone()));
        let mut control = ControlSurface::new(SessionConfig::default(), dir.path(), relay);
        control.reload_slides().unwrap();
        (control, factory, dir)
    }

    fn slide_url(dir: &tempfile::TempDir, name: &str) -> String {
        crate::slides::file_url(&dir.path().join(name))
    }

    fn hit(reference: &str, text: &str) -> VerseHit {
        VerseHit {
            reference: reference.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_select_slide_saturates() {
        let (mut control, factory, _dir) = surface_with_slides(&["1.png", "2.png", "3.png"]);

        assert_eq!(control.select_slide(-1), Some(0));
        assert_eq!(control.selection(), &Selection::Slide(0));
        assert_eq!(control.select_slide(3), Some(2));
        assert_eq!(control.select_slide(i64::MAX), Some(2));
        assert_eq!(control.selection(), &Selection::Slide(2));
        assert_eq!(control.preview(), &Preview::new("Slide 3", "3.png"));

        // selecting never projects
        assert_eq!(factory.created(), 0);
    }

    #[test]
    fn test_select_slide_without_slides_is_noop() {
        let (mut control, _, _dir) = surface_with_slides(&[]);
        assert_eq!(control.select_slide(0), None);
        assert_eq!(control.selection(), &Selection::None);
        assert_eq!(control.preview().title, "No slides found");
    }

    #[test]
    fn test_missing_slides_folder() {
        let dir = tempfile::tempdir().unwrap();
        let relay = Relay::new(Box::new(CaptureFactory::default()));
        let mut control = ControlSurface::new(SessionConfig::default(), dir.path().join("nope"), relay);

        control.start().unwrap();
        assert_eq!(control.preview().title, "No slides folder");
        assert!(matches!(control.listing(), SlideListing::Missing(_)));
    }

    #[test]
    fn test_start_shows_first_slide() {
        let (mut control, factory, dir) = surface_with_slides(&["2.png", "10.png"]);
        control.start().unwrap();

        assert_eq!(
            factory.drain_latest(),
            vec![ProjectorSignal::Show(DisplayCommand::Slide {
                slide_url: slide_url(&dir, "2.png")
            })]
        );
        assert_eq!(control.current_version(), Version::Nlt);
    }

    #[test]
    fn test_set_version_ignores_lock() {
        let (mut control, factory, _dir) = surface_with_slides(&["1.png"]);
        control.toggle_lock();

        control.handle_remote_input(RemoteInput::SetVersion(Version::Kjv));
        assert_eq!(control.current_version(), Version::Kjv);
        assert_eq!(control.preview(), &Preview::new("Current Version: KJV", "Ready."));
        assert_eq!(factory.created(), 0);
    }

    #[test]
    fn test_locked_remote_leaves_display_untouched() {
        let (mut control, factory, _dir) = surface_with_slides(&["1.png", "2.png"]);
        control.show_slide(0);
        factory.drain_latest();

        assert!(control.toggle_lock());
        control.handle_remote_input(RemoteInput::Next);
        control.handle_remote_input(RemoteInput::Prev);
        control.handle_remote_input(RemoteInput::Clear);

        assert!(factory.drain_latest().is_empty());
        assert_eq!(control.slide_index(), 0);
        assert_eq!(control.status().remote_status.as_deref(), Some("Input: CLEAR"));
    }

    #[test]
    fn test_unlocked_remote_moves_and_clears() {
        let (mut control, factory, dir) = surface_with_slides(&["1.png", "2.png"]);

        control.handle_remote_input(RemoteInput::Next);
        control.handle_remote_input(RemoteInput::Next);
        control.handle_remote_input(RemoteInput::Clear);

        let slide_2 = ProjectorSignal::Show(DisplayCommand::Slide {
            slide_url: slide_url(&dir, "2.png"),
        });
        assert_eq!(
            factory.drain_latest(),
            vec![slide_2.clone(), slide_2, ProjectorSignal::Clear]
        );
        assert_eq!(control.preview(), &Preview::new("Cleared", "Projector cleared."));
    }

    #[test]
    fn test_operator_next_is_not_lock_gated() {
        let (mut control, factory, _dir) = surface_with_slides(&["1.png", "2.png"]);
        control.toggle_lock();
        control.next();
        assert_eq!(control.slide_index(), 1);
        assert_eq!(factory.drain_latest().len(), 1);
    }

    #[test]
    fn test_project_nothing_selected() {
        let (mut control, factory, _dir) = surface_with_slides(&[]);
        assert_eq!(control.project(), None);
        assert_eq!(
            control.preview(),
            &Preview::new("Nothing selected", "Pick a slide or a verse first.")
        );
        assert_eq!(factory.created(), 0);
    }

    #[test]
    fn test_project_verse_uses_config() {
        let (mut control, factory, _dir) = surface_with_slides(&[]);
        control.select_verse("John 3:16".to_string(), Version::Kjv, "16 For God".to_string());

        let expected = DisplayCommand::Verse {
            header: "John 3:16 (KJV)".to_string(),
            text: "16 For God".to_string(),
            show_verse_numbers: true,
            overlay_return_ms: 60_000,
        };
        assert_eq!(control.project(), Some(expected.clone()));
        assert_eq!(factory.drain_latest(), vec![ProjectorSignal::Show(expected)]);
    }

    #[test]
    fn test_selection_independent_of_display() {
        let (mut control, factory, _dir) = surface_with_slides(&["1.png", "2.png"]);
        control.show_slide(0);
        factory.drain_latest();

        control.select_slide(1);
        control.select_verse("Ps 23:1".to_string(), Version::Nlt, "1 The Lord".to_string());
        assert!(factory.drain_latest().is_empty());
    }

    #[test]
    fn test_unmapped_version_shows_setup_prompt() {
        let (mut control, _, _dir) = surface_with_slides(&[]);
        control.set_version(Version::Gnt);
        let version = control.search_request("love").unwrap();

        let results = control.apply_search(version, Err(SearchError::Configuration(version)));
        assert_eq!(
            results.items(),
            vec![ResultItem::new(
                "Setup needed",
                "Open Settings → add your API.Bible key → choose a Bible ID for GNT."
            )]
        );
    }

    #[test]
    fn test_search_outcomes_render_items() {
        assert_eq!(
            SearchResults::from_outcome(Version::Nlt, Ok(vec![])).items()[0].title,
            "No results"
        );
        assert_eq!(
            SearchResults::from_outcome(Version::Nlt, Err(SearchError::Credential)).items()[0]
                .title,
            "API key missing"
        );

        let failed = SearchResults::from_outcome(
            Version::Nlt,
            Err(SearchError::RemoteService {
                status: 401,
                message: "bad key".to_string(),
            }),
        );
        assert_eq!(failed.items()[0].title, "Search failed");
        assert!(failed.items()[0].snippet.contains("401"));
        assert!(SearchResults::Idle.items().is_empty());
    }

    #[test]
    fn test_blank_query_is_not_searched() {
        let (control, _, _dir) = surface_with_slides(&[]);
        assert_eq!(control.search_request("   "), None);
        assert_eq!(control.search_request("grace"), Some(Version::Nlt));
    }

    #[test]
    fn test_pick_keeps_searched_version() {
        let (mut control, _, _dir) = surface_with_slides(&[]);
        control.apply_search(
            Version::Nkjv,
            Ok(vec![hit("John 3:16", "16 For God"), hit("John 3:17", "17 For God sent")]),
        );
        control.set_version(Version::Gnt);

        assert!(control.pick_result(1));
        assert_eq!(
            control.selection(),
            &Selection::Verse {
                reference: "John 3:17".to_string(),
                version: Version::Nkjv,
                text: "17 For God sent".to_string(),
            }
        );
        assert_eq!(control.preview().title, "John 3:17 (NKJV)");
        assert!(!control.pick_result(2));
    }

    #[test]
    fn test_close_display_then_project_reopens() {
        let (mut control, factory, _dir) = surface_with_slides(&["1.png"]);
        control.show_slide(0);
        assert!(control.close_display());
        control.black();

        assert_eq!(factory.created(), 2);
        assert_eq!(
            factory.drain_latest(),
            vec![ProjectorSignal::Show(DisplayCommand::Black)]
        );
        assert_eq!(control.status().displays_opened, 2);
    }

    #[test]
    fn test_slide_entries_mark_active() {
        let (mut control, _, _dir) = surface_with_slides(&["a.png", "b.png"]);
        control.select_slide(1);
        let entries = control.slide_entries();
        assert_eq!(entries[1].number, 2);
        assert!(entries[1].active);
        assert!(!entries[0].active);
    }
}
