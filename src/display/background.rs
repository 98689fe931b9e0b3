use crate::slides::{file_url, image_files};
use rand::seq::SliceRandom;
use std::path::PathBuf;

/// Folder of background images, re-read on every pick
#[derive(Debug, Clone, Default)]
pub struct BackgroundPool {
    dir: Option<PathBuf>,
}

impl BackgroundPool {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// Pool that never yields a background
    pub fn empty() -> Self {
        Self { dir: None }
    }

    /// A random background as a `file://` reference, or `None` if the folder is missing or empty
    pub fn pick(&self) -> Option<String> {
        let dir = self.dir.as_ref()?;
        let files = image_files(dir).ok()?;
        files
            .choose(&mut rand::thread_rng())
            .map(|name| file_url(&dir.join(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_from_folder() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"").unwrap();
        std::fs::write(dir.path().join("b.PNG"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();

        let pool = BackgroundPool::new(dir.path());
        for _ in 0..20 {
            let picked = pool.pick().unwrap();
            assert!(picked.ends_with("/a.jpg") || picked.ends_with("/b.PNG"));
        }
    }

    #[test]
    fn test_pick_without_images() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(BackgroundPool::new(dir.path()).pick(), None);
        assert_eq!(BackgroundPool::new(dir.path().join("missing")).pick(), None);
        assert_eq!(BackgroundPool::empty().pick(), None);
    }
}
