//! Slide image discovery

use anyhow::{Context, Result};
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slide {
    /// File name shown to the operator
    pub display_name: String,
    /// `file://` reference handed to the projector
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlideListing {
    /// The slides folder does not exist
    Missing(PathBuf),
    /// Folder exists; may hold no images
    Loaded(Vec<Slide>),
}

impl SlideListing {
    pub fn slides(&self) -> &[Slide] {
        match self {
            SlideListing::Missing(_) => &[],
            SlideListing::Loaded(slides) => slides,
        }
    }
}

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

pub fn file_url(path: &Path) -> String {
    format!("file://{}", path.to_string_lossy().replace('\\', "/"))
}

/// Image file names in `dir`, unsorted
pub fn image_files(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && is_image(&path) {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    Ok(names)
}

/// List the slides in `dir` in natural order (`2.png` before `10.png`)
pub fn list_slides(dir: &Path) -> Result<SlideListing> {
    if !dir.is_dir() {
        return Ok(SlideListing::Missing(dir.to_path_buf()));
    }

    let mut names = image_files(dir)
        .with_context(|| format!("Failed to read slides folder: {}", dir.display()))?;
    names.sort_by(|a, b| natural_cmp(a, b));

    let slides = names
        .into_iter()
        .map(|name| Slide {
            reference: file_url(&dir.join(&name)),
            display_name: name,
        })
        .collect();

    Ok(SlideListing::Loaded(slides))
}

enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

fn chunks(s: &str) -> Vec<Chunk<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_digits = None;

    for (i, c) in s.char_indices() {
        let digit = c.is_ascii_digit();
        match in_digits {
            Some(prev) if prev != digit => {
                out.push(chunk(&s[start..i], prev));
                start = i;
            }
            _ => {}
        }
        in_digits = Some(digit);
    }
    if let Some(prev) = in_digits {
        out.push(chunk(&s[start..], prev));
    }
    out
}

fn chunk(s: &str, digits: bool) -> Chunk<'_> {
    if digits { Chunk::Digits(s) } else { Chunk::Text(s) }
}

fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a_trim = a.trim_start_matches('0');
    let b_trim = b.trim_start_matches('0');
    a_trim
        .len()
        .cmp(&b_trim.len())
        .then_with(|| a_trim.cmp(b_trim))
}

/// Numeric-aware, case-insensitive ordering of file names
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let left = chunks(a);
    let right = chunks(b);

    for (l, r) in left.iter().zip(right.iter()) {
        let ord = match (l, r) {
            (Chunk::Digits(x), Chunk::Digits(y)) => cmp_digits(x, y),
            (Chunk::Text(x), Chunk::Text(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
            (Chunk::Digits(_), Chunk::Text(_)) => Ordering::Less,
            (Chunk::Text(_), Chunk::Digits(_)) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }

    left.len().cmp(&right.len()).then_with(|| a.cmp(b))
}
