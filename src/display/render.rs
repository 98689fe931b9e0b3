//! Deterministic rendering of display states into frames

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static INNER_VERSE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n(\d+)\s").expect("inner verse number pattern"));
static LEADING_VERSE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s").expect("leading verse number pattern"));

/// What the projector shows, ready for a viewer to paint
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum Frame {
    Black {
        background: Option<String>,
    },
    Slide {
        slide_url: String,
    },
    Verse {
        background: Option<String>,
        header: String,
        html: String,
    },
}

impl Frame {
    /// One-line summary for terminal viewers and logs
    pub fn describe(&self) -> String {
        match self {
            Frame::Black { background: None } => "BLACK".to_string(),
            Frame::Black {
                background: Some(bg),
            } => format!("BLACK (background {})", bg),
            Frame::Slide { slide_url } => format!("SLIDE {}", slide_url),
            Frame::Verse { header, html, .. } => {
                format!("VERSE {} | {}", header, html.replace("<br/>", " / "))
            }
        }
    }

    /// Standalone page that re-reads itself every second
    pub fn to_html_document(&self) -> String {
        let body = match self {
            Frame::Black { background } => background_div(background.as_deref()),
            Frame::Slide { slide_url } => {
                format!("<img class=\"slide\" src=\"{}\"/>", escape_html(slide_url))
            }
            Frame::Verse {
                background,
                header,
                html,
            } => format!(
                "{}<div class=\"content\"><div class=\"header\">{}</div><div class=\"text\">{}</div></div>",
                background_div(background.as_deref()),
                escape_html(header),
                html
            ),
        };

        format!(
            "<!doctype html>\n<html><head><meta charset=\"utf-8\"/>\
<meta http-equiv=\"refresh\" content=\"1\"/><title>Sermon Flow Projector</title>\
<style>{}</style></head><body>{}</body></html>\n",
            PROJECTOR_CSS, body
        )
    }
}

const PROJECTOR_CSS: &str = "html,body{margin:0;height:100%;background:#000;color:#fff;overflow:hidden}\
.bg{position:fixed;inset:0;background-size:cover;background-position:center;opacity:.55}\
.content{position:relative;display:flex;flex-direction:column;justify-content:center;height:100%;padding:0 6vw;font-family:sans-serif}\
.header{font-size:4vh;opacity:.8;margin-bottom:2vh}.text{font-size:6vh;line-height:1.3}\
.vnum{font-size:.55em;vertical-align:super;opacity:.7;margin-right:.2em}\
.slide{width:100%;height:100%;object-fit:contain}";

fn background_div(background: Option<&str>) -> String {
    match background {
        Some(url) => format!(
            "<div class=\"bg\" style=\"background-image:url('{}')\"></div>",
            escape_html(url)
        ),
        None => String::new(),
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Verse body as HTML: verse numbers wrapped when enabled, newlines as `<br/>`
pub fn format_verse_html(text: &str, show_verse_numbers: bool) -> String {
    let mut html = escape_html(text.trim());

    if show_verse_numbers {
        html = INNER_VERSE_NUMBER
            .replace_all(&html, "\n<span class=\"vnum\">${1}</span> ")
            .into_owned();
        html = LEADING_VERSE_NUMBER
            .replace(&html, "<span class=\"vnum\">${1}</span> ")
            .into_owned();
    }

    html.replace('\n', "<br/>")
}
