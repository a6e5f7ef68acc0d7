//! Chapter selection parsing.
//!
//! Accepts `all`, a single 1-based chapter number (`7`) or an inclusive 1-based
//! range (`5-10`), and applies it to an indexed chapter list.

use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Error, Result};
use crate::types::Chapter;

lazy_static! {
    static ref RANGE_RE: Regex = Regex::new(r"^(\d+)\s*-\s*(\d+)$").unwrap();
    static ref SINGLE_RE: Regex = Regex::new(r"^\d+$").unwrap();
}

/// A user's choice of chapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterSelection {
    All,
    Single(usize),
    Range(usize, usize),
}

impl FromStr for ChapterSelection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(ChapterSelection::All);
        }
        if let Some(caps) = RANGE_RE.captures(s) {
            let start = caps[1]
                .parse::<usize>()
                .map_err(|_| Error::EmptySelection("Invalid range format.".to_string()))?;
            let end = caps[2]
                .parse::<usize>()
                .map_err(|_| Error::EmptySelection("Invalid range format.".to_string()))?;
            return Ok(ChapterSelection::Range(start, end));
        }
        if s.contains('-') {
            return Err(Error::EmptySelection("Invalid range format.".to_string()));
        }
        if !SINGLE_RE.is_match(s) {
            return Err(Error::EmptySelection("Invalid chapter number.".to_string()));
        }
        s.parse::<usize>()
            .map(ChapterSelection::Single)
            .map_err(|_| Error::EmptySelection("Invalid chapter number.".to_string()))
    }
}

impl ChapterSelection {
    /// Picks the selected chapters out of `chapters`.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<Chapter>)` - The selected chapters, never empty
    /// * `Err(Error::EmptySelection)` - The selection is out of range or selects nothing
    pub fn apply(&self, chapters: &[Chapter]) -> Result<Vec<Chapter>> {
        let selected = match *self {
            ChapterSelection::All => chapters.to_vec(),
            ChapterSelection::Single(number) => {
                if number == 0 || number > chapters.len() {
                    return Err(Error::EmptySelection(
                        "Chapter number out of range.".to_string(),
                    ));
                }
                vec![chapters[number - 1].clone()]
            }
            ChapterSelection::Range(start, end) => {
                if start == 0 || end > chapters.len() {
                    return Err(Error::EmptySelection("Invalid chapter range.".to_string()));
                }
                if start > end {
                    Vec::new()
                } else {
                    chapters[start - 1..end].to_vec()
                }
            }
        };

        if selected.is_empty() {
            return Err(Error::EmptySelection(
                "No valid chapters selected.".to_string(),
            ));
        }
        Ok(selected)
    }
}
