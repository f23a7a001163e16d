// src/core/commands/phrases.rs

//! Side-channel scan for a curated list of phrases, independent of commands.

use lazy_static::lazy_static;
use regex::Regex;

pub const PHRASE_REPLY: &str = "【=◈︿◈=】";

const PHRASES: &[&str] = &[
    "porter",
    "robinson",
    "shelter",
    "sad machine",
    "goodbye to a world",
    "goodbye world",
    "lionhearted",
    "sea of voices",
    "divinity",
    "fellow feeling",
    "flicker",
    "fresh static snow",
    "language",
    "years of war",
    "she heals everything",
    "say my name",
    "hear the bells",
    "polygon dust",
    "shepherdess",
    "natural light",
    "the thrill",
    "madeon",
    "anamanaguchi",
    "kero kero bonito",
];

lazy_static! {
    static ref PHRASE_RE: Regex = {
        let alternatives = PHRASES
            .iter()
            .map(|p| regex::escape(p))
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&format!(r"(?:^|\W)(?:{alternatives})(?:$|\W)")).unwrap()
    };
}

/// True if `text` contains one of the phrases as whole words, ignoring case.
pub fn mentions_curated_phrase(text: &str) -> bool {
    PHRASE_RE.is_match(&text.to_lowercase())
}
