// src/core/protocol/message.rs

//! Classification of inbound protocol lines and builders for outbound ones.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref CHAT_RE: Regex =
        Regex::new(r"^:(\w+)!(\w+)@(\S+) PRIVMSG #(\w+) :(.+)$").unwrap();
    static ref PONG_RE: Regex = Regex::new(r"^(?::\S+ )?PONG(?: |$)").unwrap();
    static ref NAMES_END_RE: Regex =
        Regex::new(r"^:\S+ 366 (\w+) #(\w+) :End of /NAMES list$").unwrap();
}

/// A chat message sent to a channel by some user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub speaker: String,
    pub channel: String,
    pub text: String,
}

/// What an inbound line means to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundLine {
    /// Server keepalive probe; must be answered with a `PONG` carrying the token.
    Ping(String),
    /// Acknowledgement of our own keepalive probe.
    Pong,
    Chat(ChatMessage),
    /// Membership confirmation that ends a `JOIN`.
    NamesEnd { nick: String, channel: String },
    Other,
}

impl InboundLine {
    pub fn parse(line: &str) -> Self {
        if let Some(token) = line.strip_prefix("PING ") {
            return InboundLine::Ping(token.strip_prefix(':').unwrap_or(token).to_string());
        }
        if PONG_RE.is_match(line) {
            return InboundLine::Pong;
        }
        if let Some(caps) = CHAT_RE.captures(line) {
            return InboundLine::Chat(ChatMessage {
                speaker: caps[1].to_string(),
                channel: caps[4].to_string(),
                text: caps[5].to_string(),
            });
        }
        if let Some(caps) = NAMES_END_RE.captures(line) {
            return InboundLine::NamesEnd {
                nick: caps[1].to_string(),
                channel: caps[2].to_string(),
            };
        }
        InboundLine::Other
    }
}

// --- Outbound lines ---

pub fn pass(token: &str) -> String {
    format!("PASS oauth:{token}")
}

pub fn nick(name: &str) -> String {
    format!("NICK {name}")
}

pub fn user(name: &str) -> String {
    format!("USER {name} 0 * :{name}")
}

pub fn join(channel: &str) -> String {
    format!("JOIN #{channel}")
}

pub fn ping(token: &str) -> String {
    format!("PING :{token}")
}

pub fn pong(token: &str) -> String {
    format!("PONG :{token}")
}

pub fn privmsg(channel: &str, text: &str) -> String {
    format!("PRIVMSG #{channel} :{text}")
}

/// Prepares free text for a single `PRIVMSG`: line breaks become spaces, and
/// anything longer than `max_len` characters is cut down to end in `...`.
pub fn shape_text(text: &str, max_len: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect();
    if flat.chars().count() <= max_len {
        return flat;
    }
    let mut cut: String = flat.chars().take(max_len.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}
