//! Scripted in-memory directory for development and tests.
//!
//! [`InMemoryDirectory`] implements the connector seam over a fixed list of
//! entries. Searches evaluate a subset of RFC 4515 filters (`&`, `|`, `!`,
//! equality, presence and `*` substrings, all case-insensitive) and return hits
//! in insertion order. Binds are checked against a credential table.
//!
//! Failure injection covers the cases the connection manager has to survive:
//! an unreachable endpoint, slow connects, broken searches, slow searches, and a
//! server-side reset that kills every open session.

use super::{DirectoryConnector, DirectorySession};
use crate::entry::RawDirectoryEntry;
use crate::error::{DirectoryError, DirectoryResult, FILTER_ERROR, INVALID_CREDENTIALS};
use log::trace;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Operation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectoryStats {
    pub connects: usize,
    pub binds: usize,
    pub searches: usize,
    /// Sessions opened and not yet closed or dropped
    pub open_sessions: usize,
}

#[derive(Debug, Default)]
struct DirectoryState {
    entries: Vec<RawDirectoryEntry>,
    credentials: HashMap<String, String>,
    unreachable: bool,
    fail_searches: bool,
    search_delay: Option<Duration>,
    connect_delay: Option<Duration>,
    generation: u64,
    stats: DirectoryStats,
}

/// Shared handle to a scripted directory. Clones see the same state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    state: Arc<Mutex<DirectoryState>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, DirectoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_entry(&self, entry: RawDirectoryEntry) {
        self.state().entries.push(entry);
    }

    /// Remove every entry whose resolved path equals `path`.
    pub fn remove_entry(&self, path: &str) -> usize {
        let mut state = self.state();
        let before = state.entries.len();
        state
            .entries
            .retain(|entry| entry.resolved_path("distinguishedName") != Some(path));
        before - state.entries.len()
    }

    pub fn clear_entries(&self) {
        self.state().entries.clear();
    }

    pub fn add_credentials(&self, identity: impl Into<String>, secret: impl Into<String>) {
        self.state().credentials.insert(identity.into(), secret.into());
    }

    /// Refuse new connections.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    /// Fail every search with a transport error.
    pub fn fail_searches(&self, fail: bool) {
        self.state().fail_searches = fail;
    }

    pub fn set_search_delay(&self, delay: Option<Duration>) {
        self.state().search_delay = delay;
    }

    /// Hold every connection attempt open for `delay` before it resolves.
    pub fn set_connect_delay(&self, delay: Option<Duration>) {
        self.state().connect_delay = delay;
    }

    /// Kill every open session, as a server restart would.
    pub fn reset_sessions(&self) {
        self.state().generation += 1;
    }

    pub fn stats(&self) -> DirectoryStats {
        self.state().stats
    }
}

impl DirectoryConnector for InMemoryDirectory {
    type Session = InMemorySession;

    async fn open(&self, url: &str) -> DirectoryResult<InMemorySession> {
        let delay = self.state().connect_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        if state.unreachable {
            return Err(DirectoryError::Connect {
                url: url.to_string(),
                message: "connection refused".to_string(),
            });
        }

        state.stats.connects += 1;
        state.stats.open_sessions += 1;
        Ok(InMemorySession {
            directory: self.clone(),
            generation: state.generation,
            closed: false,
        })
    }
}

/// One session against an [`InMemoryDirectory`].
#[derive(Debug)]
pub struct InMemorySession {
    directory: InMemoryDirectory,
    generation: u64,
    closed: bool,
}

impl InMemorySession {
    fn check_alive(&self) -> DirectoryResult<()> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(DirectoryError::Transport("connection reset by peer".to_string()))
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            let mut state = self.directory.state();
            state.stats.open_sessions = state.stats.open_sessions.saturating_sub(1);
        }
    }
}

impl DirectorySession for InMemorySession {
    async fn bind(&mut self, identity: &str, secret: &str) -> DirectoryResult<()> {
        self.check_alive()?;
        let mut state = self.directory.state();
        state.stats.binds += 1;

        match state.credentials.get(identity) {
            Some(expected) if expected == secret => Ok(()),
            _ => Err(DirectoryError::Bind {
                identity: identity.to_string(),
                code: INVALID_CREDENTIALS,
                message: "invalid credentials".to_string(),
            }),
        }
    }

    async fn search(
        &mut self,
        base: &str,
        filter: &str,
        _attributes: &[String],
    ) -> DirectoryResult<Vec<RawDirectoryEntry>> {
        self.check_alive()?;
        let delay = self.directory.state().search_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_alive()?;

        let mut state = self.directory.state();
        state.stats.searches += 1;
        if state.fail_searches {
            return Err(DirectoryError::Transport("connection reset by peer".to_string()));
        }

        let parsed = Filter::parse(filter).ok_or_else(|| DirectoryError::Search {
            base: base.to_string(),
            filter: filter.to_string(),
            code: FILTER_ERROR,
            message: "bad search filter".to_string(),
        })?;

        let hits: Vec<RawDirectoryEntry> = state
            .entries
            .iter()
            .filter(|entry| under_base(entry, base) && parsed.matches(entry))
            .cloned()
            .collect();
        trace!("In-memory search {} under {} -> {} hits", filter, base, hits.len());
        Ok(hits)
    }

    async fn unbind(&mut self) -> DirectoryResult<()> {
        self.close();
        Ok(())
    }

    fn is_alive(&self) -> bool {
        !self.closed && self.directory.state().generation == self.generation
    }
}

impl Drop for InMemorySession {
    fn drop(&mut self) {
        self.close();
    }
}

fn under_base(entry: &RawDirectoryEntry, base: &str) -> bool {
    if base.is_empty() {
        return true;
    }
    entry
        .resolved_path("distinguishedName")
        .is_some_and(|path| path.to_lowercase().ends_with(&base.to_lowercase()))
}

/// Parsed search filter.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Present(String),
    Equal(String, String),
    Substring {
        attribute: String,
        initial: Option<String>,
        any: Vec<String>,
        last: Option<String>,
    },
}

impl Filter {
    fn parse(input: &str) -> Option<Filter> {
        let chars: Vec<char> = input.trim().chars().collect();
        let (filter, consumed) = parse_filter(&chars, 0)?;
        (consumed == chars.len()).then_some(filter)
    }

    fn matches(&self, entry: &RawDirectoryEntry) -> bool {
        match self {
            Filter::And(filters) => filters.iter().all(|f| f.matches(entry)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(entry)),
            Filter::Not(filter) => !filter.matches(entry),
            Filter::Present(attribute) => !entry.values(attribute).is_empty(),
            Filter::Equal(attribute, expected) => {
                let expected = expected.to_lowercase();
                entry
                    .values(attribute)
                    .iter()
                    .any(|value| value.to_lowercase() == expected)
            }
            Filter::Substring {
                attribute,
                initial,
                any,
                last,
            } => entry
                .values(attribute)
                .iter()
                .any(|value| substring_matches(&value.to_lowercase(), initial, any, last)),
        }
    }
}

fn substring_matches(
    value: &str,
    initial: &Option<String>,
    any: &[String],
    last: &Option<String>,
) -> bool {
    let mut rest = value;
    if let Some(initial) = initial {
        match rest.strip_prefix(initial.as_str()) {
            Some(remaining) => rest = remaining,
            None => return false,
        }
    }
    for piece in any {
        match rest.find(piece.as_str()) {
            Some(index) => rest = &rest[index + piece.len()..],
            None => return false,
        }
    }
    match last {
        Some(last) => rest.ends_with(last.as_str()),
        None => true,
    }
}

/// Parse one parenthesised filter starting at `pos`, returning it and the
/// position just past its closing parenthesis.
fn parse_filter(chars: &[char], pos: usize) -> Option<(Filter, usize)> {
    if chars.get(pos) != Some(&'(') {
        return None;
    }
    let pos = pos + 1;

    match chars.get(pos)? {
        '&' => {
            let (filters, end) = parse_list(chars, pos + 1)?;
            Some((Filter::And(filters), end))
        }
        '|' => {
            let (filters, end) = parse_list(chars, pos + 1)?;
            Some((Filter::Or(filters), end))
        }
        '!' => {
            let (inner, end) = parse_filter(chars, pos + 1)?;
            (chars.get(end) == Some(&')')).then(|| (Filter::Not(Box::new(inner)), end + 1))
        }
        _ => parse_item(chars, pos),
    }
}

fn parse_list(chars: &[char], mut pos: usize) -> Option<(Vec<Filter>, usize)> {
    let mut filters = Vec::new();
    while chars.get(pos) == Some(&'(') {
        let (filter, end) = parse_filter(chars, pos)?;
        filters.push(filter);
        pos = end;
    }
    (chars.get(pos) == Some(&')')).then(|| (filters, pos + 1))
}

fn parse_item(chars: &[char], pos: usize) -> Option<(Filter, usize)> {
    let eq = pos + chars[pos..].iter().position(|c| *c == '=')?;
    let attribute: String = chars[pos..eq].iter().collect();
    if attribute.is_empty() || attribute.contains(['(', ')', '*']) {
        return None;
    }

    let close = eq + 1 + chars[eq + 1..].iter().position(|c| *c == ')')?;
    let raw: String = chars[eq + 1..close].iter().collect();
    if raw.contains('(') {
        return None;
    }

    let filter = if raw == "*" {
        Filter::Present(attribute)
    } else if raw.contains('*') {
        let pieces: Vec<&str> = raw.split('*').collect();
        let unescape_piece = |piece: &str| -> Option<Option<String>> {
            if piece.is_empty() {
                Some(None)
            } else {
                unescape(piece).map(|value| Some(value.to_lowercase()))
            }
        };
        let initial = unescape_piece(pieces[0])?;
        let last = unescape_piece(pieces[pieces.len() - 1])?;
        let mut any = Vec::new();
        for piece in &pieces[1..pieces.len() - 1] {
            if let Some(value) = unescape_piece(piece)? {
                any.push(value);
            }
        }
        Filter::Substring {
            attribute,
            initial,
            any,
            last,
        }
    } else {
        Filter::Equal(attribute, unescape(&raw)?)
    };

    Some((filter, close + 1))
}

/// Decode `\xx` hex escapes into UTF-8 text.
fn unescape(raw: &str) -> Option<String> {
    let bytes = raw.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            let hex = raw.get(i + 1..i + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok()
}
