//! Organizational scope matching.
//!
//! Decides whether a directory path falls within one of the configured scopes.
//! The directory returns parent-path segments in more than one encoding depending
//! on how an entry was reached, so matching is textual rather than structural.
//! Layers are tried per scope in order, stopping at the first hit:
//!
//! 1. the full scope string occurs in the path (case-insensitive);
//! 2. the bare scope name occurs in the path: the scope lowercased, stripped of a
//!    leading `ou=` tag and of everything from the first `,dc=`, with bracketed
//!    qualifiers removed;
//! 3. for scopes under the organization root, the scope's location qualifier
//!    occurs in the path in its hex-escaped UTF-8 form.
//!
//! Any path containing the scope text anywhere is accepted, including paths that
//! are not structural descendants of the scope.

use log::debug;

/// Organization root token that enables the escaped-qualifier layer.
pub const ORGANIZATION_ROOT_TOKEN: &str = "盛业";

/// Location qualifiers recognised by the escaped-qualifier layer, with the
/// lowercase hex-escaped UTF-8 form of the full-width-bracketed qualifier.
pub const ESCAPED_LOCATION_QUALIFIERS: [(&str, &str); 2] = [
    ("大陆", r"\ef\bc\88\e5\a4\a7\e9\99\86\ef\bc\89"),
    ("香港", r"\ef\bc\88\e9\a6\99\e6\b8\af\ef\bc\89"),
];

const QUALIFIER_BRACKETS: [char; 8] = ['(', ')', '（', '）', '[', ']', '【', '】'];
const LOCATION_BRACKETS: [char; 4] = ['(', ')', '（', '）'];

/// Which layer accepted a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeMatch {
    FullScope,
    BareName,
    EscapedLocation,
}

/// Whether `path` falls within any of `scopes`.
pub fn is_in_scope<S: AsRef<str>>(path: &str, scopes: &[S]) -> bool {
    scopes
        .iter()
        .any(|scope| match_scope(path, scope.as_ref()).is_some())
}

/// Match `path` against a single scope, reporting the layer that accepted it.
pub fn match_scope(path: &str, scope: &str) -> Option<ScopeMatch> {
    let path_lower = path.to_lowercase();
    let scope_lower = scope.to_lowercase();

    if path_lower.contains(&scope_lower) {
        debug!("Path {} matched scope {} in full", path, scope);
        return Some(ScopeMatch::FullScope);
    }

    let bare_name = bare_scope_name(&scope_lower);
    if path_lower.contains(&bare_name) {
        debug!("Path {} matched scope name '{}'", path, bare_name);
        return Some(ScopeMatch::BareName);
    }

    if bare_name.contains(ORGANIZATION_ROOT_TOKEN) {
        if let Some(location) = location_qualifier(scope) {
            let location = location.to_lowercase();
            let escaped = ESCAPED_LOCATION_QUALIFIERS
                .iter()
                .find(|(name, _)| *name == location)
                .map(|(_, escaped)| *escaped);

            if let Some(escaped) = escaped {
                if path_lower.contains(escaped) {
                    debug!("Path {} matched escaped location '{}'", path, location);
                    return Some(ScopeMatch::EscapedLocation);
                }
            }
        }
    }

    None
}

/// Reduce a scope string to its bare name.
///
/// `ou=盛业（大陆）,dc=syf,dc=com` → `盛业`. The input is expected lowercased.
pub fn bare_scope_name(scope: &str) -> String {
    let without_tag = strip_prefix_ignore_ascii_case(scope, "ou=").unwrap_or(scope);
    let without_parents = match find_ignore_ascii_case(without_tag, ",dc=") {
        Some(index) => &without_tag[..index],
        None => without_tag,
    };
    strip_bracketed(without_parents.trim(), &QUALIFIER_BRACKETS)
        .trim()
        .to_string()
}

/// Text between the first pair of location brackets in `scope`.
pub fn location_qualifier(scope: &str) -> Option<&str> {
    let (open_index, open) = scope
        .char_indices()
        .find(|(_, c)| LOCATION_BRACKETS.contains(c))?;
    let start = open_index + open.len_utf8();
    let rest = &scope[start..];

    let mut end = None;
    for (index, c) in rest.char_indices() {
        if is_line_terminator(c) {
            break;
        }
        if LOCATION_BRACKETS.contains(&c) {
            end = Some(index);
            break;
        }
    }
    end.map(|end| &rest[..end])
}

/// Remove every bracket-delimited segment, brackets included.
///
/// Any bracket character opens a segment and the next bracket character on the
/// same line closes it; an opener with no closer is kept as-is.
fn strip_bracketed(text: &str, brackets: &[char]) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut result = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        if brackets.contains(&chars[i]) {
            let close = chars[i + 1..]
                .iter()
                .take_while(|c| !is_line_terminator(**c))
                .position(|c| brackets.contains(c));
            if let Some(offset) = close {
                i += offset + 2;
                continue;
            }
        }
        result.push(chars[i]);
        i += 1;
    }

    result
}

fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

fn strip_prefix_ignore_ascii_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &text[prefix.len()..])
}

fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .char_indices()
        .map(|(index, _)| index)
        .find(|&index| {
            haystack
                .get(index..index + needle.len())
                .is_some_and(|window| window.eq_ignore_ascii_case(needle))
        })
}
