//! # Key Grammar
//!
//! Short keys, the five equivalent key notations, and the deterministic
//! per-namespace key reservoir.
//!
//! A short key is a kind tag (`I` item, `R` relation, `S` statement), an
//! optional `a` infix marking auto-generated entities, and a decimal number:
//! `I1234`, `Ia2478`, `R58`, `S4207`.
//!
//! A key string may additionally carry a namespace prefix and/or an ad-hoc
//! label. All of the following resolve to the same identity:
//!
//! - `I1234` (bare)
//! - `I1234__some_label` (name-labeled)
//! - `bi__I1234` (prefixed)
//! - `bi__I1234__some_label` (prefixed name-labeled)
//! - `I1234["some label"]` (index-labeled, also valid with a prefix)
//!
//! The parser normalizes every form to (prefix, short key, label); lookups
//! use only the bare short key, labels are checked for consistency against
//! the stored label.

use crate::primitives::{
    KEY_STRIDE, MAX_KEY_NUMBER, MAX_PREFIX_LENGTH, MAX_SHORT_KEY_LENGTH, MIN_KEY_NUMBER,
};
use crate::types::{EntityKind, NoemaError, Uri};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// KEY KIND
// =============================================================================

/// What a short key refers to, derived from its kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KeyKind {
    /// `I…`: an Item.
    Item,
    /// `R…`: a Relation.
    Relation,
    /// `S…`: a Statement.
    Statement,
}

impl KeyKind {
    /// The tag character of this kind.
    #[must_use]
    pub const fn tag(self) -> char {
        match self {
            Self::Item => 'I',
            Self::Relation => 'R',
            Self::Statement => 'S',
        }
    }

    /// The entity kind corresponding to this key kind, if any.
    /// Statements are not entities.
    #[must_use]
    pub const fn entity_kind(self) -> Option<EntityKind> {
        match self {
            Self::Item => Some(EntityKind::Item),
            Self::Relation => Some(EntityKind::Relation),
            Self::Statement => None,
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Item => f.write_str("Item"),
            Self::Relation => f.write_str("Relation"),
            Self::Statement => f.write_str("Statement"),
        }
    }
}

// =============================================================================
// PROCESSED KEY
// =============================================================================

/// The result of parsing a key string in any of the five notations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedKey {
    /// Namespace prefix, if the notation carried one.
    pub prefix: Option<String>,
    /// The bare short key, e.g. `I1234` or `Ia2478`.
    pub short_key: String,
    /// Kind derived from the tag letter.
    pub kind: KeyKind,
    /// True if the `a` infix marks the key as auto-generated.
    pub auto_generated: bool,
    /// Ad-hoc label, if the notation carried one (underscore or index form).
    pub label: Option<String>,
}

/// Scan a short key at the start of `s`.
///
/// Returns (consumed byte length, kind, auto flag) or `None` if `s` does not
/// start with a well-formed short key.
fn scan_short_key(s: &str) -> Option<(usize, KeyKind, bool)> {
    let bytes = s.as_bytes();
    let kind = match bytes.first()? {
        b'I' => KeyKind::Item,
        b'R' => KeyKind::Relation,
        b'S' => KeyKind::Statement,
        _ => return None,
    };
    let mut pos = 1;
    // `a` infix only exists for items and relations.
    let auto = kind != KeyKind::Statement && bytes.get(pos) == Some(&b'a');
    if auto {
        pos += 1;
    }
    let digits_start = pos;
    while bytes.get(pos).is_some_and(u8::is_ascii_digit) {
        pos += 1;
    }
    if pos == digits_start || pos > MAX_SHORT_KEY_LENGTH {
        return None;
    }
    Some((pos, kind, auto))
}

/// Check that `prefix` is a well-formed namespace prefix.
pub(crate) fn is_valid_prefix(prefix: &str) -> bool {
    !prefix.is_empty()
        && prefix.len() <= MAX_PREFIX_LENGTH
        && prefix
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
        && !prefix.as_bytes()[0].is_ascii_digit()
}

/// Parse a key string in any of the five notations.
///
/// Returns the decomposed key or `NoemaError::InvalidKey`.
pub fn parse_key(key_str: &str) -> Result<ProcessedKey, NoemaError> {
    let invalid = || NoemaError::InvalidKey(format!("'{key_str}' (maybe a literal or a typo)"));

    if key_str.is_empty() {
        return Err(invalid());
    }

    // Split off the prefix: if the string does not itself start with a short
    // key, everything before the first `__` is the prefix candidate.
    let (prefix, rest) = match scan_short_key(key_str) {
        Some(_) => (None, key_str),
        None => {
            let (p, r) = key_str.split_once("__").ok_or_else(invalid)?;
            if !is_valid_prefix(p) {
                return Err(invalid());
            }
            (Some(p.to_string()), r)
        }
    };

    let (consumed, kind, auto) = scan_short_key(rest).ok_or_else(invalid)?;
    let short_key = rest[..consumed].to_string();
    let suffix = &rest[consumed..];

    let label = parse_label_suffix(suffix).ok_or_else(invalid)?;

    Ok(ProcessedKey {
        prefix,
        short_key,
        kind,
        auto_generated: auto,
        label,
    })
}

/// Parse the part after the short key: empty, `__label`, or `["label"]`.
///
/// Returns `None` for malformed suffixes.
fn parse_label_suffix(suffix: &str) -> Option<Option<String>> {
    if suffix.is_empty() {
        return Some(None);
    }
    if let Some(label) = suffix.strip_prefix("__") {
        let ok = !label.is_empty()
            && label
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '-');
        return ok.then(|| Some(label.to_string()));
    }
    // index-labeled notation: ["..."] or ['...']
    let inner = suffix.strip_prefix('[')?.strip_suffix(']')?;
    let label = inner
        .strip_prefix('"')
        .and_then(|i| i.strip_suffix('"'))
        .or_else(|| inner.strip_prefix('\'').and_then(|i| i.strip_suffix('\'')))?;
    (!label.is_empty()).then(|| Some(label.to_string()))
}

/// Validate that `short_key` is exactly a bare short key (no prefix, no
/// label) and return its kind.
pub fn ensure_valid_short_key(short_key: &str) -> Result<(KeyKind, bool), NoemaError> {
    match scan_short_key(short_key) {
        Some((consumed, kind, auto)) if consumed == short_key.len() => Ok((kind, auto)),
        _ => Err(NoemaError::InvalidKey(format!(
            "'{short_key}' is not a valid short key"
        ))),
    }
}

/// Normalize a label for consistency comparison: lowercase, spaces and
/// dashes mapped to underscores. Both the stored label and the ad-hoc label
/// of a key notation pass through this before comparison.
#[must_use]
pub fn normalize_label(label: &str) -> String {
    label
        .to_lowercase()
        .replace([' ', '-'], "_")
}

/// Join a namespace base URI and a short key into a full URI.
#[must_use]
pub fn make_uri(base_uri: &str, short_key: &str) -> Uri {
    Uri::new(format!("{base_uri}#{short_key}"))
}

/// Render a short key from its parts, e.g. (`Item`, auto, 2478) → `Ia2478`.
#[must_use]
pub fn format_short_key(kind: KeyKind, auto_generated: bool, number: u64) -> String {
    if auto_generated && kind != KeyKind::Statement {
        format!("{}a{number}", kind.tag())
    } else {
        format!("{}{number}", kind.tag())
    }
}

// =============================================================================
// KEY MANAGER
// =============================================================================

/// Deterministic per-namespace reservoir of key numbers.
///
/// Numbers are drawn from `[MIN_KEY_NUMBER, MAX_KEY_NUMBER)` by a stride
/// walk: `n_i = MIN + (seed + i * KEY_STRIDE) mod span`. The stride is
/// coprime to the span, so every number is visited exactly once before the
/// reservoir is exhausted. The scatter keeps consecutively minted keys
/// visually unrelated (fresh keys do not suggest an ordering to module
/// authors) while staying fully reproducible per seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyManager {
    seed: u64,
    issued: u64,
}

impl KeyManager {
    /// Create a key manager with the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self { seed, issued: 0 }
    }

    /// The seed this manager was created with.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of keys handed out so far.
    #[must_use]
    pub fn issued(&self) -> u64 {
        self.issued
    }

    /// Draw the next key number, or `None` when the reservoir is exhausted.
    pub fn next_number(&mut self) -> Option<u64> {
        let span = MAX_KEY_NUMBER - MIN_KEY_NUMBER;
        if self.issued >= span {
            return None;
        }
        let offset = (self
            .seed
            .wrapping_add(self.issued.wrapping_mul(KEY_STRIDE)))
            % span;
        self.issued += 1;
        Some(MIN_KEY_NUMBER + offset)
    }
}

impl Default for KeyManager {
    fn default() -> Self {
        Self::new(crate::primitives::DEFAULT_KEY_SEED)
    }
}

// =============================================================================
// TESTS
// =============================================================================
