//! Composable matchers over observed values
//!
//! A matcher is a pure predicate plus a human-readable description of what it
//! expects. Matchers are typed per observation channel — `Matcher<u16>` for
//! HTTP status codes, `Matcher<str>` for bodies and command output,
//! `Matcher<i32>` for exit codes — and compose via [`not`] and [`one_of`].
//! String matchers can additionally be applied to a JSON field through
//! [`json`], which extracts a value with a dotted path (`entries.0.term`).

use regex::Regex;
use serde_json::Value;

/// A predicate over an observed value.
///
/// Checking is idempotent and side-effect free; `expected` renders the
/// condition for failure output.
pub trait Matcher<T: ?Sized>: Send + Sync {
    /// Returns true if `actual` satisfies this matcher's condition.
    fn matches(&self, actual: &T) -> bool;

    /// Human-readable description of what was expected.
    fn expected(&self) -> String;
}

/// A string matcher that also knows how to evaluate a decoded JSON field.
///
/// The default treats the field as a scalar: missing and `null` values fail,
/// anything else is matched against its string form. [`is_null`],
/// [`has_len`], and [`not`] override this.
pub trait ValueMatcher: Matcher<str> {
    fn matches_value(&self, value: Option<&Value>) -> bool {
        match value {
            None | Some(Value::Null) => false,
            Some(v) => self.matches(&scalar_text(v)),
        }
    }
}

/// String form of a JSON value: unquoted for strings, JSON text otherwise.
pub(crate) fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ── Is ───────────────────────────────────────────────────────────────────

/// Matches exact equality.
pub struct IsMatcher<V> {
    value: V,
}

/// Creates a matcher that validates exact equality.
pub fn is<V>(value: V) -> IsMatcher<V> {
    IsMatcher { value }
}

impl<V: AsRef<str> + Send + Sync> Matcher<str> for IsMatcher<V> {
    fn matches(&self, actual: &str) -> bool {
        actual == self.value.as_ref()
    }

    fn expected(&self) -> String {
        format!("{:?}", self.value.as_ref())
    }
}

impl<V: AsRef<str> + Send + Sync> ValueMatcher for IsMatcher<V> {}

impl Matcher<u16> for IsMatcher<u16> {
    fn matches(&self, actual: &u16) -> bool {
        *actual == self.value
    }

    fn expected(&self) -> String {
        status_text(self.value)
    }
}

impl Matcher<i32> for IsMatcher<i32> {
    fn matches(&self, actual: &i32) -> bool {
        *actual == self.value
    }

    fn expected(&self) -> String {
        self.value.to_string()
    }
}

/// Renders a status code with its canonical reason phrase, e.g. `200 OK`.
pub(crate) fn status_text(code: u16) -> String {
    match reqwest::StatusCode::from_u16(code).ok().and_then(|s| s.canonical_reason()) {
        Some(reason) => format!("{code} {reason}"),
        None => code.to_string(),
    }
}

// ── IsNull ───────────────────────────────────────────────────────────────

/// Matches a missing or `null` JSON field; never matches a plain string.
pub struct IsNullMatcher;

/// Creates a matcher for missing/`null` JSON fields.
pub fn is_null() -> IsNullMatcher {
    IsNullMatcher
}

impl Matcher<str> for IsNullMatcher {
    fn matches(&self, _actual: &str) -> bool {
        false
    }

    fn expected(&self) -> String {
        "null".to_string()
    }
}

impl ValueMatcher for IsNullMatcher {
    fn matches_value(&self, value: Option<&Value>) -> bool {
        matches!(value, None | Some(Value::Null))
    }
}

// ── Contains ─────────────────────────────────────────────────────────────

/// Matches a substring.
pub struct ContainsMatcher {
    substring: String,
}

/// Creates a matcher that checks if the actual value contains the substring.
pub fn contains(substring: impl Into<String>) -> ContainsMatcher {
    ContainsMatcher { substring: substring.into() }
}

impl Matcher<str> for ContainsMatcher {
    fn matches(&self, actual: &str) -> bool {
        actual.contains(&self.substring)
    }

    fn expected(&self) -> String {
        format!("containing {:?}", self.substring)
    }
}

impl ValueMatcher for ContainsMatcher {}

// ── Matches (regex) ──────────────────────────────────────────────────────

/// Matches a regular expression, compiled eagerly at construction.
pub struct RegexMatcher {
    pattern: Regex,
    raw: String,
}

/// Creates a regex matcher.
///
/// # Panics
///
/// Panics if the pattern does not compile — an invalid pattern is a stage
/// authoring error, surfaced at construction rather than at assert time.
pub fn matches(pattern: &str) -> RegexMatcher {
    let compiled = Regex::new(pattern)
        .unwrap_or_else(|e| panic!("invalid regex pattern {pattern:?}: {e}"));
    RegexMatcher { pattern: compiled, raw: pattern.to_string() }
}

impl Matcher<str> for RegexMatcher {
    fn matches(&self, actual: &str) -> bool {
        self.pattern.is_match(actual)
    }

    fn expected(&self) -> String {
        format!("matching pattern {:?}", self.raw)
    }
}

impl ValueMatcher for RegexMatcher {}

// ── OneOf ────────────────────────────────────────────────────────────────

/// Matches any of several accepted values.
pub struct OneOfMatcher<V> {
    values: Vec<V>,
}

/// Creates a matcher that accepts any of the provided values.
///
/// # Panics
///
/// Panics on an empty set — a `one_of` with nothing to accept can never
/// match and is a stage authoring error.
pub fn one_of<V>(values: impl IntoIterator<Item = V>) -> OneOfMatcher<V> {
    let values: Vec<V> = values.into_iter().collect();
    assert!(!values.is_empty(), "one_of requires at least one accepted value");
    OneOfMatcher { values }
}

fn describe_one_of(parts: &[String]) -> String {
    if parts.len() <= 5 {
        return format!("one of [{}]", parts.join(", "));
    }

    // Truncate for readability if too many options
    format!(
        "one of [{}, {}, {}, ... and {} more]",
        parts[0],
        parts[1],
        parts[2],
        parts.len() - 3
    )
}

impl<V: AsRef<str> + Send + Sync> Matcher<str> for OneOfMatcher<V> {
    fn matches(&self, actual: &str) -> bool {
        self.values.iter().any(|v| v.as_ref() == actual)
    }

    fn expected(&self) -> String {
        let parts: Vec<String> = self.values.iter().map(|v| format!("{:?}", v.as_ref())).collect();
        describe_one_of(&parts)
    }
}

impl<V: AsRef<str> + Send + Sync> ValueMatcher for OneOfMatcher<V> {}

impl Matcher<u16> for OneOfMatcher<u16> {
    fn matches(&self, actual: &u16) -> bool {
        self.values.contains(actual)
    }

    fn expected(&self) -> String {
        let parts: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        describe_one_of(&parts)
    }
}

impl Matcher<i32> for OneOfMatcher<i32> {
    fn matches(&self, actual: &i32) -> bool {
        self.values.contains(actual)
    }

    fn expected(&self) -> String {
        let parts: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        describe_one_of(&parts)
    }
}

// ── HasLen ───────────────────────────────────────────────────────────────

/// Matches on length: characters for strings, elements for JSON arrays,
/// entries for JSON objects.
pub struct HasLenMatcher {
    length: usize,
}

/// Creates a matcher that validates length.
pub fn has_len(length: usize) -> HasLenMatcher {
    HasLenMatcher { length }
}

impl Matcher<str> for HasLenMatcher {
    fn matches(&self, actual: &str) -> bool {
        actual.chars().count() == self.length
    }

    fn expected(&self) -> String {
        format!("length {}", self.length)
    }
}

impl ValueMatcher for HasLenMatcher {
    fn matches_value(&self, value: Option<&Value>) -> bool {
        match value {
            Some(Value::Array(items)) => items.len() == self.length,
            Some(Value::Object(map)) => map.len() == self.length,
            Some(Value::String(s)) => s.chars().count() == self.length,
            _ => false,
        }
    }
}

// ── Not ──────────────────────────────────────────────────────────────────

/// Negates another matcher.
pub struct NotMatcher<M> {
    inner: M,
}

/// Creates a matcher that negates another matcher.
pub fn not<M>(inner: M) -> NotMatcher<M> {
    NotMatcher { inner }
}

impl<T: ?Sized, M: Matcher<T>> Matcher<T> for NotMatcher<M> {
    fn matches(&self, actual: &T) -> bool {
        !self.inner.matches(actual)
    }

    fn expected(&self) -> String {
        format!("not {}", self.inner.expected())
    }
}

impl<M: ValueMatcher> ValueMatcher for NotMatcher<M> {
    fn matches_value(&self, value: Option<&Value>) -> bool {
        !self.inner.matches_value(value)
    }
}

// ── JSON field ───────────────────────────────────────────────────────────

/// Pairs a dotted JSON path with a matcher for the value at that path.
pub struct JsonFieldMatcher {
    path: String,
    inner: Box<dyn ValueMatcher>,
}

/// Creates a matcher that extracts a JSON field and validates it.
///
/// Paths are dotted, with numeric segments indexing arrays:
/// `json("entries.0.term", is("1"))`.
pub fn json(path: impl Into<String>, inner: impl ValueMatcher + 'static) -> JsonFieldMatcher {
    JsonFieldMatcher { path: path.into(), inner: Box::new(inner) }
}

impl JsonFieldMatcher {
    pub(crate) fn check(&self, body: &str) -> bool {
        let root: Value = match serde_json::from_str(body) {
            Ok(v) => v,
            Err(_) => return self.inner.matches_value(None),
        };

        self.inner.matches_value(lookup(&root, &self.path))
    }

    pub(crate) fn expected(&self) -> String {
        format!("field {}: {}", self.path, self.inner.expected())
    }

    /// Renders the observed value at this matcher's path for error output.
    pub(crate) fn observed(&self, body: &str) -> String {
        let root: Value = match serde_json::from_str(body) {
            Ok(v) => v,
            Err(_) => return "invalid JSON".to_string(),
        };

        match lookup(&root, &self.path) {
            None => "missing".to_string(),
            Some(v) => v.to_string(),
        }
    }
}

fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}
