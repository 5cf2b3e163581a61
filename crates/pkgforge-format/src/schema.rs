// Copyright (c) 2025 pkgforge contributors

// SPDX-License-Identifier: MIT
// Third-party contributions licensed under DCO

// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to
// deal in the Software without restriction, including without limitation the
// rights to use, copy, modify, merge, publish, distribute, sublicense, and/or
// sell copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:

// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.

// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NON-INFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS
// IN THE SOFTWARE.

// ----------------------------------------------------------------------------

//! Manifest schema registry.
//!
//! A two-level lookup, key -> set of admissible value-kinds, built once from
//! a static table and shared across parses. An unknown key is silently
//! skipped by the caller; a known key whose value has a kind outside its
//! admissible set is what tells the parser (§4.3) to abandon the
//! object-notation reading of the *whole* document and fall back to the
//! document-markup bridge - a key can never cause a fallback on its own,
//! only a key paired with a kind it doesn't expect.

use serde_json::Value;

// ----------------------------------------------------------------------------
// Enums
// ----------------------------------------------------------------------------

/// The shape of a manifest value, independent of dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// A JSON string.
    String,
    /// A JSON number with no fractional part.
    Integer,
    /// A JSON boolean.
    Boolean,
    /// A JSON array.
    Array,
    /// A JSON object.
    Object,
}

impl ValueKind {
    /// Classifies a parsed value's kind, if it's one this format models.
    #[must_use]
    pub fn of(value: &Value) -> Option<ValueKind> {
        match value {
            Value::String(_) => Some(ValueKind::String),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(ValueKind::Integer),
            Value::Bool(_) => Some(ValueKind::Boolean),
            Value::Array(_) => Some(ValueKind::Array),
            Value::Object(_) => Some(ValueKind::Object),
            Value::Number(_) | Value::Null => None,
        }
    }
}

// ----------------------------------------------------------------------------
// Constants
// ----------------------------------------------------------------------------

/// Static `(key, admissible kinds)` table.
///
/// Some keys are deliberately listed once with more than one admissible
/// kind (`name`, `version` as string or integer; `users`/`groups`/`dirs` as
/// array or object) rather than appearing as separate rows, since the
/// lookup is keyed by string and the value is the *set* of kinds.
const ENTRIES: &[(&str, &[ValueKind])] = &[
    ("name", &[ValueKind::String, ValueKind::Integer]),
    ("origin", &[ValueKind::String]),
    ("version", &[ValueKind::String, ValueKind::Integer]),
    ("arch", &[ValueKind::String]),
    ("abi", &[ValueKind::String]),
    ("maintainer", &[ValueKind::String]),
    ("prefix", &[ValueKind::String]),
    ("comment", &[ValueKind::String]),
    ("desc", &[ValueKind::String]),
    ("message", &[ValueKind::String]),
    ("www", &[ValueKind::String]),
    ("repopath", &[ValueKind::String]),
    ("sum", &[ValueKind::String]),
    ("pkgsize", &[ValueKind::Integer]),
    ("flatsize", &[ValueKind::Integer]),
    ("licenselogic", &[ValueKind::String]),
    ("licenses", &[ValueKind::Array]),
    ("categories", &[ValueKind::Array]),
    ("users", &[ValueKind::Array, ValueKind::Object]),
    ("groups", &[ValueKind::Array, ValueKind::Object]),
    ("deps", &[ValueKind::Object]),
    ("conflicts", &[ValueKind::Array]),
    ("provides", &[ValueKind::Array]),
    ("shlibs_required", &[ValueKind::Array]),
    ("shlibs_provided", &[ValueKind::Array]),
    ("shlibs", &[ValueKind::Array]),
    ("options", &[ValueKind::Object]),
    ("option_defaults", &[ValueKind::Object]),
    ("option_descriptions", &[ValueKind::Object]),
    ("files", &[ValueKind::Object]),
    ("dirs", &[ValueKind::Array, ValueKind::Object]),
    ("directories", &[ValueKind::Object]),
    ("scripts", &[ValueKind::Object]),
    ("annotations", &[ValueKind::Object]),
];

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// The materialised two-level lookup.
///
/// Immutable once built, so a single instance may be shared across many
/// parses (see `SPEC_FULL.md` §3, schema-registry lifecycle).
#[derive(Debug, Clone, Default)]
pub struct Schema;

impl Schema {
    /// Builds the registry from the static table.
    #[must_use]
    pub fn new() -> Self {
        Schema
    }

    /// Looks up the admissible kinds for `key`.
    ///
    /// Returns `None` for an unknown key (silently skip); `Some(kinds)` for
    /// a known key, against which the caller checks the actual value's kind.
    #[must_use]
    pub fn kinds_for(&self, key: &str) -> Option<&'static [ValueKind]> {
        ENTRIES
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, kinds)| *kinds)
    }

    /// Returns whether `key` is known to the registry at all.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.kinds_for(key).is_some()
    }

    /// Returns whether `value`'s kind is admissible for `key`.
    ///
    /// An unknown key is always admissible here (the caller skips unknown
    /// keys before ever asking this); a known key is admissible only if its
    /// value's kind appears in the registered set.
    #[must_use]
    pub fn admits(&self, key: &str, value: &Value) -> bool {
        match self.kinds_for(key) {
            None => true,
            Some(kinds) => ValueKind::of(value).is_some_and(|kind| kinds.contains(&kind)),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_key_is_always_admissible() {
        let schema = Schema::new();
        assert!(schema.admits("definitely-not-a-key", &json!(42)));
    }

    #[test]
    fn version_accepts_string_or_integer() {
        let schema = Schema::new();
        assert!(schema.admits("version", &json!("1.0")));
        assert!(schema.admits("version", &json!(1)));
        assert!(!schema.admits("version", &json!([1, 2, 3])));
    }

    #[test]
    fn users_accepts_array_or_object() {
        let schema = Schema::new();
        assert!(schema.admits("users", &json!(["alice"])));
        assert!(schema.admits("users", &json!({"alice": {"uid": 1000}})));
        assert!(!schema.admits("users", &json!("alice")));
    }
}
