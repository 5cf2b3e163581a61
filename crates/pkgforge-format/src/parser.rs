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

//! Manifest parser: object-notation primary, document-markup fallback.

use std::path::Path;

use indexmap::{IndexMap, IndexSet};
use pkgforge_model::{Dependency, DirEntry, FileEntry, LicenseLogic, Package, ScriptPhase};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::urlcodec;

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Parses manifests in either dialect into a [`Package`].
#[derive(Debug, Clone, Default)]
pub struct Parser {
    schema: Schema,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Parser {
    /// Creates a parser with the standard schema registry.
    #[must_use]
    pub fn new() -> Self {
        Self { schema: Schema::new() }
    }

    /// Parses a manifest buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fatal`] if both the object-notation reading and the
    /// document-markup fallback fail, or a known key has a string value
    /// that fails its own per-kind validation (e.g. an invalid
    /// `licenselogic`).
    pub fn parse(&self, buf: &str) -> Result<Package> {
        match serde_json::from_str::<Value>(buf) {
            Ok(Value::Object(root)) if !self.needs_fallback(&root) => self.dispatch(&root),
            _ => self.parse_fallback(buf),
        }
    }

    /// Parses a manifest file.
    ///
    /// # Errors
    ///
    /// See [`Parser::parse`]; also returns [`Error::Io`] if the file cannot
    /// be read.
    pub fn parse_file<P>(&self, path: P) -> Result<Package>
    where
        P: AsRef<Path>,
    {
        let buf = std::fs::read_to_string(path)?;
        self.parse(&buf)
    }

    /// Returns whether any known key in `root` has an inadmissible kind.
    fn needs_fallback(&self, root: &Map<String, Value>) -> bool {
        root.iter()
            .any(|(key, value)| self.schema.contains_key(key) && !self.schema.admits(key, value))
    }

    /// Reparses `buf` via the document-markup bridge and dispatches it.
    fn parse_fallback(&self, buf: &str) -> Result<Package> {
        let value: serde_yaml::Value = serde_yaml::from_str(buf)?;
        match yaml_to_json(value) {
            Value::Object(root) => self.dispatch(&root),
            _ => Err(Error::Fatal("fallback document is not a mapping".to_string())),
        }
    }

    /// Dispatches every `(key, value)` pair of `root` into a fresh package.
    fn dispatch(&self, root: &Map<String, Value>) -> Result<Package> {
        let mut pkg = Package::default();
        for (key, value) in root {
            dispatch_one(&mut pkg, key, value)?;
        }
        Ok(pkg)
    }
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Dispatches a single manifest key into `pkg`.
fn dispatch_one(pkg: &mut Package, key: &str, value: &Value) -> Result {
    match key {
        "name" => assign_scalar(&mut pkg.name, value),
        "origin" => assign_str(&mut pkg.origin, value),
        "version" => assign_scalar(&mut pkg.version, value),
        "arch" => assign_str(&mut pkg.arch, value),
        "maintainer" => assign_str(&mut pkg.maintainer, value),
        "prefix" => assign_str(&mut pkg.prefix, value),
        "comment" => assign_str(&mut pkg.comment, value),
        "desc" => assign_decoded(&mut pkg.description, value),
        "message" => assign_decoded(&mut pkg.message, value),
        "www" => assign_str(&mut pkg.www, value),
        "repopath" => assign_str(&mut pkg.repository_path, value),
        "sum" => assign_str(&mut pkg.checksum, value),
        "pkgsize" => assign_u64(&mut pkg.package_size, value),
        "flatsize" => assign_u64(&mut pkg.flat_size, value),
        "licenselogic" => pkg.license_logic = parse_license_logic(value)?,
        "licenses" => extend_string_set(&mut pkg.licenses, value),
        "categories" => extend_string_set(&mut pkg.categories, value),
        "users" => dispatch_user_group(&mut pkg.users, "users", value),
        "groups" => dispatch_user_group(&mut pkg.groups, "groups", value),
        "deps" => dispatch_deps(pkg, value),
        "conflicts" => extend_string_set(&mut pkg.conflicts, value),
        "provides" => extend_string_set(&mut pkg.provides, value),
        "shlibs_required" | "shlibs" => extend_string_set(&mut pkg.shlibs_required, value),
        "shlibs_provided" => extend_string_set(&mut pkg.shlibs_provided, value),
        "options" => extend_string_map(&mut pkg.options, value),
        "option_defaults" => extend_string_map(&mut pkg.option_defaults, value),
        "option_descriptions" => extend_string_map(&mut pkg.option_descriptions, value),
        "files" => dispatch_files(pkg, value),
        "dirs" => dispatch_dirs_array(pkg, value),
        "directories" => dispatch_directories_object(pkg, value),
        "scripts" => dispatch_scripts(pkg, value),
        "annotations" => extend_string_map(&mut pkg.annotations, value),
        _ => {} // unknown key: silently skipped
    }
    Ok(())
}

fn assign_str(target: &mut String, value: &Value) {
    match value.as_str() {
        Some(s) => *target = s.to_string(),
        None => tracing::warn!("expected string value, got {value:?}"),
    }
}

fn assign_decoded(target: &mut String, value: &Value) {
    match value.as_str() {
        Some(s) => *target = urlcodec::decode(s),
        None => tracing::warn!("expected string value, got {value:?}"),
    }
}

fn assign_scalar(target: &mut String, value: &Value) {
    match scalar_string(value) {
        Some(s) => *target = s,
        None => tracing::warn!("expected string or integer value, got {value:?}"),
    }
}

fn assign_u64(target: &mut u64, value: &Value) {
    match value.as_u64() {
        Some(n) => *target = n,
        None => tracing::warn!("expected integer value, got {value:?}"),
    }
}

/// Accepts a string verbatim, or converts an integer to its string form -
/// used for keys whose primary kind is string but which also admit integers
/// (`name`, `version`).
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_license_logic(value: &Value) -> Result<LicenseLogic> {
    let s = value
        .as_str()
        .ok_or_else(|| Error::Fatal("licenselogic must be a string".to_string()))?;
    match s {
        "single" => Ok(LicenseLogic::Single),
        "or" | "dual" => Ok(LicenseLogic::Or),
        "and" | "multi" => Ok(LicenseLogic::And),
        other => Err(Error::Fatal(format!("invalid licenselogic value: {other}"))),
    }
}

fn extend_string_set(set: &mut IndexSet<String>, value: &Value) {
    let Some(items) = value.as_array() else {
        tracing::warn!("expected array value, got {value:?}");
        return;
    };
    for item in items {
        match item.as_str() {
            Some(s) => {
                set.insert(s.to_string());
            }
            None => tracing::warn!("skipping non-string array member: {item:?}"),
        }
    }
}

fn extend_string_map(map: &mut IndexMap<String, String>, value: &Value) {
    let Some(obj) = value.as_object() else {
        tracing::warn!("expected object value, got {value:?}");
        return;
    };
    for (key, value) in obj {
        match value.as_str() {
            Some(s) => {
                map.insert(key.clone(), s.to_string());
            }
            None => tracing::warn!("skipping non-string value for {key}"),
        }
    }
}

fn dispatch_user_group(target: &mut IndexMap<String, Option<u32>>, key: &str, value: &Value) {
    match value {
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::String(name) => {
                        target.insert(name.clone(), None);
                    }
                    Value::Object(obj) => insert_id_entries(target, obj),
                    _ => tracing::warn!("skipping malformed {key} entry: {item:?}"),
                }
            }
        }
        Value::Object(obj) => insert_id_entries(target, obj),
        _ => tracing::warn!("expected array or object for {key}, got {value:?}"),
    }
}

fn insert_id_entries(target: &mut IndexMap<String, Option<u32>>, obj: &Map<String, Value>) {
    for (name, attrs) in obj {
        let id = attrs.as_u64().map(|n| n as u32).or_else(|| {
            attrs
                .get("uid")
                .or_else(|| attrs.get("gid"))
                .and_then(Value::as_u64)
                .map(|n| n as u32)
        });
        target.insert(name.clone(), id);
    }
}

fn dispatch_deps(pkg: &mut Package, value: &Value) {
    let Some(obj) = value.as_object() else {
        tracing::warn!("expected object for deps, got {value:?}");
        return;
    };
    for (name, attrs) in obj {
        let Some(attrs) = attrs.as_object() else {
            tracing::warn!("skipping malformed dependency {name}");
            continue;
        };
        let origin = attrs
            .get("origin")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let version = attrs
            .get("version")
            .and_then(scalar_string)
            .unwrap_or_default();
        pkg.dependencies.insert(name.clone(), Dependency { origin, version });
    }
}

fn dispatch_files(pkg: &mut Package, value: &Value) {
    let Some(obj) = value.as_object() else {
        tracing::warn!("expected object for files, got {value:?}");
        return;
    };
    for (encoded, value) in obj {
        let path = urlcodec::decode(encoded);
        let entry = match value {
            Value::String(s) if s.len() == 64 => {
                FileEntry { checksum: s.clone(), ..FileEntry::default() }
            }
            Value::String(_) => FileEntry::default(),
            Value::Object(attrs) => FileEntry {
                checksum: attrs.get("sum").and_then(Value::as_str).unwrap_or_default().to_string(),
                owner: attrs.get("uname").and_then(Value::as_str).map(str::to_string),
                group: attrs.get("gname").and_then(Value::as_str).map(str::to_string),
                mode: attrs.get("perm").and_then(Value::as_str).map(parse_mode).unwrap_or(0),
            },
            _ => {
                tracing::warn!("skipping malformed files entry for {path}");
                continue;
            }
        };
        pkg.files.insert(path, entry);
    }
}

fn dir_entry_from_attrs(attrs: &Value) -> DirEntry {
    match attrs.as_object() {
        Some(obj) => DirEntry {
            owner: obj.get("uname").and_then(Value::as_str).map(str::to_string),
            group: obj.get("gname").and_then(Value::as_str).map(str::to_string),
            mode: obj.get("perm").and_then(Value::as_str).map(parse_mode).unwrap_or(0),
            try_flag: obj.get("try").and_then(Value::as_bool).unwrap_or(false),
        },
        None => DirEntry::default(),
    }
}

fn dispatch_dirs_array(pkg: &mut Package, value: &Value) {
    match value {
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::String(path) => {
                        pkg.directories.insert(urlcodec::decode(path), DirEntry::default());
                    }
                    Value::Object(obj) => {
                        for (path, attrs) in obj {
                            pkg.directories.insert(urlcodec::decode(path), dir_entry_from_attrs(attrs));
                        }
                    }
                    _ => tracing::warn!("skipping malformed dirs entry: {item:?}"),
                }
            }
        }
        Value::Object(obj) => {
            for (path, attrs) in obj {
                pkg.directories.insert(urlcodec::decode(path), dir_entry_from_attrs(attrs));
            }
        }
        _ => tracing::warn!("expected array or object for dirs, got {value:?}"),
    }
}

fn dispatch_directories_object(pkg: &mut Package, value: &Value) {
    let Some(obj) = value.as_object() else {
        tracing::warn!("expected object for directories, got {value:?}");
        return;
    };
    for (encoded, value) in obj {
        let path = urlcodec::decode(encoded);
        let entry = match value {
            Value::Bool(flag) => DirEntry { try_flag: *flag, ..DirEntry::default() },
            Value::String(s) => DirEntry { try_flag: s == "y", ..DirEntry::default() },
            Value::Object(_) => dir_entry_from_attrs(value),
            _ => {
                tracing::warn!("skipping malformed directories entry for {path}");
                continue;
            }
        };
        pkg.directories.insert(path, entry);
    }
}

fn dispatch_scripts(pkg: &mut Package, value: &Value) {
    let Some(obj) = value.as_object() else {
        tracing::warn!("expected object for scripts, got {value:?}");
        return;
    };
    for (phase_name, value) in obj {
        let Ok(phase) = phase_name.parse::<ScriptPhase>() else {
            tracing::warn!("skipping unknown script phase {phase_name}");
            continue;
        };
        let Some(body) = value.as_str() else {
            tracing::warn!("expected string body for script {phase_name}");
            continue;
        };
        pkg.scripts.insert(phase, urlcodec::decode(body));
    }
}

/// Parses a mode string under (a narrow, common subset of) `setmode` syntax:
/// a bare octal literal (`"0755"`, `"755"`), or comma-separated symbolic
/// clauses (`"u=rwx,g=rx,o=rx"`, `"a=rx"`). Anything else yields `0`.
fn parse_mode(s: &str) -> u32 {
    if !s.is_empty() && s.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
        if let Ok(mode) = u32::from_str_radix(s, 8) {
            return mode;
        }
    }
    match parse_symbolic_mode(s) {
        Some(mode) => mode,
        None => {
            tracing::warn!("unparseable mode string: {s}");
            0
        }
    }
}

fn parse_symbolic_mode(s: &str) -> Option<u32> {
    let mut mode = 0u32;
    for clause in s.split(',') {
        let (who, rest) = clause.split_once(['=', '+'])?;
        let bits = rest.bytes().try_fold(0u32, |acc, b| match b {
            b'r' => Some(acc | 0o4),
            b'w' => Some(acc | 0o2),
            b'x' => Some(acc | 0o1),
            _ => None,
        })?;
        match who {
            "u" => mode |= bits << 6,
            "g" => mode |= bits << 3,
            "o" => mode |= bits,
            "a" => mode |= bits | (bits << 3) | (bits << 6),
            _ => return None,
        }
    }
    Some(mode)
}

/// Bridges a YAML value tree into the canonical JSON value tree so that
/// dispatch is written once, against one tree type, regardless of dialect.
fn yaml_to_json(value: serde_yaml::Value) -> Value {
    match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => n
            .as_i64()
            .map(Value::from)
            .or_else(|| n.as_u64().map(Value::from))
            .or_else(|| n.as_f64().and_then(|f| serde_json::Number::from_f64(f).map(Value::Number)))
            .unwrap_or(Value::Null),
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(seq) => Value::Array(seq.into_iter().map(yaml_to_json).collect()),
        serde_yaml::Value::Mapping(mapping) => {
            let mut obj = Map::new();
            for (key, value) in mapping {
                let key = match key {
                    serde_yaml::Value::String(s) => s,
                    other => serde_yaml::to_string(&other).unwrap_or_default().trim().to_string(),
                };
                obj.insert(key, yaml_to_json(value));
            }
            Value::Object(obj)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Seed test S2: legacy document-markup fallback.
    #[test]
    fn legacy_document_markup_fallback() {
        let parser = Parser::new();
        let buf = "name: bar\norigin: misc/bar\nversion: 2.0\narch: x86:64\n";

        let pkg = parser.parse(buf).expect("fallback parse");
        assert_eq!(pkg.name, "bar");
        assert_eq!(pkg.origin, "misc/bar");
        assert_eq!(pkg.version, "2.0");
        assert_eq!(pkg.arch, "x86:64");
        assert!(pkg.validate().is_ok());
    }

    /// Seed test S3: unknown-kind fallback.
    #[test]
    fn unknown_kind_triggers_fallback() {
        let parser = Parser::new();
        let buf = r#"{"name":"bar","origin":"misc/bar","version":[1,2,3],"arch":"x86:64"}"#;

        // `version` as an array is not an admissible kind, so the primary
        // parser must bail; the document-markup bridge can't make sense of
        // the same JSON-as-YAML document either (YAML parses it fine, but
        // dispatch stores whatever it finds - the array value is dropped by
        // `assign_scalar`, which only accepts string/integer).
        let pkg = parser.parse(buf).expect("fallback parse");
        assert_eq!(pkg.name, "bar");
        assert!(pkg.version.is_empty());
    }

    #[test]
    fn dependencies_with_integer_version_are_tolerated() {
        let parser = Parser::new();
        let buf = r#"{"deps":{"bar":{"origin":"misc/bar","version":2}}}"#;
        let pkg = parser.parse(buf).expect("parse");
        assert_eq!(pkg.dependencies["bar"].version, "2");
    }

    #[test]
    fn shlibs_alias_maps_to_shlibs_required() {
        let parser = Parser::new();
        let buf = r#"{"shlibs":["libfoo.so.1"]}"#;
        let pkg = parser.parse(buf).expect("parse");
        assert!(pkg.shlibs_required.contains("libfoo.so.1"));
    }

    #[test]
    fn scripts_are_url_decoded_and_unknown_phases_skipped() {
        let parser = Parser::new();
        let buf = r#"{"scripts":{"post-install":"echo%20hi","pre-flight":"nope"}}"#;
        let pkg = parser.parse(buf).expect("parse");
        assert_eq!(pkg.scripts[&ScriptPhase::PostInstall], "echo hi");
        assert_eq!(pkg.scripts.len(), 1);
    }

    #[test]
    fn mode_parses_octal_and_symbolic() {
        assert_eq!(parse_mode("0755"), 0o755);
        assert_eq!(parse_mode("755"), 0o755);
        assert_eq!(parse_mode("u=rwx,g=rx,o=rx"), 0o755);
        assert_eq!(parse_mode("not-a-mode"), 0);
    }
}
