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

//! Manifest emitter: deterministic object-notation serialisation and digest.

use indexmap::IndexMap;
use pkgforge_model::Package;
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest as _, Sha256};

use crate::error::Result;
use crate::urlcodec;

// ----------------------------------------------------------------------------
// Enums
// ----------------------------------------------------------------------------

/// Output dialect an [`Emitter`] produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Compact object-notation, one line, no surrounding whitespace.
    #[default]
    Compact,
    /// Indented document-markup dialect, for human consumption.
    Pretty,
}

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Compact file-list projection of a package: what files it owns, without
/// checksums or scripts. See `SPEC_FULL.md` §3, "Supplemental: file-list
/// projection."
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileList {
    /// Origin of the package the list was projected from.
    pub origin: String,
    /// Package name.
    pub name: String,
    /// Package version.
    pub version: String,
    /// Installed file paths, in the package's own insertion order.
    pub files: Vec<String>,
}

/// Serialises a [`Package`] back into the object-notation manifest format.
#[derive(Debug, Clone, Copy, Default)]
pub struct Emitter;

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Emitter {
    /// Creates an emitter.
    #[must_use]
    pub fn new() -> Self {
        Emitter
    }

    /// Emits `pkg` as a manifest byte stream in the given `mode`.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal value tree cannot be serialised
    /// (practically unreachable, since the tree is built from valid UTF-8
    /// strings and bounded-precision integers).
    pub fn emit(&self, pkg: &Package, mode: Mode) -> Result<Vec<u8>> {
        let root = build_root(pkg);
        let bytes = match mode {
            Mode::Compact => serde_json::to_vec(&Value::Object(root))?,
            Mode::Pretty => serde_yaml::to_string(&json_to_yaml(Value::Object(root)))?.into_bytes(),
        };
        Ok(bytes)
    }

    /// Emits `pkg` in compact mode and returns the SHA-256 digest of the
    /// exact emitted bytes, as 64 lowercase hex characters.
    ///
    /// # Errors
    ///
    /// See [`Emitter::emit`].
    pub fn digest(&self, pkg: &Package) -> Result<String> {
        let bytes = self.emit(pkg, Mode::Compact)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Projects `pkg` down to its compact file-list view (§3 supplemental).
    #[must_use]
    pub fn file_list(&self, pkg: &Package) -> FileList {
        FileList {
            origin: pkg.origin.clone(),
            name: pkg.name.clone(),
            version: pkg.version.clone(),
            files: pkg.files.keys().cloned().collect(),
        }
    }
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Builds the emitted root object in the fixed key order §4.4 requires.
fn build_root(pkg: &Package) -> Map<String, Value> {
    let mut root = Map::new();

    // 1. Scalar attributes, fixed order.
    root.insert("name".to_string(), Value::String(pkg.name.clone()));
    root.insert("origin".to_string(), Value::String(pkg.origin.clone()));
    root.insert("version".to_string(), Value::String(pkg.version.clone()));
    root.insert("arch".to_string(), Value::String(pkg.arch.clone()));
    root.insert("maintainer".to_string(), Value::String(pkg.maintainer.clone()));
    root.insert("prefix".to_string(), Value::String(pkg.prefix.clone()));
    root.insert("www".to_string(), Value::String(pkg.www.clone()));
    root.insert("repopath".to_string(), Value::String(pkg.repository_path.clone()));
    root.insert("sum".to_string(), Value::String(pkg.checksum.clone()));
    root.insert("flatsize".to_string(), Value::from(pkg.flat_size));

    // 2.
    root.insert("comment".to_string(), Value::String(pkg.comment.trim().to_string()));
    root.insert("licenselogic".to_string(), Value::String(pkg.license_logic.as_str().to_string()));
    root.insert("licenses".to_string(), string_set_array(pkg.licenses.iter()));
    if pkg.package_size > 0 {
        root.insert("pkgsize".to_string(), Value::from(pkg.package_size));
    }
    root.insert(
        "desc".to_string(),
        Value::String(urlcodec::encode(pkg.description.trim())),
    );
    root.insert("deps".to_string(), deps_object(pkg));

    // 3.
    root.insert("categories".to_string(), string_set_array(pkg.categories.iter()));
    root.insert("users".to_string(), id_map_object(&pkg.users));
    root.insert("groups".to_string(), id_map_object(&pkg.groups));
    root.insert("shlibs_required".to_string(), string_set_array(pkg.shlibs_required.iter()));
    root.insert("shlibs_provided".to_string(), string_set_array(pkg.shlibs_provided.iter()));
    root.insert("conflicts".to_string(), string_set_array(pkg.conflicts.iter()));
    root.insert("provides".to_string(), string_set_array(pkg.provides.iter()));
    root.insert("options".to_string(), string_map_object(&pkg.options));

    // 4. Always emitted here: this emitter has no "no-files"/"compact
    // excludes files" mode distinction of its own, only compact-vs-pretty
    // byte formatting (§4.4's "compact mode" governs whitespace, not which
    // keys are present).
    root.insert("files".to_string(), files_object(pkg));
    root.insert("directories".to_string(), directories_object(pkg));
    root.insert("scripts".to_string(), scripts_object(pkg));

    // 5.
    if !pkg.message.is_empty() {
        root.insert(
            "message".to_string(),
            Value::String(urlcodec::encode(pkg.message.trim())),
        );
    }

    root
}

fn string_set_array<'a, I>(items: I) -> Value
where
    I: Iterator<Item = &'a String>,
{
    Value::Array(items.map(|s| Value::String(s.clone())).collect())
}

fn string_map_object(map: &IndexMap<String, String>) -> Value {
    let mut obj = Map::new();
    for (key, value) in map {
        obj.insert(key.clone(), Value::String(value.clone()));
    }
    Value::Object(obj)
}

fn id_map_object(map: &IndexMap<String, Option<u32>>) -> Value {
    let mut obj = Map::new();
    for (name, id) in map {
        let value = match id {
            Some(id) => Value::from(*id),
            None => Value::Object(Map::new()),
        };
        obj.insert(name.clone(), value);
    }
    Value::Object(obj)
}

fn deps_object(pkg: &Package) -> Value {
    let mut obj = Map::new();
    for (name, dep) in &pkg.dependencies {
        let mut entry = Map::new();
        entry.insert("origin".to_string(), Value::String(dep.origin.clone()));
        entry.insert("version".to_string(), Value::String(dep.version.clone()));
        obj.insert(name.clone(), Value::Object(entry));
    }
    Value::Object(obj)
}

fn files_object(pkg: &Package) -> Value {
    let mut obj = Map::new();
    for (path, entry) in &pkg.files {
        let checksum = if entry.checksum.is_empty() {
            "-".to_string()
        } else {
            entry.checksum.clone()
        };
        obj.insert(urlcodec::encode(path), Value::String(checksum));
    }
    Value::Object(obj)
}

fn directories_object(pkg: &Package) -> Value {
    let mut obj = Map::new();
    for (path, entry) in &pkg.directories {
        let flag = if entry.try_flag { "y" } else { "n" };
        obj.insert(urlcodec::encode(path), Value::String(flag.to_string()));
    }
    Value::Object(obj)
}

fn scripts_object(pkg: &Package) -> Value {
    let mut obj = Map::new();
    for (phase, body) in &pkg.scripts {
        obj.insert(phase.as_str().to_string(), Value::String(urlcodec::encode(body.trim())));
    }
    Value::Object(obj)
}

/// Bridges the canonical JSON value tree into a YAML value tree for pretty
/// emission, the mirror image of `parser::yaml_to_json`.
fn json_to_yaml(value: Value) -> serde_yaml::Value {
    match value {
        Value::Null => serde_yaml::Value::Null,
        Value::Bool(b) => serde_yaml::Value::Bool(b),
        Value::Number(n) => serde_yaml::Value::Number(
            n.as_i64()
                .map(serde_yaml::Number::from)
                .or_else(|| n.as_u64().map(serde_yaml::Number::from))
                .or_else(|| n.as_f64().map(serde_yaml::Number::from))
                .unwrap_or_else(|| serde_yaml::Number::from(0)),
        ),
        Value::String(s) => serde_yaml::Value::String(s),
        Value::Array(items) => serde_yaml::Value::Sequence(items.into_iter().map(json_to_yaml).collect()),
        Value::Object(obj) => {
            let mut mapping = serde_yaml::Mapping::new();
            for (key, value) in obj {
                mapping.insert(serde_yaml::Value::String(key), json_to_yaml(value));
            }
            serde_yaml::Value::Mapping(mapping)
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use pkgforge_model::Dependency;

    fn tiny_package() -> Package {
        Package {
            name: "foo".into(),
            origin: "misc/foo".into(),
            version: "1.0".into(),
            arch: "x86:64".into(),
            prefix: "/usr/local".into(),
            description: "A demo\npackage".into(),
            ..Package::default()
        }
    }

    /// Seed test S1: round-trip tiny manifest.
    #[test]
    fn round_trips_tiny_manifest() {
        let emitter = Emitter::new();
        let parser = Parser::new();
        let pkg = tiny_package();

        let bytes = emitter.emit(&pkg, Mode::Compact).expect("emit");
        let text = String::from_utf8(bytes).expect("utf8");
        assert!(text.contains("%0a"), "description should be URL-encoded: {text}");

        let parsed = parser.parse(&text).expect("parse");
        assert_eq!(parsed.name, pkg.name);
        assert_eq!(parsed.origin, pkg.origin);
        assert_eq!(parsed.version, pkg.version);
        assert_eq!(parsed.arch, pkg.arch);
        assert_eq!(parsed.prefix, pkg.prefix);
        assert_eq!(parsed.description, pkg.description);

        let digest = emitter.digest(&pkg).expect("digest");
        assert_eq!(digest.len(), 64);
        assert!(digest.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
    }

    #[test]
    fn digest_matches_sha256_of_compact_bytes() {
        let emitter = Emitter::new();
        let pkg = tiny_package();
        let bytes = emitter.emit(&pkg, Mode::Compact).expect("emit");
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let expected = format!("{:x}", hasher.finalize());
        assert_eq!(emitter.digest(&pkg).expect("digest"), expected);
    }

    #[test]
    fn emission_is_deterministic() {
        let emitter = Emitter::new();
        let pkg = tiny_package();
        let first = emitter.emit(&pkg, Mode::Compact).expect("emit");
        let second = emitter.emit(&pkg, Mode::Compact).expect("emit");
        assert_eq!(first, second);
    }

    /// Regression test named in `SPEC_FULL.md` §8: "conflicts/provides
    /// identity." The source this system is modelled on builds each
    /// `conflicts`/`provides` array entry from an unrelated option-value
    /// accessor while iterating those collections; this emitter must instead
    /// use the conflict's/provide's own identifier.
    #[test]
    fn conflicts_and_provides_round_trip_their_own_identity() {
        let emitter = Emitter::new();
        let parser = Parser::new();
        let mut pkg = tiny_package();
        pkg.conflicts.insert("misc/foo-old".into());
        pkg.provides.insert("libfoo.so".into());
        pkg.options.insert("SOMEOPT".into(), "definitely-not-a-conflict-id".into());

        let bytes = emitter.emit(&pkg, Mode::Compact).expect("emit");
        let parsed = parser.parse(&String::from_utf8(bytes).expect("utf8")).expect("parse");

        assert!(parsed.conflicts.contains("misc/foo-old"));
        assert!(parsed.provides.contains("libfoo.so"));
        assert!(!parsed.conflicts.contains("definitely-not-a-conflict-id"));
        assert!(!parsed.provides.contains("definitely-not-a-conflict-id"));
    }

    #[test]
    fn file_list_projects_paths_without_checksums() {
        let emitter = Emitter::new();
        let mut pkg = tiny_package();
        pkg.files.insert("/usr/local/bin/foo".into(), Default::default());
        pkg.files.insert("/usr/local/bin/bar".into(), Default::default());

        let list = emitter.file_list(&pkg);
        assert_eq!(list.origin, pkg.origin);
        assert_eq!(list.files, vec!["/usr/local/bin/foo", "/usr/local/bin/bar"]);
    }

    #[test]
    fn pkgsize_omitted_when_zero_present_when_positive() {
        let emitter = Emitter::new();
        let mut pkg = tiny_package();
        assert!(!contains_key(&emitter, &pkg, "pkgsize"));
        pkg.package_size = 1024;
        assert!(contains_key(&emitter, &pkg, "pkgsize"));
    }

    fn contains_key(emitter: &Emitter, pkg: &Package, key: &str) -> bool {
        let bytes = emitter.emit(pkg, Mode::Compact).expect("emit");
        let value: Value = serde_json::from_slice(&bytes).expect("json");
        value.as_object().expect("object").contains_key(key)
    }

    #[test]
    fn emit_parse_fixpoint_on_a_richer_package() {
        let emitter = Emitter::new();
        let parser = Parser::new();
        let mut pkg = tiny_package();
        pkg.categories.insert("misc".into());
        pkg.licenses.insert("BSD2CLAUSE".into());
        pkg.dependencies.insert(
            "bar".into(),
            Dependency { origin: "misc/bar".into(), version: "2.0".into() },
        );
        pkg.options.insert("DOCS".into(), "on".into());

        let bytes = emitter.emit(&pkg, Mode::Compact).expect("emit");
        let parsed = parser.parse(&String::from_utf8(bytes).expect("utf8")).expect("parse");

        assert_eq!(parsed.categories, pkg.categories);
        assert_eq!(parsed.licenses, pkg.licenses);
        assert_eq!(parsed.dependencies, pkg.dependencies);
        assert_eq!(parsed.options, pkg.options);
    }
}
