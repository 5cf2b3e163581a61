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

//! Package entity.

use indexmap::{IndexMap, IndexSet};

use crate::error::{Error, Result};
use crate::script::ScriptPhase;

// ----------------------------------------------------------------------------
// Enums
// ----------------------------------------------------------------------------

/// The way a package's licenses combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LicenseLogic {
    /// Exactly one license applies.
    #[default]
    Single,
    /// Any one of the licenses applies.
    Or,
    /// All of the licenses apply together.
    And,
}

impl LicenseLogic {
    /// Returns the manifest token for this logic.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            LicenseLogic::Single => "single",
            LicenseLogic::Or => "or",
            LicenseLogic::And => "and",
        }
    }
}

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// A runtime dependency on another package.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Dependency {
    /// Origin of the dependency.
    pub origin: String,
    /// Version of the dependency.
    pub version: String,
}

/// An installed regular file owned by a package.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileEntry {
    /// SHA-256 checksum, or empty if unknown.
    pub checksum: String,
    /// Owning user name, if declared.
    pub owner: Option<String>,
    /// Owning group name, if declared.
    pub group: Option<String>,
    /// File mode, or 0 if unset/unparseable.
    pub mode: u32,
}

/// A directory owned by a package.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirEntry {
    /// Owning user name, if declared.
    pub owner: Option<String>,
    /// Owning group name, if declared.
    pub group: Option<String>,
    /// Directory mode, or 0 if unset/unparseable.
    pub mode: u32,
    /// Whether removal of this directory may silently fail if non-empty.
    pub try_flag: bool,
}

/// A binary package and everything it installs.
///
/// A package is constructed empty (via [`Package::default`]) and filled in
/// incrementally, either by the manifest parser or by a caller assembling one
/// attribute at a time. See [`Package::reset`] for clearing an instance for
/// reuse across catalog update iterations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Package {
    /// Package name.
    pub name: String,
    /// Opaque path-like identifier, unique within a catalog.
    pub origin: String,
    /// Package version string.
    pub version: String,
    /// Architecture/ABI token this package was built for.
    pub arch: String,
    /// Maintainer contact.
    pub maintainer: String,
    /// Install prefix.
    pub prefix: String,
    /// One-line summary.
    pub comment: String,
    /// Long-form description.
    pub description: String,
    /// Message shown after install.
    pub message: String,
    /// Upstream URL.
    pub www: String,
    /// Path of this package within its repository.
    pub repository_path: String,
    /// Checksum of the archive itself (not the manifest).
    pub checksum: String,
    /// Compressed archive size in bytes.
    pub package_size: u64,
    /// Installed (uncompressed) size in bytes.
    pub flat_size: u64,
    /// How the `licenses` set combines.
    pub license_logic: LicenseLogic,
    /// Current-format manifest content digest.
    pub digest: String,
    /// Legacy-format manifest content digest.
    pub old_digest: String,
    /// Name of the repository this package came from.
    pub repository_name: String,
    /// Whether this package was installed as an automatic dependency.
    pub automatic: bool,

    /// Category names.
    pub categories: IndexSet<String>,
    /// License identifiers.
    pub licenses: IndexSet<String>,
    /// Users this package declares, with optional numeric id.
    pub users: IndexMap<String, Option<u32>>,
    /// Groups this package declares, with optional numeric id.
    pub groups: IndexMap<String, Option<u32>>,
    /// Option name -> current value.
    pub options: IndexMap<String, String>,
    /// Option name -> default value.
    pub option_defaults: IndexMap<String, String>,
    /// Option name -> human-readable description.
    pub option_descriptions: IndexMap<String, String>,
    /// Dependency name -> {origin, version}.
    pub dependencies: IndexMap<String, Dependency>,
    /// Identifiers of packages this package conflicts with.
    pub conflicts: IndexSet<String>,
    /// Identifiers this package provides.
    pub provides: IndexSet<String>,
    /// Shared libraries this package requires.
    pub shlibs_required: IndexSet<String>,
    /// Shared libraries this package provides.
    pub shlibs_provided: IndexSet<String>,
    /// Path -> directory attributes.
    pub directories: IndexMap<String, DirEntry>,
    /// Path -> file attributes.
    pub files: IndexMap<String, FileEntry>,
    /// Phase -> script body.
    pub scripts: IndexMap<ScriptPhase, String>,
    /// Label -> annotation value.
    pub annotations: IndexMap<String, String>,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Package {
    /// Returns whether the given checksum is either empty or exactly 64
    /// lowercase hex characters.
    #[must_use]
    pub fn is_valid_checksum(value: &str) -> bool {
        value.is_empty()
            || (value.len() == 64
                && value.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()))
    }

    /// Validates that this package satisfies the core validity invariant.
    ///
    /// # Errors
    ///
    /// This method returns [`Error::Invalid`] if `name`, `origin`, `version`
    /// or `arch` are empty, or if any dependency is missing its origin or
    /// version.
    pub fn validate(&self) -> Result {
        if self.name.is_empty() {
            return Err(Error::Invalid("missing name".to_string()));
        }
        if self.origin.is_empty() {
            return Err(Error::Invalid("missing origin".to_string()));
        }
        if self.version.is_empty() {
            return Err(Error::Invalid("missing version".to_string()));
        }
        if self.arch.is_empty() {
            return Err(Error::Invalid("missing arch".to_string()));
        }
        for (name, dep) in &self.dependencies {
            if dep.origin.is_empty() || dep.version.is_empty() {
                return Err(Error::Invalid(format!(
                    "dependency {name} is missing origin or version"
                )));
            }
        }
        Ok(())
    }

    /// Empties every collection, leaving scalar attributes at their default.
    ///
    /// Used by the repository updater, which reuses one [`Package`] across
    /// many manifest parses rather than allocating a fresh one per entry.
    pub fn reset(&mut self) {
        *self = Package::default();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Package {
        Package {
            name: "foo".into(),
            origin: "misc/foo".into(),
            version: "1.0".into(),
            arch: "x86:64".into(),
            ..Package::default()
        }
    }

    #[test]
    fn validates_minimal_package() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn rejects_missing_origin() {
        let mut pkg = valid();
        pkg.origin.clear();
        assert!(pkg.validate().is_err());
    }

    #[test]
    fn rejects_incomplete_dependency() {
        let mut pkg = valid();
        pkg.dependencies.insert(
            "bar".into(),
            Dependency { origin: "misc/bar".into(), version: String::new() },
        );
        assert!(pkg.validate().is_err());
    }

    #[test]
    fn checksum_accepts_empty_and_64_hex() {
        assert!(Package::is_valid_checksum(""));
        assert!(Package::is_valid_checksum(&"a".repeat(64)));
        assert!(!Package::is_valid_checksum(&"a".repeat(63)));
        assert!(!Package::is_valid_checksum(&"A".repeat(64)));
    }

    #[test]
    fn reset_restores_default() {
        let mut pkg = valid();
        pkg.categories.insert("misc".into());
        pkg.reset();
        assert_eq!(pkg, Package::default());
    }
}
