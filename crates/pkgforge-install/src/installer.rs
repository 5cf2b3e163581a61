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

//! Archive-based installer (§4.6).
//!
//! Register-before-extract: the catalog row is written before any file
//! touches disk (step 7 precedes step 9), so a crash mid-extraction leaves a
//! catalog that the next invocation's "already installed" check (step 5)
//! will still catch, at the cost of a package row with no files on disk -
//! the asymmetry §9 calls out explicitly ("rollback without transactions on
//! the filesystem").

use std::path::{Path, PathBuf};
use std::{fs, io};

use pkgforge_catalog::Store;
use pkgforge_format::Parser;
use pkgforge_model::{ArchiveSource, Config, EventSink, Package, ScriptPhase, ScriptRunner};

use crate::arch::HostInfo;
use crate::error::{Error, Result};

// ----------------------------------------------------------------------------
// Constants
// ----------------------------------------------------------------------------

/// Archive entry names the opener consumes as metadata rather than payload.
const METADATA_NAMES: &[&str] = &["+MANIFEST", "+COMPACT_MANIFEST", "+DESC", "+DISPLAY"];

/// Manifest entry name read into a [`Package`].
const MANIFEST_NAME: &str = "+MANIFEST";

/// Suffix marking a payload entry as a protected configuration template.
const PKGCONF_SUFFIX: &str = ".pkgconf";

// ----------------------------------------------------------------------------
// Enums
// ----------------------------------------------------------------------------

/// What an [`Installer::install`] call actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The package was extracted and registered.
    Installed,
    /// The package's origin was already present; nothing was done.
    AlreadyInstalled,
}

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Installs packages from archives into a catalog, recursively resolving
/// missing dependencies from sibling archive files.
pub struct Installer<'a, A, S, E, H = crate::arch::SystemHostInfo> {
    store: &'a Store,
    archive: A,
    scripts: S,
    events: E,
    host: H,
    config: Config,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl<'a, A, S, E, H> Installer<'a, A, S, E, H>
where
    A: ArchiveSource,
    S: ScriptRunner,
    E: EventSink,
    H: HostInfo,
{
    /// Creates an installer over `store`, driven by the given collaborators.
    pub fn new(store: &'a Store, archive: A, scripts: S, events: E, host: H, config: Config) -> Self {
        Self { store, archive, scripts, events, host, config }
    }

    /// Installs the package at `archive_path` (§4.6).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Arch`] or [`Error::OsVersion`] on a host mismatch,
    /// [`Error::MissingDependency`] if a dependency can't be resolved,
    /// or any I/O, catalog, or format error encountered along the way.
    /// Steps 3-6 return before any catalog or filesystem mutation; a
    /// failure during extraction (step 9) triggers a rollback of already
    /// extracted files and directories before the error propagates.
    pub fn install(&self, archive_path: &Path, upgrade: bool, automatic: bool) -> Result<Outcome> {
        let span = tracing::info_span!("install", archive = %archive_path.display());
        let _guard = span.enter();

        let entries = self.archive.open(archive_path)?;
        let manifest_entry = entries
            .iter()
            .find(|e| entry_name(&e.path) == MANIFEST_NAME)
            .ok_or_else(|| Error::MissingManifest(archive_path.to_path_buf()))?;

        let manifest_text = String::from_utf8_lossy(&manifest_entry.body).into_owned();
        let mut pkg = Parser::new().parse(&manifest_text)?;
        if automatic {
            pkg.automatic = true;
        }

        self.check_arch(&pkg)?;
        self.check_os_version(&pkg)?;

        if self.store.contains_origin(&pkg.origin)? {
            self.events.emit_notice(&format!("{} already installed", pkg.origin));
            return Ok(Outcome::AlreadyInstalled);
        }

        self.resolve_dependencies(&pkg, archive_path)?;

        self.store.add_package(&pkg, true)?;

        if !upgrade {
            self.events.emit_notice(&format!("install begin: {}", pkg.origin));
            self.run_script(&pkg, ScriptPhase::PreInstall)?;
        }

        let payload = entries.iter().filter(|e| !is_metadata(&e.path));
        if let Err(err) = self.extract_payload(&pkg, payload) {
            self.events.emit_error(&format!("extraction failed for {}: {err}", pkg.origin));
            self.store.remove_package(&pkg.origin)?;
            return Err(err);
        }

        if upgrade {
            self.run_script(&pkg, ScriptPhase::PostUpgrade)?;
            self.events.emit_notice(&format!("upgrade finished: {}", pkg.origin));
        } else {
            self.run_script(&pkg, ScriptPhase::PostInstall)?;
            self.events.emit_notice(&format!("install finished: {}", pkg.origin));
        }

        Ok(Outcome::Installed)
    }

    fn check_arch(&self, pkg: &Package) -> Result {
        let found = self.host.machine();
        if pkg.arch != found {
            return Err(Error::Arch { expected: pkg.arch.clone(), found });
        }
        Ok(())
    }

    /// Compares the host's OS-version token against the package's
    /// `osversion` annotation. A package that declares no `osversion` skips
    /// the check entirely - the package entity (§3) has no dedicated scalar
    /// for it, so it travels in the generic annotations map.
    fn check_os_version(&self, pkg: &Package) -> Result {
        let Some(expected) = pkg.annotations.get("osversion") else {
            return Ok(());
        };
        let found = self.host.os_version();
        if *expected != found {
            return Err(Error::OsVersion { expected: expected.clone(), found });
        }
        Ok(())
    }

    fn resolve_dependencies(&self, pkg: &Package, archive_path: &Path) -> Result {
        for (dep_name, dep) in &pkg.dependencies {
            if self.store.contains_origin(&dep.origin)? {
                continue;
            }
            let dep_path = dependency_archive_path(archive_path, dep_name, &dep.version);
            if !dep_path.exists() {
                self.events.emit_error(&format!("missing dependency {} for {}", dep.origin, pkg.origin));
                return Err(Error::MissingDependency(dep.origin.clone()));
            }
            self.install(&dep_path, false, true)?;
        }
        Ok(())
    }

    fn run_script(&self, pkg: &Package, phase: ScriptPhase) -> Result {
        if let Some(body) = pkg.scripts.get(&phase) {
            self.scripts.run(pkg, phase, body)?;
        }
        Ok(())
    }

    fn extract_payload<'e>(
        &self,
        pkg: &Package,
        payload: impl Iterator<Item = &'e pkgforge_model::ArchiveEntry>,
    ) -> Result {
        let mut extracted_files = Vec::new();
        let mut extracted_dirs = Vec::new();

        let result = (|| -> Result {
            for entry in payload {
                let dest = self.install_dest(&entry.path);
                self.archive.write_entry(entry, &dest)?;
                if entry.is_dir {
                    extracted_dirs.push(dest.clone());
                } else {
                    extracted_files.push(dest.clone());
                }

                if let Some(stripped) = entry_name(&entry.path).strip_suffix(PKGCONF_SUFFIX) {
                    let stripped_dest = dest.with_file_name(stripped);
                    if target_missing(&stripped_dest)? {
                        self.archive.write_entry(entry, &stripped_dest)?;
                        extracted_files.push(stripped_dest);
                        self.events.emit_progress(&format!(
                            "installed configuration file {}",
                            stripped_dest.display()
                        ));
                    }
                }
            }
            Ok(())
        })();

        if result.is_err() {
            rollback(&extracted_files, &extracted_dirs);
        }
        let _ = pkg;
        result
    }

    fn install_dest(&self, entry_path: &Path) -> PathBuf {
        let relative = entry_path.strip_prefix("/").unwrap_or(entry_path);
        self.config.install_root.join(relative)
    }
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

fn entry_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("")
}

fn is_metadata(path: &Path) -> bool {
    METADATA_NAMES.contains(&entry_name(path))
}

/// Forms `{basedir}/{dep-name}-{dep-version}{ext}`, §4.6 step 6.
fn dependency_archive_path(archive_path: &Path, dep_name: &str, dep_version: &str) -> PathBuf {
    let basedir = archive_path.parent().unwrap_or_else(|| Path::new(""));
    let ext = archive_path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    basedir.join(format!("{dep_name}-{dep_version}{ext}"))
}

/// Corrected existence check for conf-file protection (§4.6, §9 resolved
/// open question): the stripped target is absent iff `symlink_metadata`
/// fails with [`io::ErrorKind::NotFound`], not by comparing a raw `lstat`
/// return value against the `ENOENT` constant.
fn target_missing(path: &Path) -> Result<bool> {
    match fs::symlink_metadata(path) {
        Ok(_) => Ok(false),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(Error::Io(e)),
    }
}

/// Removes already-extracted files and directories in reverse order.
/// Best-effort: a removal failure here must not mask the original
/// extraction error, so failures are swallowed rather than propagated.
fn rollback(files: &[PathBuf], dirs: &[PathBuf]) {
    for file in files.iter().rev() {
        let _ = fs::remove_file(file);
    }
    for dir in dirs.iter().rev() {
        let _ = fs::remove_dir(dir);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    use pkgforge_model::{ArchiveEntry, Dependency};

    struct FixtureArchive {
        by_path: HashMap<PathBuf, Vec<ArchiveEntry>>,
    }

    impl ArchiveSource for FixtureArchive {
        fn open(&self, path: &Path) -> pkgforge_model::Result<Vec<ArchiveEntry>> {
            Ok(self.by_path.get(path).cloned().unwrap_or_default())
        }

        fn write_entry(&self, entry: &ArchiveEntry, dest: &Path) -> pkgforge_model::Result {
            if entry.is_dir {
                fs::create_dir_all(dest)?;
            } else {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(dest, &entry.body)?;
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingEvents {
        notices: RefCell<Vec<String>>,
        errors: RefCell<Vec<String>>,
    }

    impl EventSink for RecordingEvents {
        fn emit_error(&self, message: &str) {
            self.errors.borrow_mut().push(message.to_string());
        }
        fn emit_progress(&self, _message: &str) {}
        fn emit_notice(&self, message: &str) {
            self.notices.borrow_mut().push(message.to_string());
        }
    }

    struct NoopScripts;
    impl ScriptRunner for NoopScripts {
        fn run(&self, _package: &Package, _phase: ScriptPhase, _body: &str) -> pkgforge_model::Result {
            Ok(())
        }
    }

    struct FixedHost {
        arch: &'static str,
    }
    impl HostInfo for FixedHost {
        fn machine(&self) -> String {
            self.arch.to_string()
        }
        fn os_version(&self) -> String {
            "unknown".to_string()
        }
    }

    fn manifest_entry(name: &str, manifest_json: &str) -> ArchiveEntry {
        ArchiveEntry {
            path: PathBuf::from(name),
            mode: 0o644,
            is_dir: false,
            body: manifest_json.as_bytes().to_vec(),
        }
    }

    fn file_entry(path: &str, body: &str) -> ArchiveEntry {
        ArchiveEntry { path: PathBuf::from(path), mode: 0o644, is_dir: false, body: body.as_bytes().to_vec() }
    }

    /// Seed test S4: install happy-path.
    #[test]
    fn install_happy_path_extracts_protects_confs_and_registers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive_path = dir.path().join("foo-1.0.pkg");
        fs::write(&archive_path, b"fixture").expect("touch archive");

        let manifest = r#"{"name":"foo","origin":"misc/foo","version":"1.0","arch":"x86:64"}"#;
        let entries = vec![
            manifest_entry(MANIFEST_NAME, manifest),
            file_entry("/usr/local/bin/foo", "#!/bin/sh\n"),
            file_entry("/usr/local/etc/foo.cfg.pkgconf", "default=1\n"),
        ];
        let archive = FixtureArchive { by_path: HashMap::from([(archive_path.clone(), entries)]) };

        let root = dir.path().join("root");
        let config = Config { install_root: root.clone(), ..Config::default() };
        let store = Store::open_in_memory().expect("open");
        store.init_schema().expect("init_schema");

        let events = RecordingEvents::default();
        let installer =
            Installer::new(&store, archive, NoopScripts, events, FixedHost { arch: "x86:64" }, config);

        let outcome = installer.install(&archive_path, false, false).expect("install");
        assert_eq!(outcome, Outcome::Installed);

        assert!(root.join("usr/local/bin/foo").exists());
        assert!(root.join("usr/local/etc/foo.cfg").exists(), "stripped .pkgconf target must be created");
        assert!(root.join("usr/local/etc/foo.cfg.pkgconf").exists(), "literal .pkgconf entry stays too");

        assert!(store.contains_origin("misc/foo").expect("contains_origin"));

        let notices = installer.events.notices.borrow();
        assert!(notices.iter().any(|n| n.starts_with("install begin")));
        assert!(notices.iter().any(|n| n.starts_with("install finished")));
    }

    /// Seed test S5: install missing dep.
    #[test]
    fn install_missing_dependency_aborts_without_catalog_mutation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive_path = dir.path().join("bar-1.0.pkg");
        fs::write(&archive_path, b"fixture").expect("touch archive");

        let manifest = r#"{
            "name":"bar","origin":"misc/bar","version":"1.0","arch":"x86:64",
            "deps":{"baz":{"origin":"misc/baz","version":"0.1"}}
        }"#;
        let entries = vec![manifest_entry(MANIFEST_NAME, manifest)];
        let archive = FixtureArchive { by_path: HashMap::from([(archive_path.clone(), entries)]) };

        let store = Store::open_in_memory().expect("open");
        store.init_schema().expect("init_schema");
        let config = Config { install_root: dir.path().join("root"), ..Config::default() };
        let events = RecordingEvents::default();
        let installer =
            Installer::new(&store, archive, NoopScripts, events, FixedHost { arch: "x86:64" }, config);

        let err = installer.install(&archive_path, false, false).expect_err("missing dep");
        assert!(matches!(err, Error::MissingDependency(ref o) if o == "misc/baz"));
        assert!(!store.contains_origin("misc/bar").expect("contains_origin"));
        assert!(!store.contains_origin("misc/baz").expect("contains_origin"));
    }

    #[test]
    fn install_recurses_into_present_sibling_dependency() {
        let dir = tempfile::tempdir().expect("tempdir");
        let bar_path = dir.path().join("bar-1.0.pkg");
        let baz_path = dir.path().join("baz-0.1.pkg");
        fs::write(&bar_path, b"fixture").expect("touch");
        fs::write(&baz_path, b"fixture").expect("touch");

        let bar_manifest = r#"{
            "name":"bar","origin":"misc/bar","version":"1.0","arch":"x86:64",
            "deps":{"baz":{"origin":"misc/baz","version":"0.1"}}
        }"#;
        let baz_manifest = r#"{"name":"baz","origin":"misc/baz","version":"0.1","arch":"x86:64"}"#;

        let archive = FixtureArchive {
            by_path: HashMap::from([
                (bar_path.clone(), vec![manifest_entry(MANIFEST_NAME, bar_manifest)]),
                (baz_path.clone(), vec![manifest_entry(MANIFEST_NAME, baz_manifest)]),
            ]),
        };

        let store = Store::open_in_memory().expect("open");
        store.init_schema().expect("init_schema");
        let config = Config { install_root: dir.path().join("root"), ..Config::default() };
        let events = RecordingEvents::default();
        let installer =
            Installer::new(&store, archive, NoopScripts, events, FixedHost { arch: "x86:64" }, config);

        let outcome = installer.install(&bar_path, false, false).expect("install");
        assert_eq!(outcome, Outcome::Installed);
        assert!(store.contains_origin("misc/bar").expect("contains_origin"));

        let baz = store.get_package("misc/baz").expect("get_package").expect("present");
        assert!(baz.automatic, "recursed dependency install must be marked automatic");
    }

    /// Seed test property 8: installer declines a package with mismatched
    /// arch *before* any filesystem or catalog mutation.
    #[test]
    fn arch_mismatch_is_declined_before_any_mutation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive_path = dir.path().join("foo-1.0.pkg");
        fs::write(&archive_path, b"fixture").expect("touch archive");

        let manifest = r#"{"name":"foo","origin":"misc/foo","version":"1.0","arch":"arm:64"}"#;
        let entries = vec![manifest_entry(MANIFEST_NAME, manifest), file_entry("/usr/local/bin/foo", "x")];
        let archive = FixtureArchive { by_path: HashMap::from([(archive_path.clone(), entries)]) };

        let root = dir.path().join("root");
        let config = Config { install_root: root.clone(), ..Config::default() };
        let store = Store::open_in_memory().expect("open");
        store.init_schema().expect("init_schema");
        let events = RecordingEvents::default();
        let installer =
            Installer::new(&store, archive, NoopScripts, events, FixedHost { arch: "x86:64" }, config);

        let err = installer.install(&archive_path, false, false).expect_err("arch mismatch");
        assert!(matches!(err, Error::Arch { .. }));
        assert!(!store.contains_origin("misc/foo").expect("contains_origin"));
        assert!(!root.exists(), "no filesystem mutation should have happened");
    }

    #[test]
    fn already_installed_short_circuits() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive_path = dir.path().join("foo-1.0.pkg");
        fs::write(&archive_path, b"fixture").expect("touch archive");

        let manifest = r#"{"name":"foo","origin":"misc/foo","version":"1.0","arch":"x86:64"}"#;
        let entries = vec![manifest_entry(MANIFEST_NAME, manifest)];
        let archive = FixtureArchive { by_path: HashMap::from([(archive_path.clone(), entries)]) };

        let store = Store::open_in_memory().expect("open");
        store.init_schema().expect("init_schema");
        store
            .add_package(
                &Package {
                    name: "foo".into(),
                    origin: "misc/foo".into(),
                    version: "1.0".into(),
                    arch: "x86:64".into(),
                    ..Package::default()
                },
                true,
            )
            .expect("pre-seed");

        let config = Config { install_root: dir.path().join("root"), ..Config::default() };
        let events = RecordingEvents::default();
        let installer =
            Installer::new(&store, archive, NoopScripts, events, FixedHost { arch: "x86:64" }, config);

        let outcome = installer.install(&archive_path, false, false).expect("install");
        assert_eq!(outcome, Outcome::AlreadyInstalled);
    }

    /// Regression test named in `SPEC_FULL.md` §8: "conf-file protection is
    /// stat-based." Exercises the corrected `io::ErrorKind::NotFound` check
    /// directly, both branches, independent of the S4 happy path.
    #[test]
    fn conf_file_protection_is_stat_based() {
        let dir = tempfile::tempdir().expect("tempdir");
        let present = dir.path().join("present.cfg");
        let absent = dir.path().join("absent.cfg");
        fs::write(&present, b"existing contents").expect("seed existing target");

        assert!(!target_missing(&present).expect("stat"));
        assert!(target_missing(&absent).expect("stat"));
    }

    #[test]
    fn dependency_archive_path_uses_basedir_name_version_and_extension() {
        let archive_path = Path::new("/srv/repo/bar-1.0.pkg");
        let dep_path = dependency_archive_path(archive_path, "baz", "0.1");
        assert_eq!(dep_path, PathBuf::from("/srv/repo/baz-0.1.pkg"));
    }

    #[test]
    fn os_version_mismatch_is_declined() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive_path = dir.path().join("foo-1.0.pkg");
        fs::write(&archive_path, b"fixture").expect("touch archive");

        let manifest = r#"{
            "name":"foo","origin":"misc/foo","version":"1.0","arch":"x86:64",
            "annotations":{"osversion":"99"}
        }"#;
        let entries = vec![manifest_entry(MANIFEST_NAME, manifest)];
        let archive = FixtureArchive { by_path: HashMap::from([(archive_path.clone(), entries)]) };

        let store = Store::open_in_memory().expect("open");
        store.init_schema().expect("init_schema");
        let config = Config { install_root: dir.path().join("root"), ..Config::default() };
        let events = RecordingEvents::default();
        let installer =
            Installer::new(&store, archive, NoopScripts, events, FixedHost { arch: "x86:64" }, config);

        let err = installer.install(&archive_path, false, false).expect_err("os version mismatch");
        assert!(matches!(err, Error::OsVersion { .. }));
    }
}
