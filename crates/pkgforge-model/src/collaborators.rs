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

//! External collaborator boundaries.
//!
//! Everything this crate deliberately does not own - remote transport,
//! cryptographic trust, scripts execution, event logging, archive reading -
//! is expressed as a trait here. `pkgforge-install` and `pkgforge-sync` are
//! generic over these traits rather than coupled to one implementation.
//! Default implementations are provided only where supplying one doesn't
//! smuggle an out-of-scope feature back in (see `SPEC_FULL.md` §10).

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::SystemTime;

use flate2::read::GzDecoder;

use crate::error::{Error, Result};
use crate::package::Package;
use crate::script::ScriptPhase;

// ----------------------------------------------------------------------------
// Event sink
// ----------------------------------------------------------------------------

/// Sink for the three abstract event kinds callers observe a flow through.
pub trait EventSink {
    /// Reports a fatal or near-fatal condition.
    fn emit_error(&self, message: &str);
    /// Reports incremental progress (counts, percentages, item names).
    fn emit_progress(&self, message: &str);
    /// Reports a non-fatal, informational condition.
    fn emit_notice(&self, message: &str);
}

/// Default [`EventSink`] that forwards to [`tracing`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit_error(&self, message: &str) {
        tracing::error!("{message}");
    }

    fn emit_progress(&self, message: &str) {
        tracing::debug!("{message}");
    }

    fn emit_notice(&self, message: &str) {
        tracing::info!("{message}");
    }
}

// ----------------------------------------------------------------------------
// Archive reader
// ----------------------------------------------------------------------------

/// One entry read from an archive.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Path the entry was recorded under.
    pub path: PathBuf,
    /// POSIX permission bits.
    pub mode: u32,
    /// Whether this entry is a directory.
    pub is_dir: bool,
    /// Entry body, empty for directories.
    pub body: Vec<u8>,
}

/// Opens archives and extracts their entries to the filesystem.
pub trait ArchiveSource {
    /// Reads every entry of the archive at `path` into memory.
    fn open(&self, path: &Path) -> Result<Vec<ArchiveEntry>>;
    /// Writes one entry's body to `dest`, creating parent directories and
    /// applying the entry's mode.
    fn write_entry(&self, entry: &ArchiveEntry, dest: &Path) -> Result;
}

/// Default [`ArchiveSource`] over a gzip-compressed tar stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct TarArchiveSource;

impl ArchiveSource for TarArchiveSource {
    fn open(&self, path: &Path) -> Result<Vec<ArchiveEntry>> {
        let file = fs::File::open(path)?;
        let mut archive = tar::Archive::new(GzDecoder::new(file));

        let mut entries = Vec::new();
        for entry in archive.entries()? {
            let mut entry = entry?;
            let path = entry.path()?.into_owned();
            let mode = entry.header().mode().unwrap_or(0o644);
            let is_dir = entry.header().entry_type().is_dir();

            let mut body = Vec::new();
            if !is_dir {
                entry.read_to_end(&mut body)?;
            }
            entries.push(ArchiveEntry { path, mode, is_dir, body });
        }
        Ok(entries)
    }

    fn write_entry(&self, entry: &ArchiveEntry, dest: &Path) -> Result {
        if entry.is_dir {
            fs::create_dir_all(dest)?;
        } else {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(dest, &entry.body)?;
        }
        set_mode(dest, entry.mode)
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result {
    Ok(())
}

// ----------------------------------------------------------------------------
// Scripts interpreter
// ----------------------------------------------------------------------------

/// Runs a package's phase scripts.
pub trait ScriptRunner {
    /// Runs the script declared for `phase`, if any.
    fn run(&self, package: &Package, phase: ScriptPhase, body: &str) -> Result;
}

/// Default [`ScriptRunner`] that shells the script body out to `/bin/sh -c`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessScriptRunner;

impl ScriptRunner for ProcessScriptRunner {
    fn run(&self, package: &Package, phase: ScriptPhase, body: &str) -> Result {
        let status = Command::new("/bin/sh")
            .arg("-c")
            .arg(body)
            .env("PKG_PREFIX", &package.prefix)
            .status()?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::Script(format!(
                "{phase} script for {} exited with {status}",
                package.origin
            )))
        }
    }
}

// ----------------------------------------------------------------------------
// Remote transport
// ----------------------------------------------------------------------------

/// Fetches remote artifacts and reports their modification time.
///
/// Deliberately interface-only: fetching over a network is out of scope.
pub trait RemoteTransport {
    /// Opens the artifact at `url`, returning a reader and its mtime.
    fn fetch(&self, url: &str) -> Result<(Box<dyn Read>, SystemTime)>;
}

// ----------------------------------------------------------------------------
// Signature verification
// ----------------------------------------------------------------------------

/// Verifies the cryptographic signature of catalog metadata.
///
/// Deliberately interface-only, and deliberately without a no-op default:
/// a default that always returns `Ok` would be indistinguishable from "this
/// was actually verified" to a caller who forgot to supply a real verifier.
pub trait SignatureVerifier {
    /// Verifies `meta`, failing if the signature is absent or invalid.
    fn verify(&self, meta: &[u8]) -> Result;
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracing_sink_does_not_panic() {
        let sink = TracingEventSink;
        sink.emit_error("boom");
        sink.emit_progress("42%");
        sink.emit_notice("fyi");
    }

    #[test]
    fn tar_archive_source_round_trips_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = TarArchiveSource;
        let entry = ArchiveEntry {
            path: PathBuf::from("bin/foo"),
            mode: 0o755,
            is_dir: false,
            body: b"#!/bin/sh\necho hi\n".to_vec(),
        };

        let dest = dir.path().join("bin/foo");
        source.write_entry(&entry, &dest).expect("write_entry");
        assert_eq!(fs::read(&dest).expect("read back"), entry.body);
    }
}
