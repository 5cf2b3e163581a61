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

//! Configuration.
//!
//! This is a plain data struct, not a loader: reading it from a file or the
//! environment is the caller's concern (CLI and configuration loading are
//! out of scope, see `SPEC_FULL.md` §1/§13).

use std::path::PathBuf;

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Parameters the installer and updater need at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Path to the catalog database file.
    pub catalog_path: PathBuf,
    /// Root directory packages are installed relative to.
    pub install_root: PathBuf,
    /// Whether the updater silently accepts a legacy digest grammar the
    /// first time it sees one, rather than treating it as a hard error.
    pub legacy_digest_tolerant: bool,
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("/var/db/pkg/local.sqlite"),
            install_root: PathBuf::from("/"),
            legacy_digest_tolerant: true,
        }
    }
}
