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

//! Errors.
//!
//! `UpToDate` is carried here for parity with the abstract result-code list
//! in `SPEC_FULL.md` §7/§11, but [`Updater::update`][crate::Updater::update]
//! never returns it as an `Err` - "no remote change" is a success outcome,
//! reported through [`crate::UpdateOutcome::UpToDate`] instead, the same way
//! `pkgforge-install` carries an unused `Error::AlreadyInstalled` alongside
//! its real `Outcome::AlreadyInstalled`.

use std::io;

/// Errors that can occur while running an incremental repository update.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No remote change since the caller's last known modification time.
    #[error("repository is up to date")]
    UpToDate,
    /// The catalog's `repo_update` marker was present on open: a previous
    /// update aborted mid-transaction.
    #[error("catalog is corrupt; a previous update did not complete")]
    Corrupt,
    /// Underlying I/O failure (including transport failures wrapped as I/O).
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Underlying catalog failure.
    #[error(transparent)]
    Catalog(#[from] pkgforge_catalog::Error),
    /// Underlying manifest parse failure.
    #[error(transparent)]
    Format(#[from] pkgforge_format::Error),
    /// An unparseable digest record.
    #[error("unparseable digest line: {0}")]
    DigestLine(String),
}

/// A specialized [`Result`][] type for this crate.
///
/// [`Result`]: std::result::Result
pub type Result<T = ()> = std::result::Result<T, Error>;
