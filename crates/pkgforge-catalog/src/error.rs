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

/// Errors that can occur while reading or writing the catalog store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying SQLite failure.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    /// A manifest stored or produced through the catalog failed to parse or
    /// emit.
    #[error(transparent)]
    Format(#[from] pkgforge_format::Error),
    /// The on-disk schema exists but does not match what this gateway
    /// expects.
    #[error("catalog schema is incompatible with this version")]
    SchemaIncompatible,
    /// The `repo_update` marker row was found on open: a previous update
    /// aborted mid-transaction and the catalog must be treated as corrupt.
    #[error("catalog has an update in progress from a previous aborted run")]
    Corrupt,
    /// A savepoint name contained characters outside `[A-Za-z0-9_]`.
    #[error("invalid savepoint name: {0}")]
    InvalidSavepointName(String),
}

/// A specialized [`Result`][] type for this crate.
///
/// [`Result`]: std::result::Result
pub type Result<T = ()> = std::result::Result<T, Error>;
