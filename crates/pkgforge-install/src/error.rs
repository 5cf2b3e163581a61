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

use std::io;
use std::path::PathBuf;

/// Errors that can occur while installing a package.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The archive's `arch` does not match the host.
    #[error("architecture mismatch: package is built for {expected}, host is {found}")]
    Arch {
        /// Arch/ABI token declared by the package.
        expected: String,
        /// Arch/ABI token of the local host.
        found: String,
    },
    /// The archive's `osversion` annotation does not match the host.
    #[error("OS version mismatch: package requires {expected}, host is {found}")]
    OsVersion {
        /// OS version token declared by the package.
        expected: String,
        /// OS version token of the local host.
        found: String,
    },
    /// The package's origin is already present in the catalog.
    #[error("package is already installed")]
    AlreadyInstalled,
    /// A declared dependency is absent from the catalog and no sibling
    /// archive file was found to install it from.
    #[error("missing dependency: {0}")]
    MissingDependency(String),
    /// The archive did not contain a manifest entry.
    #[error("archive {0} has no manifest entry")]
    MissingManifest(PathBuf),
    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Underlying catalog failure.
    #[error(transparent)]
    Catalog(#[from] pkgforge_catalog::Error),
    /// Underlying manifest parse failure.
    #[error(transparent)]
    Format(#[from] pkgforge_format::Error),
    /// Underlying collaborator failure (archive read, script run).
    #[error(transparent)]
    Model(#[from] pkgforge_model::Error),
}

/// A specialized [`Result`][] type for this crate.
///
/// [`Result`]: std::result::Result
pub type Result<T = ()> = std::result::Result<T, Error>;
