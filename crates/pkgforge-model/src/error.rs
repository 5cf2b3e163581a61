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

/// Errors that can occur while building or validating a package entity.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The package entity does not satisfy the validity invariant.
    #[error("invalid package: {0}")]
    Invalid(String),
    /// A mode string could not be parsed under `setmode` syntax.
    #[error("invalid mode string: {0}")]
    Mode(String),
    /// A script failed to run.
    #[error("script failed: {0}")]
    Script(String),
    /// Underlying I/O failure from a collaborator implementation.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A specialized [`Result`][] type for this crate.
///
/// [`Result`]: std::result::Result
pub type Result<T = ()> = std::result::Result<T, Error>;
