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

/// Errors that can occur while parsing or emitting a manifest.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Neither dialect could make sense of the input.
    #[error("fatal manifest parse error: {0}")]
    Fatal(String),
    /// The package built from a manifest failed its validity invariant.
    #[error(transparent)]
    Model(#[from] pkgforge_model::Error),
    /// Object-notation (de)serialization failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Document-markup dialect (de)serialization failure.
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    /// Underlying I/O failure reading a manifest file.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A specialized [`Result`][] type for this crate.
///
/// [`Result`]: std::result::Result
pub type Result<T = ()> = std::result::Result<T, Error>;
