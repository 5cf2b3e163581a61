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

//! Manifest object-notation parsing and emission.
//!
//! `pkgforge-format` is the self-describing dialect pair (primary
//! object-notation, fallback document-markup) that every other crate in this
//! workspace reads and writes packages through: [`parser::Parser`] decodes a
//! manifest into a [`pkgforge_model::Package`], and [`emitter::Emitter`]
//! serialises one back out deterministically, with an optional content
//! digest used by the catalog synchroniser to detect remote changes.

mod emitter;
mod error;
mod parser;
mod schema;
pub mod urlcodec;

pub use emitter::{Emitter, FileList, Mode};
pub use error::{Error, Result};
pub use parser::Parser;
pub use schema::{Schema, ValueKind};
