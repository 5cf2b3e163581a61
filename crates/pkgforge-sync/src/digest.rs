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

//! Digest-file record parsing (§6, §4.7 stage 6).

use pkgforge_model::Package;

use crate::error::{Error, Result};

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// One parsed record of a repository's digest file:
/// `origin:digest:offset:files-offset:length`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestLine {
    /// Package origin this record describes.
    pub origin: String,
    /// Content digest (current or legacy grammar).
    pub digest: String,
    /// Byte offset of the manifest within the mapped manifests stream.
    pub offset: u64,
    /// Byte offset of the package's file-list projection, unused by the
    /// updater itself but preserved for round-tripping the record.
    pub files_offset: u64,
    /// Manifest slice length, or 0 meaning "to end of stream."
    pub length: u64,
}

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Parses one digest-file line.
///
/// # Errors
///
/// Returns [`Error::DigestLine`] if the line has fewer than the four
/// required `:`-separated fields, or if `offset`/`files-offset`/`length`
/// don't parse as integers.
pub fn parse_digest_line(line: &str) -> Result<DigestLine> {
    let malformed = || Error::DigestLine(line.to_string());

    let mut parts = line.splitn(5, ':');
    let origin = parts.next().filter(|s| !s.is_empty()).ok_or_else(malformed)?;
    let digest = parts.next().ok_or_else(malformed)?;
    let offset = parts.next().ok_or_else(malformed)?.parse::<u64>().map_err(|_| malformed())?;
    let files_offset = parts.next().ok_or_else(malformed)?.parse::<u64>().map_err(|_| malformed())?;
    let length = match parts.next() {
        Some(s) if !s.is_empty() => s.parse::<u64>().map_err(|_| malformed())?,
        _ => 0,
    };

    Ok(DigestLine { origin: origin.to_string(), digest: digest.to_string(), offset, files_offset, length })
}

/// Returns whether `line`'s digest token fails the current checksum
/// grammar (empty or 64 lowercase hex characters), marking the repository
/// as using the legacy grammar (§4.7 stage 5).
#[must_use]
pub fn is_legacy_digest(line: &DigestLine) -> bool {
    !line.digest.is_empty() && !Package::is_valid_checksum(&line.digest)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
