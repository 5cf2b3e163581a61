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

//! Host arch/ABI and OS-version discovery.
//!
//! Exposed behind a trait so tests can assert the installer's precondition
//! checks (§4.6 steps 3-4) without depending on the actual host the test
//! suite happens to run on.

// ----------------------------------------------------------------------------
// Traits
// ----------------------------------------------------------------------------

/// Reports the local host's compatibility tokens.
pub trait HostInfo {
    /// Returns the host's arch/ABI token, compared against a package's
    /// `arch` attribute.
    fn machine(&self) -> String;
    /// Returns the host's OS-version token, compared against a package's
    /// `osversion` annotation, if it declares one.
    fn os_version(&self) -> String;
}

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// Default [`HostInfo`] backed by `std::env::consts`.
///
/// Real-world arch/ABI and OS-version token formats are platform- and
/// packaging-convention-specific; a deployment that needs a richer token
/// (e.g. embedding a numeric system version) supplies its own [`HostInfo`]
/// rather than this crate guessing at `uname`-flavoured string formats.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHostInfo;

impl HostInfo for SystemHostInfo {
    fn machine(&self) -> String {
        std::env::consts::ARCH.to_string()
    }

    fn os_version(&self) -> String {
        std::env::consts::OS.to_string()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_host_info_reports_non_empty_tokens() {
        let host = SystemHostInfo;
        assert!(!host.machine().is_empty());
        assert!(!host.os_version().is_empty());
    }
}
