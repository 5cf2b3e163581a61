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

//! Tolerant percent-encoding for manifest path keys and multi-line strings.
//!
//! Unlike a general-purpose percent-decoder, [`decode`] never errors: a
//! malformed `%hh` triplet (short tail, non-hex digits) is passed through
//! literally rather than rejected. This lets arbitrary filesystem paths and
//! free-form text round-trip through the object-notation dialect even when
//! they happen to already contain a bare `%`.

// ----------------------------------------------------------------------------
// Functions
// ----------------------------------------------------------------------------

/// Percent-encodes `s`, escaping `%` and every non-ASCII byte as `%hh`.
#[must_use]
pub fn encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for &byte in s.as_bytes() {
        if byte == b'%' || !byte.is_ascii() {
            out.push('%');
            out.push_str(&format!("{byte:02x}"));
        } else {
            out.push(byte as char);
        }
    }
    out
}

/// Decodes `s`, tolerating malformed `%hh` triplets by re-emitting them
/// literally instead of failing.
#[must_use]
pub fn decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());

    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3);
            let parsed = hex
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok());

            if let Some(byte) = parsed {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    // The decoded bytes are not guaranteed valid UTF-8 in the general case
    // (we decode arbitrary byte strings), but every manifest value we apply
    // this to originates as UTF-8 text, so a lossy conversion here only ever
    // substitutes the replacement character for genuinely malformed input.
    String::from_utf8_lossy(&out).into_owned()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_plain_ascii() {
        let s = "/usr/local/bin/foo";
        assert_eq!(decode(&encode(s)), s);
    }

    #[test]
    fn escapes_percent_and_non_ascii() {
        assert_eq!(encode("100%"), "100%25");
        assert_eq!(encode("caf\u{e9}"), "caf%c3%a9");
    }

    #[test]
    fn decodes_hex_triplet() {
        assert_eq!(decode("A%0aB"), "A\nB");
    }

    #[test]
    fn tolerates_short_tail() {
        assert_eq!(decode("100%2"), "100%2");
        assert_eq!(decode("100%"), "100%");
    }

    #[test]
    fn tolerates_non_hex_digits() {
        assert_eq!(decode("100%zz"), "100%zz");
    }

    #[test]
    fn round_trips_newline_in_description() {
        let s = "A demo\npackage";
        let encoded = encode(s);
        assert!(encoded.contains("%0a"));
        assert_eq!(decode(&encoded), s);
    }
}
