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

//! Install/upgrade/deinstall script phases.

use std::fmt;
use std::str::FromStr;

// ----------------------------------------------------------------------------
// Enums
// ----------------------------------------------------------------------------

/// A phase at which a package script may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScriptPhase {
    /// Runs before files are extracted on a fresh install.
    PreInstall,
    /// Runs during a fresh install, after extraction.
    Install,
    /// Runs after files are extracted on a fresh install.
    PostInstall,
    /// Runs before files are extracted on an upgrade.
    PreUpgrade,
    /// Runs during an upgrade, after extraction.
    Upgrade,
    /// Runs after files are extracted on an upgrade.
    PostUpgrade,
    /// Runs before files are removed on a deinstall.
    PreDeinstall,
    /// Runs during a deinstall.
    Deinstall,
    /// Runs after files are removed on a deinstall.
    PostDeinstall,
}

impl ScriptPhase {
    /// Returns all phases, in the canonical order scripts run.
    #[must_use]
    pub const fn all() -> [ScriptPhase; 9] {
        [
            ScriptPhase::PreInstall,
            ScriptPhase::Install,
            ScriptPhase::PostInstall,
            ScriptPhase::PreUpgrade,
            ScriptPhase::Upgrade,
            ScriptPhase::PostUpgrade,
            ScriptPhase::PreDeinstall,
            ScriptPhase::Deinstall,
            ScriptPhase::PostDeinstall,
        ]
    }

    /// Returns the manifest key name for this phase.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ScriptPhase::PreInstall => "pre-install",
            ScriptPhase::Install => "install",
            ScriptPhase::PostInstall => "post-install",
            ScriptPhase::PreUpgrade => "pre-upgrade",
            ScriptPhase::Upgrade => "upgrade",
            ScriptPhase::PostUpgrade => "post-upgrade",
            ScriptPhase::PreDeinstall => "pre-deinstall",
            ScriptPhase::Deinstall => "deinstall",
            ScriptPhase::PostDeinstall => "post-deinstall",
        }
    }
}

// ----------------------------------------------------------------------------
// Trait implementations
// ----------------------------------------------------------------------------

impl fmt::Display for ScriptPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScriptPhase {
    type Err = ();

    /// Parses a phase from its manifest key name.
    ///
    /// Unknown phase names are not an error here - the manifest parser skips
    /// them with a warning (see the scripts dispatch rule), so the caller is
    /// expected to treat `Err` as "skip this entry", not as fatal.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pre-install" => Ok(ScriptPhase::PreInstall),
            "install" => Ok(ScriptPhase::Install),
            "post-install" => Ok(ScriptPhase::PostInstall),
            "pre-upgrade" => Ok(ScriptPhase::PreUpgrade),
            "upgrade" => Ok(ScriptPhase::Upgrade),
            "post-upgrade" => Ok(ScriptPhase::PostUpgrade),
            "pre-deinstall" => Ok(ScriptPhase::PreDeinstall),
            "deinstall" => Ok(ScriptPhase::Deinstall),
            "post-deinstall" => Ok(ScriptPhase::PostDeinstall),
            _ => Err(()),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_str() {
        for phase in ScriptPhase::all() {
            assert_eq!(phase.as_str().parse(), Ok(phase));
        }
    }

    #[test]
    fn rejects_unknown_phase() {
        assert_eq!("pre-flight".parse::<ScriptPhase>(), Err(()));
    }
}
