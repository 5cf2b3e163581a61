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

//! Relational catalog store gateway (§4.5).
//!
//! Wraps a single [`rusqlite::Connection`]. Savepoints, not plain
//! `BEGIN`/`COMMIT`, back [`Store::begin`]/[`Store::commit`]/
//! [`Store::rollback`] so that the installer's per-dependency recursion
//! (§4.6 step 6) can call back into the gateway from within an
//! already-open transaction without nesting errors.

use std::path::Path;

use pkgforge_model::{DirEntry, FileEntry, Package};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};

use crate::error::{Error, Result};

// ----------------------------------------------------------------------------
// Structs
// ----------------------------------------------------------------------------

/// A handle onto the catalog database.
#[derive(Debug)]
pub struct Store {
    conn: Connection,
}

// ----------------------------------------------------------------------------
// Implementations
// ----------------------------------------------------------------------------

impl Store {
    /// Opens the catalog at `path`, creating it if necessary unless
    /// `readonly` is set.
    ///
    /// Returns the handle alongside a reuse flag: `false` means the schema
    /// was missing or left mid-update by a prior aborted run, and the
    /// caller should treat this as "full rebuild."
    ///
    /// # Errors
    ///
    /// Returns [`Error::Sqlite`] if the database file cannot be opened.
    pub fn open<P>(path: P, readonly: bool) -> Result<(Self, bool)>
    where
        P: AsRef<Path>,
    {
        let conn = if readonly {
            Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?
        } else {
            Connection::open(path)?
        };
        let store = Self { conn };
        let reuse = store.schema_exists()? && !store.update_pending()?;
        Ok((store, reuse))
    }

    /// Opens an in-memory catalog, for tests that don't need persistence.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Sqlite`] if the connection cannot be established.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self { conn: Connection::open_in_memory()? })
    }

    fn schema_exists(&self) -> Result<bool> {
        let exists: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type='table' AND name='repodata'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(exists.is_some())
    }

    /// Idempotently ensures every table this gateway owns exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Sqlite`] on a failing statement.
    pub fn init_schema(&self) -> Result {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS repodata (
                key   TEXT UNIQUE NOT NULL,
                value TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS packages (
                origin           TEXT PRIMARY KEY,
                name             TEXT NOT NULL,
                version          TEXT NOT NULL,
                arch             TEXT NOT NULL,
                maintainer       TEXT NOT NULL,
                prefix           TEXT NOT NULL,
                comment          TEXT NOT NULL,
                description      TEXT NOT NULL,
                message          TEXT NOT NULL,
                www              TEXT NOT NULL,
                repository_path  TEXT NOT NULL,
                checksum         TEXT NOT NULL,
                package_size     INTEGER NOT NULL,
                flat_size        INTEGER NOT NULL,
                license_logic    TEXT NOT NULL,
                digest           TEXT NOT NULL,
                old_digest       TEXT NOT NULL,
                repository_name  TEXT NOT NULL,
                automatic        INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS categories (
                origin TEXT NOT NULL, category TEXT NOT NULL,
                PRIMARY KEY (origin, category)
            );
            CREATE TABLE IF NOT EXISTS licenses (
                origin TEXT NOT NULL, license TEXT NOT NULL,
                PRIMARY KEY (origin, license)
            );
            CREATE TABLE IF NOT EXISTS users (
                origin TEXT NOT NULL, name TEXT NOT NULL, uid INTEGER,
                PRIMARY KEY (origin, name)
            );
            CREATE TABLE IF NOT EXISTS groups_ (
                origin TEXT NOT NULL, name TEXT NOT NULL, gid INTEGER,
                PRIMARY KEY (origin, name)
            );
            CREATE TABLE IF NOT EXISTS options (
                origin TEXT NOT NULL, name TEXT NOT NULL, value TEXT NOT NULL,
                PRIMARY KEY (origin, name)
            );
            CREATE TABLE IF NOT EXISTS option_defaults (
                origin TEXT NOT NULL, name TEXT NOT NULL, value TEXT NOT NULL,
                PRIMARY KEY (origin, name)
            );
            CREATE TABLE IF NOT EXISTS option_descriptions (
                origin TEXT NOT NULL, name TEXT NOT NULL, value TEXT NOT NULL,
                PRIMARY KEY (origin, name)
            );
            CREATE TABLE IF NOT EXISTS deps (
                origin TEXT NOT NULL, name TEXT NOT NULL,
                dep_origin TEXT NOT NULL, dep_version TEXT NOT NULL,
                PRIMARY KEY (origin, name)
            );
            CREATE TABLE IF NOT EXISTS conflicts (
                origin TEXT NOT NULL, ident TEXT NOT NULL,
                PRIMARY KEY (origin, ident)
            );
            CREATE TABLE IF NOT EXISTS provides (
                origin TEXT NOT NULL, ident TEXT NOT NULL,
                PRIMARY KEY (origin, ident)
            );
            CREATE TABLE IF NOT EXISTS shlibs_required (
                origin TEXT NOT NULL, name TEXT NOT NULL,
                PRIMARY KEY (origin, name)
            );
            CREATE TABLE IF NOT EXISTS shlibs_provided (
                origin TEXT NOT NULL, name TEXT NOT NULL,
                PRIMARY KEY (origin, name)
            );
            CREATE TABLE IF NOT EXISTS directories (
                origin TEXT NOT NULL, path TEXT NOT NULL,
                owner TEXT, group_ TEXT, mode INTEGER NOT NULL, try_flag INTEGER NOT NULL,
                PRIMARY KEY (origin, path)
            );
            CREATE TABLE IF NOT EXISTS files (
                origin TEXT NOT NULL, path TEXT NOT NULL,
                checksum TEXT NOT NULL, owner TEXT, group_ TEXT, mode INTEGER NOT NULL,
                PRIMARY KEY (origin, path)
            );
            CREATE TABLE IF NOT EXISTS scripts (
                origin TEXT NOT NULL, phase TEXT NOT NULL, body TEXT NOT NULL,
                PRIMARY KEY (origin, phase)
            );
            CREATE TABLE IF NOT EXISTS annotations (
                origin TEXT NOT NULL, label TEXT NOT NULL, value TEXT NOT NULL,
                PRIMARY KEY (origin, label)
            );
            CREATE TABLE IF NOT EXISTS repo_update (x INTEGER);
            ",
        )?;
        Ok(())
    }

    /// Upserts `repodata["packagesite"] = url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Sqlite`] on a failing statement.
    pub fn register_repo_url(&self, url: &str) -> Result {
        self.conn.execute(
            "INSERT INTO repodata(key, value) VALUES ('packagesite', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![url],
        )?;
        Ok(())
    }

    /// Iterates every `(origin, digest)` pair currently in the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Sqlite`] on a failing statement.
    pub fn origins_iter(&self) -> Result<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare_cached("SELECT origin, digest FROM packages")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Iterates every `(origin, old_digest)` pair currently in the catalog,
    /// for diffing against a legacy repository whose digest stream carries
    /// the legacy grammar rather than the current checksum scheme (§4.7
    /// stage 5). Rows added from a current-grammar repository carry an empty
    /// `old_digest`, which never matches a legacy remote token, so they are
    /// correctly reclassified rather than spuriously kept.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Sqlite`] on a failing statement.
    pub fn origins_iter_legacy(&self) -> Result<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare_cached("SELECT origin, old_digest FROM packages")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Returns whether `origin` is already present in the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Sqlite`] on a failing statement.
    pub fn contains_origin(&self, origin: &str) -> Result<bool> {
        let found: Option<String> = self
            .conn
            .query_row("SELECT origin FROM packages WHERE origin = ?1", params![origin], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }

    /// Loads the full package row (and child rows) for `origin`, if present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Sqlite`] on a failing statement.
    pub fn get_package(&self, origin: &str) -> Result<Option<Package>> {
        let Some(mut pkg) = self.load_scalar_row(origin)? else {
            return Ok(None);
        };
        self.load_children(origin, &mut pkg)?;
        Ok(Some(pkg))
    }

    #[allow(clippy::too_many_lines)]
    fn load_scalar_row(&self, origin: &str) -> Result<Option<Package>> {
        self.conn
            .query_row(
                "SELECT name, origin, version, arch, maintainer, prefix, comment, description,
                        message, www, repository_path, checksum, package_size, flat_size,
                        license_logic, digest, old_digest, repository_name, automatic
                 FROM packages WHERE origin = ?1",
                params![origin],
                |row| {
                    let license_logic: String = row.get(14)?;
                    let automatic: i64 = row.get(18)?;
                    Ok(Package {
                        name: row.get(0)?,
                        origin: row.get(1)?,
                        version: row.get(2)?,
                        arch: row.get(3)?,
                        maintainer: row.get(4)?,
                        prefix: row.get(5)?,
                        comment: row.get(6)?,
                        description: row.get(7)?,
                        message: row.get(8)?,
                        www: row.get(9)?,
                        repository_path: row.get(10)?,
                        checksum: row.get(11)?,
                        package_size: row.get::<_, i64>(12)? as u64,
                        flat_size: row.get::<_, i64>(13)? as u64,
                        license_logic: license_logic_from_str(&license_logic),
                        digest: row.get(15)?,
                        old_digest: row.get(16)?,
                        repository_name: row.get(17)?,
                        automatic: automatic != 0,
                        ..Package::default()
                    })
                },
            )
            .optional()
            .map_err(Error::from)
    }

    fn load_children(&self, origin: &str, pkg: &mut Package) -> Result {
        let mut categories = self.conn.prepare_cached("SELECT category FROM categories WHERE origin = ?1")?;
        for row in categories.query_map(params![origin], |r| r.get::<_, String>(0))? {
            pkg.categories.insert(row?);
        }

        let mut licenses = self.conn.prepare_cached("SELECT license FROM licenses WHERE origin = ?1")?;
        for row in licenses.query_map(params![origin], |r| r.get::<_, String>(0))? {
            pkg.licenses.insert(row?);
        }

        let mut users = self.conn.prepare_cached("SELECT name, uid FROM users WHERE origin = ?1")?;
        for row in users.query_map(params![origin], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, Option<i64>>(1)?))
        })? {
            let (name, uid) = row?;
            pkg.users.insert(name, uid.map(|n| n as u32));
        }

        let mut groups = self.conn.prepare_cached("SELECT name, gid FROM groups_ WHERE origin = ?1")?;
        for row in groups.query_map(params![origin], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, Option<i64>>(1)?))
        })? {
            let (name, gid) = row?;
            pkg.groups.insert(name, gid.map(|n| n as u32));
        }

        let mut options = self.conn.prepare_cached("SELECT name, value FROM options WHERE origin = ?1")?;
        for row in options.query_map(params![origin], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))? {
            let (name, value) = row?;
            pkg.options.insert(name, value);
        }

        let mut defaults =
            self.conn.prepare_cached("SELECT name, value FROM option_defaults WHERE origin = ?1")?;
        for row in defaults.query_map(params![origin], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))? {
            let (name, value) = row?;
            pkg.option_defaults.insert(name, value);
        }

        let mut descriptions =
            self.conn.prepare_cached("SELECT name, value FROM option_descriptions WHERE origin = ?1")?;
        for row in descriptions.query_map(params![origin], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))? {
            let (name, value) = row?;
            pkg.option_descriptions.insert(name, value);
        }

        let mut deps = self
            .conn
            .prepare_cached("SELECT name, dep_origin, dep_version FROM deps WHERE origin = ?1")?;
        for row in deps.query_map(params![origin], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, r.get::<_, String>(2)?))
        })? {
            let (name, dep_origin, dep_version) = row?;
            pkg.dependencies
                .insert(name, pkgforge_model::Dependency { origin: dep_origin, version: dep_version });
        }

        let mut conflicts = self.conn.prepare_cached("SELECT ident FROM conflicts WHERE origin = ?1")?;
        for row in conflicts.query_map(params![origin], |r| r.get::<_, String>(0))? {
            pkg.conflicts.insert(row?);
        }

        let mut provides = self.conn.prepare_cached("SELECT ident FROM provides WHERE origin = ?1")?;
        for row in provides.query_map(params![origin], |r| r.get::<_, String>(0))? {
            pkg.provides.insert(row?);
        }

        let mut shlibs_req =
            self.conn.prepare_cached("SELECT name FROM shlibs_required WHERE origin = ?1")?;
        for row in shlibs_req.query_map(params![origin], |r| r.get::<_, String>(0))? {
            pkg.shlibs_required.insert(row?);
        }

        let mut shlibs_prov =
            self.conn.prepare_cached("SELECT name FROM shlibs_provided WHERE origin = ?1")?;
        for row in shlibs_prov.query_map(params![origin], |r| r.get::<_, String>(0))? {
            pkg.shlibs_provided.insert(row?);
        }

        let mut dirs = self
            .conn
            .prepare_cached("SELECT path, owner, group_, mode, try_flag FROM directories WHERE origin = ?1")?;
        for row in dirs.query_map(params![origin], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, Option<String>>(1)?,
                r.get::<_, Option<String>>(2)?,
                r.get::<_, i64>(3)?,
                r.get::<_, i64>(4)?,
            ))
        })? {
            let (path, owner, group, mode, try_flag) = row?;
            pkg.directories
                .insert(path, DirEntry { owner, group, mode: mode as u32, try_flag: try_flag != 0 });
        }

        let mut files = self
            .conn
            .prepare_cached("SELECT path, checksum, owner, group_, mode FROM files WHERE origin = ?1")?;
        for row in files.query_map(params![origin], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, Option<String>>(2)?,
                r.get::<_, Option<String>>(3)?,
                r.get::<_, i64>(4)?,
            ))
        })? {
            let (path, checksum, owner, group, mode) = row?;
            pkg.files.insert(path, FileEntry { checksum, owner, group, mode: mode as u32 });
        }

        let mut scripts = self.conn.prepare_cached("SELECT phase, body FROM scripts WHERE origin = ?1")?;
        for row in scripts.query_map(params![origin], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))? {
            let (phase, body) = row?;
            if let Ok(phase) = phase.parse() {
                pkg.scripts.insert(phase, body);
            }
        }

        let mut annotations =
            self.conn.prepare_cached("SELECT label, value FROM annotations WHERE origin = ?1")?;
        for row in annotations.query_map(params![origin], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))? {
            let (label, value) = row?;
            pkg.annotations.insert(label, value);
        }

        Ok(())
    }

    /// Upserts `pkg`'s full row and child rows, replacing any existing row
    /// for the same origin.
    ///
    /// When `forced` is `false` and an existing row already carries the same
    /// digest, the call is a no-op - the row is left untouched rather than
    /// being deleted and reinserted identically.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Sqlite`] on a failing statement.
    pub fn add_package(&self, pkg: &Package, forced: bool) -> Result {
        if !forced {
            let existing: Option<String> = self
                .conn
                .query_row("SELECT digest FROM packages WHERE origin = ?1", params![pkg.origin], |row| {
                    row.get(0)
                })
                .optional()?;
            if existing.as_deref() == Some(pkg.digest.as_str()) {
                return Ok(());
            }
        }

        self.remove_package(&pkg.origin)?;
        self.conn.execute(
            "INSERT INTO packages (
                origin, name, version, arch, maintainer, prefix, comment, description,
                message, www, repository_path, checksum, package_size, flat_size,
                license_logic, digest, old_digest, repository_name, automatic
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19)",
            params![
                pkg.origin,
                pkg.name,
                pkg.version,
                pkg.arch,
                pkg.maintainer,
                pkg.prefix,
                pkg.comment,
                pkg.description,
                pkg.message,
                pkg.www,
                pkg.repository_path,
                pkg.checksum,
                pkg.package_size as i64,
                pkg.flat_size as i64,
                pkg.license_logic.as_str(),
                pkg.digest,
                pkg.old_digest,
                pkg.repository_name,
                i64::from(pkg.automatic),
            ],
        )?;

        for category in &pkg.categories {
            self.conn.execute(
                "INSERT OR IGNORE INTO categories (origin, category) VALUES (?1, ?2)",
                params![pkg.origin, category],
            )?;
        }
        for license in &pkg.licenses {
            self.conn.execute(
                "INSERT OR IGNORE INTO licenses (origin, license) VALUES (?1, ?2)",
                params![pkg.origin, license],
            )?;
        }
        for (name, uid) in &pkg.users {
            self.conn.execute(
                "INSERT OR IGNORE INTO users (origin, name, uid) VALUES (?1, ?2, ?3)",
                params![pkg.origin, name, uid.map(i64::from)],
            )?;
        }
        for (name, gid) in &pkg.groups {
            self.conn.execute(
                "INSERT OR IGNORE INTO groups_ (origin, name, gid) VALUES (?1, ?2, ?3)",
                params![pkg.origin, name, gid.map(i64::from)],
            )?;
        }
        for (name, value) in &pkg.options {
            self.conn.execute(
                "INSERT OR IGNORE INTO options (origin, name, value) VALUES (?1, ?2, ?3)",
                params![pkg.origin, name, value],
            )?;
        }
        for (name, value) in &pkg.option_defaults {
            self.conn.execute(
                "INSERT OR IGNORE INTO option_defaults (origin, name, value) VALUES (?1, ?2, ?3)",
                params![pkg.origin, name, value],
            )?;
        }
        for (name, value) in &pkg.option_descriptions {
            self.conn.execute(
                "INSERT OR IGNORE INTO option_descriptions (origin, name, value) VALUES (?1, ?2, ?3)",
                params![pkg.origin, name, value],
            )?;
        }
        for (name, dep) in &pkg.dependencies {
            self.conn.execute(
                "INSERT OR IGNORE INTO deps (origin, name, dep_origin, dep_version) VALUES (?1, ?2, ?3, ?4)",
                params![pkg.origin, name, dep.origin, dep.version],
            )?;
        }
        for ident in &pkg.conflicts {
            self.conn.execute(
                "INSERT OR IGNORE INTO conflicts (origin, ident) VALUES (?1, ?2)",
                params![pkg.origin, ident],
            )?;
        }
        for ident in &pkg.provides {
            self.conn.execute(
                "INSERT OR IGNORE INTO provides (origin, ident) VALUES (?1, ?2)",
                params![pkg.origin, ident],
            )?;
        }
        for name in &pkg.shlibs_required {
            self.conn.execute(
                "INSERT OR IGNORE INTO shlibs_required (origin, name) VALUES (?1, ?2)",
                params![pkg.origin, name],
            )?;
        }
        for name in &pkg.shlibs_provided {
            self.conn.execute(
                "INSERT OR IGNORE INTO shlibs_provided (origin, name) VALUES (?1, ?2)",
                params![pkg.origin, name],
            )?;
        }
        for (path, dir) in &pkg.directories {
            self.conn.execute(
                "INSERT OR IGNORE INTO directories (origin, path, owner, group_, mode, try_flag)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![pkg.origin, path, dir.owner, dir.group, dir.mode, i64::from(dir.try_flag)],
            )?;
        }
        for (path, file) in &pkg.files {
            self.conn.execute(
                "INSERT OR IGNORE INTO files (origin, path, checksum, owner, group_, mode)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![pkg.origin, path, file.checksum, file.owner, file.group, file.mode],
            )?;
        }
        for (phase, body) in &pkg.scripts {
            self.conn.execute(
                "INSERT OR IGNORE INTO scripts (origin, phase, body) VALUES (?1, ?2, ?3)",
                params![pkg.origin, phase.as_str(), body],
            )?;
        }
        for (label, value) in &pkg.annotations {
            self.conn.execute(
                "INSERT OR IGNORE INTO annotations (origin, label, value) VALUES (?1, ?2, ?3)",
                params![pkg.origin, label, value],
            )?;
        }

        Ok(())
    }

    /// Cascade-deletes every row belonging to `origin`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Sqlite`] on a failing statement.
    pub fn remove_package(&self, origin: &str) -> Result {
        const CHILD_TABLES: &[&str] = &[
            "categories",
            "licenses",
            "users",
            "groups_",
            "options",
            "option_defaults",
            "option_descriptions",
            "deps",
            "conflicts",
            "provides",
            "shlibs_required",
            "shlibs_provided",
            "directories",
            "files",
            "scripts",
            "annotations",
        ];
        for table in CHILD_TABLES {
            self.conn
                .execute(&format!("DELETE FROM {table} WHERE origin = ?1"), params![origin])?;
        }
        self.conn.execute("DELETE FROM packages WHERE origin = ?1", params![origin])?;
        Ok(())
    }

    /// Bulk-inserts `idents` into the `conflicts` table for `origin`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Sqlite`] on a failing statement.
    pub fn register_conflicts(&self, origin: &str, idents: &[String]) -> Result {
        for ident in idents {
            self.conn.execute(
                "INSERT OR IGNORE INTO conflicts (origin, ident) VALUES (?1, ?2)",
                params![origin, ident],
            )?;
        }
        Ok(())
    }

    /// Opens a named, nestable savepoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSavepointName`] if `name` is not
    /// `[A-Za-z0-9_]+`, or [`Error::Sqlite`] on a failing statement.
    pub fn begin(&self, name: &str) -> Result {
        let name = validate_savepoint_name(name)?;
        self.conn.execute_batch(&format!("SAVEPOINT {name}"))?;
        Ok(())
    }

    /// Releases a named savepoint, keeping its changes.
    ///
    /// # Errors
    ///
    /// See [`Store::begin`].
    pub fn commit(&self, name: &str) -> Result {
        let name = validate_savepoint_name(name)?;
        self.conn.execute_batch(&format!("RELEASE SAVEPOINT {name}"))?;
        Ok(())
    }

    /// Rolls back a named savepoint, discarding its changes, and releases it.
    ///
    /// # Errors
    ///
    /// See [`Store::begin`].
    pub fn rollback(&self, name: &str) -> Result {
        let name = validate_savepoint_name(name)?;
        self.conn
            .execute_batch(&format!("ROLLBACK TO SAVEPOINT {name}; RELEASE SAVEPOINT {name}"))?;
        Ok(())
    }

    /// Drops every cached prepared statement. Called once per process at
    /// shutdown; statements are recreated lazily on next use.
    pub fn finalize_statements(&self) {
        self.conn.flush_prepared_statement_cache();
    }

    /// Inserts the transient `repo_update` marker row, signalling "update in
    /// progress" to the next invocation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Sqlite`] on a failing statement.
    pub fn mark_update_pending(&self) -> Result {
        self.conn.execute("INSERT INTO repo_update (x) VALUES (1)", [])?;
        Ok(())
    }

    /// Clears the transient `repo_update` marker, signalling a clean finish.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Sqlite`] on a failing statement.
    pub fn clear_update_pending(&self) -> Result {
        self.conn.execute("DELETE FROM repo_update", [])?;
        Ok(())
    }

    /// Returns whether the `repo_update` marker table has any rows,
    /// indicating a previous update aborted mid-transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Sqlite`] on a failing statement.
    pub fn update_pending(&self) -> Result<bool> {
        let count: Option<i64> = self
            .conn
            .query_row("SELECT COUNT(*) FROM repo_update", [], |row| row.get(0))
            .optional()?;
        Ok(count.unwrap_or(0) > 0)
    }
}

fn validate_savepoint_name(name: &str) -> Result<&str> {
    if !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        Ok(name)
    } else {
        Err(Error::InvalidSavepointName(name.to_string()))
    }
}

fn license_logic_from_str(s: &str) -> pkgforge_model::LicenseLogic {
    match s {
        "or" => pkgforge_model::LicenseLogic::Or,
        "and" => pkgforge_model::LicenseLogic::And,
        _ => pkgforge_model::LicenseLogic::Single,
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pkgforge_model::Dependency;

    fn sample_package(origin: &str, digest: &str) -> Package {
        let mut pkg = Package {
            name: "foo".into(),
            origin: origin.into(),
            version: "1.0".into(),
            arch: "x86:64".into(),
            digest: digest.into(),
            ..Package::default()
        };
        pkg.categories.insert("misc".into());
        pkg.dependencies.insert(
            "bar".into(),
            Dependency { origin: "misc/bar".into(), version: "2.0".into() },
        );
        pkg.conflicts.insert("misc/foo-old".into());
        pkg
    }

    fn store() -> Store {
        let store = Store::open_in_memory().expect("open");
        store.init_schema().expect("init_schema");
        store
    }

    #[test]
    fn fresh_database_is_not_reusable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("catalog.sqlite");
        let (_store, reuse) = Store::open(&path, false).expect("open");
        assert!(!reuse);
    }

    /// Seed test property 5: add then origins_iter yields it, remove then it
    /// doesn't.
    #[test]
    fn add_then_remove_round_trips_through_origins_iter() {
        let store = store();
        let pkg = sample_package("misc/foo", "d1");

        store.add_package(&pkg, true).expect("add");
        let origins = store.origins_iter().expect("origins_iter");
        assert_eq!(origins, vec![("misc/foo".to_string(), "d1".to_string())]);

        store.remove_package("misc/foo").expect("remove");
        assert!(store.origins_iter().expect("origins_iter").is_empty());
    }

    #[test]
    fn origins_iter_legacy_yields_old_digest_not_digest() {
        let store = store();
        let mut pkg = sample_package("misc/foo", "d1");
        pkg.old_digest = "legacy-token".into();
        store.add_package(&pkg, true).expect("add");

        assert_eq!(store.origins_iter_legacy().expect("origins_iter_legacy"), vec![("misc/foo".to_string(), "legacy-token".to_string())]);
    }

    #[test]
    fn get_package_round_trips_scalars_and_children() {
        let store = store();
        let pkg = sample_package("misc/foo", "d1");
        store.add_package(&pkg, true).expect("add");

        let loaded = store.get_package("misc/foo").expect("get_package").expect("present");
        assert_eq!(loaded.name, pkg.name);
        assert_eq!(loaded.version, pkg.version);
        assert_eq!(loaded.categories, pkg.categories);
        assert_eq!(loaded.dependencies, pkg.dependencies);
        assert_eq!(loaded.conflicts, pkg.conflicts);
    }

    #[test]
    fn add_package_replaces_existing_row() {
        let store = store();
        let mut pkg = sample_package("misc/foo", "d1");
        store.add_package(&pkg, true).expect("add");

        pkg.version = "2.0".into();
        pkg.digest = "d2".into();
        pkg.categories.clear();
        store.add_package(&pkg, true).expect("replace");

        let loaded = store.get_package("misc/foo").expect("get_package").expect("present");
        assert_eq!(loaded.version, "2.0");
        assert!(loaded.categories.is_empty());
    }

    #[test]
    fn add_package_unforced_skips_unchanged_digest() {
        let store = store();
        let pkg = sample_package("misc/foo", "d1");
        store.add_package(&pkg, true).expect("add");

        let mut same_digest = pkg.clone();
        same_digest.name = "renamed".into();
        store.add_package(&same_digest, false).expect("skip");

        let loaded = store.get_package("misc/foo").expect("get_package").expect("present");
        assert_eq!(loaded.name, "foo", "unforced add with same digest must be a no-op");
    }

    #[test]
    fn register_repo_url_upserts() {
        let store = store();
        store.register_repo_url("https://example.invalid/repo").expect("register");
        store.register_repo_url("https://example.invalid/repo2").expect("re-register");

        let value: String = store
            .conn
            .query_row("SELECT value FROM repodata WHERE key = 'packagesite'", [], |row| row.get(0))
            .expect("query");
        assert_eq!(value, "https://example.invalid/repo2");
    }

    #[test]
    fn register_conflicts_bulk_inserts() {
        let store = store();
        let pkg = sample_package("misc/foo", "d1");
        store.add_package(&pkg, true).expect("add");
        store
            .register_conflicts("misc/foo", &["misc/bar".to_string(), "misc/baz".to_string()])
            .expect("register_conflicts");

        let loaded = store.get_package("misc/foo").expect("get_package").expect("present");
        assert!(loaded.conflicts.contains("misc/bar"));
        assert!(loaded.conflicts.contains("misc/baz"));
    }

    #[test]
    fn savepoints_nest_and_roll_back_independently() {
        let store = store();
        store.begin("OUTER").expect("begin outer");
        store.add_package(&sample_package("misc/a", "d1"), true).expect("add a");

        store.begin("INNER").expect("begin inner");
        store.add_package(&sample_package("misc/b", "d2"), true).expect("add b");
        store.rollback("INNER").expect("rollback inner");

        store.commit("OUTER").expect("commit outer");

        let origins: Vec<_> = store.origins_iter().expect("origins_iter").into_iter().map(|(o, _)| o).collect();
        assert!(origins.contains(&"misc/a".to_string()));
        assert!(!origins.contains(&"misc/b".to_string()));
    }

    #[test]
    fn outer_rollback_discards_everything() {
        let store = store();
        store.begin("REPO").expect("begin");
        store.add_package(&sample_package("misc/a", "d1"), true).expect("add");
        store.rollback("REPO").expect("rollback");

        assert!(store.origins_iter().expect("origins_iter").is_empty());
    }

    #[test]
    fn update_pending_marker_round_trips() {
        let store = store();
        assert!(!store.update_pending().expect("update_pending"));
        store.mark_update_pending().expect("mark");
        assert!(store.update_pending().expect("update_pending"));
        store.clear_update_pending().expect("clear");
        assert!(!store.update_pending().expect("update_pending"));
    }

    #[test]
    fn open_reports_not_reusable_when_update_marker_present() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("catalog.sqlite");
        {
            let (store, _) = Store::open(&path, false).expect("open");
            store.init_schema().expect("init_schema");
            store.mark_update_pending().expect("mark");
        }
        let (_store, reuse) = Store::open(&path, false).expect("reopen");
        assert!(!reuse, "a dangling repo_update marker must force a rebuild");
    }

    #[test]
    fn rejects_invalid_savepoint_name() {
        let store = store();
        assert!(store.begin("bad name; DROP TABLE packages").is_err());
    }

    #[test]
    fn finalize_statements_does_not_panic() {
        let store = store();
        store.origins_iter().expect("origins_iter");
        store.finalize_statements();
    }
}
