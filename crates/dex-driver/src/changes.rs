//! Input change tracking between builds.
//!
//! A stamp next to the output records a sha256 per input file, per entry of
//! each tracked jar, and one digest over the command-line strings. Comparing
//! the previous stamp with the current inputs tells the driver whether it
//! can skip work, and which jar entries changed.

use crate::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::ZipArchive;

/// Digests of every input of one build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamp {
    pub strings_digest: String,
    pub files: BTreeMap<String, String>,
    /// jar -> entry -> digest, for jars whose entries are tracked
    pub subpaths: BTreeMap<String, BTreeMap<String, String>>,
}

impl Stamp {
    pub fn compute(
        input_paths: &[String],
        input_strings: &[String],
        track_subpaths: &[String],
    ) -> Result<Stamp> {
        let mut strings = Sha256::new();
        for value in input_strings {
            strings.update(value.as_bytes());
            strings.update([0u8]);
        }

        let mut stamp = Stamp {
            strings_digest: hex::encode(strings.finalize()),
            ..Default::default()
        };
        for path in input_paths {
            stamp.files.insert(path.clone(), file_digest(path)?);
        }
        for jar in track_subpaths {
            if !stamp.subpaths.contains_key(jar) {
                stamp.subpaths.insert(jar.clone(), entry_digests(jar)?);
            }
        }
        Ok(stamp)
    }

    /// The previous stamp; missing or unreadable stamps count as no stamp.
    pub fn load(path: &Path) -> Option<Stamp> {
        let content = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&content) {
            Ok(stamp) => Some(stamp),
            Err(err) => {
                debug!(path = %path.display(), "ignoring unreadable stamp: {}", err);
                None
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Default stamp location for an output.
pub fn stamp_path_for(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(".changes.json");
    PathBuf::from(name)
}

fn file_digest(path: &str) -> Result<String> {
    let mut hasher = Sha256::new();
    io::copy(&mut File::open(path)?, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

fn entry_digests(jar: &str) -> Result<BTreeMap<String, String>> {
    let mut archive = ZipArchive::new(File::open(jar)?)?;
    let mut digests = BTreeMap::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let mut content = Vec::new();
        entry.read_to_end(&mut content)?;
        digests.insert(entry.name().to_string(), hex::encode(Sha256::digest(&content)));
    }
    Ok(digests)
}

/// Difference between the previous and the current stamp.
#[derive(Debug, Clone)]
pub struct Changes {
    old: Option<Stamp>,
    new: Stamp,
    forced: bool,
}

impl Changes {
    /// `forced` marks everything as changed.
    pub fn new(old: Option<Stamp>, new: Stamp, forced: bool) -> Self {
        Self { old, new, forced }
    }

    pub fn new_stamp(&self) -> &Stamp {
        &self.new
    }

    pub fn has_changes(&self) -> bool {
        self.forced || self.old.as_ref() != Some(&self.new)
    }

    /// True when incremental reuse is impossible.
    pub fn has_string_changes(&self) -> bool {
        match &self.old {
            Some(old) => self.forced || old.strings_digest != self.new.strings_digest,
            None => true,
        }
    }

    /// Input files added, modified or removed.
    pub fn changed_paths(&self) -> Vec<String> {
        let Some(old) = &self.old else {
            return self.new.files.keys().cloned().collect();
        };
        let mut changed: BTreeSet<String> = self
            .new
            .files
            .iter()
            .filter(|(path, digest)| old.files.get(*path) != Some(digest))
            .map(|(path, _)| path.clone())
            .collect();
        changed.extend(
            old.files
                .keys()
                .filter(|path| !self.new.files.contains_key(*path))
                .cloned(),
        );
        changed.into_iter().collect()
    }

    /// Entries of `jar` that were added or modified. Every entry counts as
    /// changed when the jar had no entry record before.
    pub fn changed_subpaths(&self, jar: &str) -> Vec<String> {
        let Some(current) = self.new.subpaths.get(jar) else {
            return Vec::new();
        };
        let previous = self.old.as_ref().and_then(|old| old.subpaths.get(jar));
        current
            .iter()
            .filter(|(entry, digest)| previous.and_then(|p| p.get(*entry)) != Some(digest))
            .map(|(entry, _)| entry.clone())
            .collect()
    }

    /// Short summary for logs.
    pub fn describe(&self) -> String {
        if self.old.is_none() {
            return "no previous stamp".to_string();
        }
        if self.forced {
            return "forced".to_string();
        }
        if self.has_string_changes() {
            return "command line changed".to_string();
        }
        format!("{} input(s) changed", self.changed_paths().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::write_jar;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_unchanged_inputs_have_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("a.jar");
        write_jar(&jar, &[("A.class", "a")]);
        let jar = jar.display().to_string();

        let first = Stamp::compute(&[jar.clone()], &strings(&["d8"]), &[jar.clone()]).unwrap();
        let second = Stamp::compute(&[jar.clone()], &strings(&["d8"]), &[jar.clone()]).unwrap();
        let changes = Changes::new(Some(first), second, false);
        assert!(!changes.has_changes());
        assert!(!changes.has_string_changes());
        assert!(changes.changed_paths().is_empty());
        assert!(changes.changed_subpaths(&jar).is_empty());
    }

    #[test]
    fn test_changed_jar_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jar");
        write_jar(&path, &[("A.class", "a"), ("B.class", "b")]);
        let jar = path.display().to_string();
        let before = Stamp::compute(&[jar.clone()], &[], &[jar.clone()]).unwrap();

        write_jar(&path, &[("A.class", "a"), ("B.class", "b2"), ("C.class", "c")]);
        let after = Stamp::compute(&[jar.clone()], &[], &[jar.clone()]).unwrap();

        let changes = Changes::new(Some(before), after, false);
        assert!(changes.has_changes());
        assert!(!changes.has_string_changes());
        assert_eq!(changes.changed_paths(), vec![jar.clone()]);
        assert_eq!(changes.changed_subpaths(&jar), strings(&["B.class", "C.class"]));
    }

    #[test]
    fn test_string_changes_and_missing_stamp() {
        let before = Stamp::compute(&[], &strings(&["--release"]), &[]).unwrap();
        let after = Stamp::compute(&[], &strings(&["--min-api", "21"]), &[]).unwrap();
        assert!(Changes::new(Some(before.clone()), after.clone(), false).has_string_changes());
        assert!(Changes::new(None, after.clone(), false).has_string_changes());
        assert!(Changes::new(Some(after.clone()), after, true).has_string_changes());
    }

    #[test]
    fn test_stamp_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let stamp = Stamp::compute(&[], &strings(&["x"]), &[]).unwrap();
        let path = stamp_path_for(&dir.path().join("out.dex.jar"));
        assert!(path.ends_with("out.dex.jar.changes.json"));
        assert_eq!(Stamp::load(&path), None);
        stamp.save(&path).unwrap();
        assert_eq!(Stamp::load(&path), Some(stamp));
    }
}
