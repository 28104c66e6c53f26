//! Jar reading and aligned dex zips.

use crate::Result;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

/// Skipped by D8 itself.
const SKIPPED_CLASS_FILE_NAMES: &[&str] = &["module-info.class"];

/// Alignment of every entry in a `.dex.jar`.
pub const DEX_ALIGNMENT: u16 = 4;

pub fn is_class_file(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    !SKIPPED_CLASS_FILE_NAMES.contains(&name) && path.ends_with(".class")
}

/// Entry names of a zip, in archive order.
pub fn entry_names(jar: impl AsRef<Path>) -> Result<Vec<String>> {
    let archive = ZipArchive::new(File::open(jar)?)?;
    Ok(archive.file_names().map(str::to_string).collect())
}

/// Where the intermediate dex for each class file of `class_inputs` lives:
/// `a/b/C.class` maps to `<incremental_dir>/a/b/C.dex`.
pub fn intermediate_dex_paths(
    class_inputs: &[String],
    incremental_dir: &Path,
) -> Result<Vec<String>> {
    let mut dex_files = Vec::new();
    for jar in class_inputs {
        for subpath in entry_names(jar)? {
            if !is_class_file(&subpath) {
                continue;
            }
            let stem = &subpath[..subpath.len() - ".class".len()];
            dex_files.push(
                incremental_dir
                    .join(format!("{}.dex", stem))
                    .display()
                    .to_string(),
            );
        }
    }
    Ok(dex_files)
}

/// Extract the entries of `jar` accepted by `predicate` under `dest`,
/// returning the extracted paths.
pub fn extract_matching(
    jar: impl AsRef<Path>,
    dest: &Path,
    predicate: impl Fn(&str) -> bool,
) -> Result<Vec<PathBuf>> {
    let mut archive = ZipArchive::new(File::open(jar)?)?;
    let mut extracted = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() || !predicate(entry.name()) {
            continue;
        }
        let relative = entry
            .enclosed_name()
            .ok_or(ZipError::InvalidArchive("Invalid file path"))?
            .to_path_buf();
        let out_path = dest.join(relative);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;
        extracted.push(out_path);
    }
    Ok(extracted)
}

/// Write `dex_files` into a `.dex.jar` as `classes.dex`, `classes2.dex`, ...
/// stored uncompressed, 4-byte aligned, with fixed timestamps.
pub fn zip_aligned(dex_files: &[PathBuf], output: &Path) -> Result<()> {
    let mut writer = ZipWriter::new(File::create(output)?);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);
    for (i, dex_file) in dex_files.iter().enumerate() {
        let name = match i {
            0 => "classes.dex".to_string(),
            n => format!("classes{}.dex", n + 1),
        };
        writer.start_file_aligned(name, options, DEX_ALIGNMENT)?;
        writer.write_all(&fs::read(dex_file)?)?;
    }
    writer.finish()?;
    Ok(())
}

/// Delete files under `dir` that are not in `keep`.
pub fn delete_stale_files(dir: &Path, keep: &[String]) -> Result<usize> {
    let keep: BTreeSet<PathBuf> = keep.iter().map(PathBuf::from).collect();
    let mut stale = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if entry.file_type().is_file() && !keep.contains(entry.path()) {
            stale.push(entry.into_path());
        }
    }
    for path in &stale {
        fs::remove_file(path)?;
    }
    Ok(stale.len())
}

/// Rename, falling back to copy and delete across filesystems.
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_err() {
        fs::copy(from, to)?;
        fs::remove_file(from)?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Read;

    /// Build a stored zip with the given entries.
    pub(crate) fn write_jar(path: &Path, entries: &[(&str, &str)]) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        for (name, content) in entries {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_is_class_file() {
        assert!(is_class_file("org/chromium/Foo.class"));
        assert!(is_class_file("Foo$1.class"));
        assert!(!is_class_file("module-info.class"));
        assert!(!is_class_file("META-INF/versions/9/module-info.class"));
        assert!(!is_class_file("org/chromium/R.txt"));
    }

    #[test]
    fn test_intermediate_dex_paths() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("a.jar");
        write_jar(
            &jar,
            &[
                ("org/a/Foo.class", "foo"),
                ("module-info.class", "m"),
                ("META-INF/MANIFEST.MF", "x"),
                ("org/a/Bar$1.class", "bar"),
            ],
        );
        let incremental = Path::new("gen/incremental");
        let paths =
            intermediate_dex_paths(&[jar.display().to_string()], incremental).unwrap();
        assert_eq!(
            paths,
            vec![
                "gen/incremental/org/a/Foo.dex".to_string(),
                "gen/incremental/org/a/Bar$1.dex".to_string(),
            ]
        );
    }

    #[test]
    fn test_extract_matching() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("a.jar");
        write_jar(&jar, &[("org/a/Foo.class", "foo"), ("org/a/Bar.class", "bar")]);
        let out = dir.path().join("out");
        let extracted = extract_matching(&jar, &out, |name| name.ends_with("Bar.class")).unwrap();
        assert_eq!(extracted, vec![out.join("org/a/Bar.class")]);
        assert_eq!(fs::read_to_string(&extracted[0]).unwrap(), "bar");
        assert!(!out.join("org/a/Foo.class").exists());
    }

    #[test]
    fn test_zip_aligned_names_and_alignment() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.dex");
        let second = dir.path().join("b.dex");
        fs::write(&first, "dex\n035\0one").unwrap();
        fs::write(&second, "dex\n035\0two!").unwrap();
        let output = dir.path().join("out.dex.jar");

        zip_aligned(&[first, second], &output).unwrap();

        let mut archive = ZipArchive::new(File::open(&output).unwrap()).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        assert_eq!(names.len(), 2);
        for (i, name) in ["classes.dex", "classes2.dex"].iter().enumerate() {
            let mut entry = archive.by_index(i).unwrap();
            assert_eq!(entry.name(), *name);
            assert_eq!(entry.compression(), CompressionMethod::Stored);
            assert_eq!(entry.data_start() % u64::from(DEX_ALIGNMENT), 0);
            let mut content = String::new();
            entry.read_to_string(&mut content).unwrap();
            assert!(content.starts_with("dex\n035"));
        }
    }

    #[test]
    fn test_delete_stale_files() {
        let dir = tempfile::tempdir().unwrap();
        let keep = dir.path().join("org/Keep.dex");
        let stale = dir.path().join("org/Stale.dex");
        fs::create_dir_all(keep.parent().unwrap()).unwrap();
        fs::write(&keep, "").unwrap();
        fs::write(&stale, "").unwrap();

        let removed = delete_stale_files(dir.path(), &[keep.display().to_string()]).unwrap();
        assert_eq!(removed, 1);
        assert!(keep.exists());
        assert!(!stale.exists());
    }
}
