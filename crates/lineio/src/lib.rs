//! # lineio
//!
//! Line-file primitives shared by the FlatShop text stores.
//!
//! A text store keeps one record per line. Records nest up to three
//! delimiter levels: fields within a record, items within a list field,
//! and details within an item. The delimiter characters themselves are
//! the only separation mechanism — values must not contain them, which
//! the entity validation layer enforces before anything reaches a file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Separates top-level fields within one record line.
pub const FIELD_DELIMITER: char = ';';

/// Separates items within a list-valued field.
pub const ITEM_DELIMITER: char = ',';

/// Separates the parts of a single list item.
pub const DETAIL_DELIMITER: char = ':';

#[derive(Debug, Error)]
pub enum LineFileError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Reads every non-empty line of `path`.
///
/// A missing file reads as an empty store, not an error.
pub fn read_lines<P: AsRef<Path>>(path: P) -> Result<Vec<String>, LineFileError> {
    let file = match File::open(path.as_ref()) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut lines = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if !line.is_empty() {
            lines.push(line);
        }
    }
    Ok(lines)
}

/// Appends one newline-terminated record, creating the file if needed.
pub fn append_line<P: AsRef<Path>>(path: P, line: &str) -> Result<(), LineFileError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_ref())?;
    file.write_all(line.as_bytes())?;
    file.write_all(b"\n")?;
    file.flush()?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Replaces the whole file with `lines`, crash-safely.
///
/// The new content is written to a sibling temp file, fsynced, and then
/// atomically renamed over the target. A crash mid-rewrite leaves the
/// previous file intact plus at worst a stale `.tmp` that the next
/// rewrite overwrites.
pub fn rewrite_atomic<P: AsRef<Path>>(path: P, lines: &[String]) -> Result<(), LineFileError> {
    let path = path.as_ref();
    let tmp = tmp_path(path);

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp)?;
    for line in lines {
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
    }
    file.flush()?;
    file.sync_all()?;

    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let lines = read_lines(dir.path().join("nope.txt")).unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn append_then_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("recs.txt");

        append_line(&path, "a;1").unwrap();
        append_line(&path, "b;2").unwrap();

        let lines = read_lines(&path).unwrap();
        assert_eq!(lines, vec!["a;1".to_string(), "b;2".to_string()]);
    }

    #[test]
    fn blank_lines_are_dropped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gaps.txt");
        std::fs::write(&path, "one\n\ntwo\n\n").unwrap();

        let lines = read_lines(&path).unwrap();
        assert_eq!(lines, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn rewrite_replaces_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("recs.txt");

        append_line(&path, "old").unwrap();
        rewrite_atomic(&path, &["new1".to_string(), "new2".to_string()]).unwrap();

        let lines = read_lines(&path).unwrap();
        assert_eq!(lines, vec!["new1".to_string(), "new2".to_string()]);
    }

    #[test]
    fn rewrite_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("recs.txt");

        rewrite_atomic(&path, &["x".to_string()]).unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map(|x| x == "tmp").unwrap_or(false))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn rewrite_with_empty_set_truncates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("recs.txt");

        append_line(&path, "only").unwrap();
        rewrite_atomic(&path, &[]).unwrap();

        assert!(read_lines(&path).unwrap().is_empty());
    }
}
