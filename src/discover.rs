//! Discovery of input files from a glob pattern

use crate::error::{Error, Result};
use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use std::path::PathBuf;
use tracing::{debug, info, warn};

const GLOB_META: [char; 4] = ['*', '?', '[', '{'];

fn is_glob_segment(segment: &str) -> bool {
    segment.contains(GLOB_META)
}

/// Split a pattern into the literal directory to walk and the glob that
/// files below it must match
///
/// `/home/me/Import/**/*.{pdf,png}` becomes `/home/me/Import` and
/// `**/*.{pdf,png}`.
pub fn split_glob(pattern: &str) -> (PathBuf, String) {
    let segments: Vec<&str> = pattern.split('/').collect();

    // Without any wildcard the last named segment is the file to match
    let split_at = segments
        .iter()
        .position(|segment| is_glob_segment(segment))
        .or_else(|| segments.iter().rposition(|segment| !segment.is_empty()))
        .unwrap_or(segments.len());
    let (literal, rest) = segments.split_at(split_at);

    let mut base = PathBuf::new();
    if pattern.starts_with('/') {
        base.push("/");
    }
    for segment in literal.iter().filter(|segment| !segment.is_empty()) {
        base.push(segment);
    }
    if base.as_os_str().is_empty() {
        base.push(".");
    }

    let glob = if rest.iter().any(|segment| is_glob_segment(segment)) {
        rest.join("/")
    } else {
        rest.iter()
            .copied()
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("/")
    };
    (base, glob)
}

/// Regular files matching `pattern`, sorted by path
///
/// Hidden files are included and no ignore files are honored. A missing
/// base directory yields no files.
pub fn discover_files(pattern: &str) -> Result<Vec<PathBuf>> {
    let (base, glob) = split_glob(pattern);
    if glob.is_empty() {
        return Err(Error::Config(format!(
            "files_to_import_glob names no files: {}",
            pattern
        )));
    }
    if !base.is_dir() {
        warn!("Import directory {} does not exist", base.display());
        return Ok(Vec::new());
    }

    debug!(base = %base.display(), glob = %glob, "Discovering files");
    let mut overrides = OverrideBuilder::new(&base);
    overrides.add(&format!("/{glob}"))?;
    let overrides = overrides.build()?;

    let walker = WalkBuilder::new(&base)
        .standard_filters(false)
        .overrides(overrides)
        .build();

    let mut files = Vec::new();
    for entry in walker {
        match entry {
            Ok(e) if e.file_type().is_some_and(|t| t.is_file()) => files.push(e.into_path()),
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable path: {}", e),
        }
    }
    files.sort();

    info!("Found {} files to import in {}", files.len(), base.display());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_split_glob() {
        assert_eq!(
            split_glob("/home/me/Import/**/*.{pdf,png}"),
            (PathBuf::from("/home/me/Import"), "**/*.{pdf,png}".to_string())
        );
        assert_eq!(
            split_glob("inbox/2024-*/scan?.pdf"),
            (PathBuf::from("inbox"), "2024-*/scan?.pdf".to_string())
        );
        assert_eq!(
            split_glob("*.pdf"),
            (PathBuf::from("."), "*.pdf".to_string())
        );
        assert_eq!(
            split_glob("/data/one.pdf"),
            (PathBuf::from("/data"), "one.pdf".to_string())
        );
    }

    #[test]
    fn test_split_glob_trailing_slash_and_non_ascii() {
        assert_eq!(
            split_glob("/data/"),
            (PathBuf::from("/"), "data".to_string())
        );
        assert_eq!(
            split_glob("/äd/"),
            (PathBuf::from("/"), "äd".to_string())
        );
        assert_eq!(
            split_glob("Belege/Quittung_März.pdf"),
            (PathBuf::from("Belege"), "Quittung_März.pdf".to_string())
        );
        assert_eq!(
            split_glob("/Überweisungen/**/*.pdf"),
            (PathBuf::from("/Überweisungen"), "**/*.pdf".to_string())
        );
    }

    #[test]
    fn test_discover_single_non_ascii_file() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("Quittung_März.pdf"));
        touch(&tmp.path().join("andere.pdf"));

        let pattern = format!("{}/Quittung_März.pdf", tmp.path().display());
        let files = discover_files(&pattern).unwrap();
        assert_eq!(files, vec![tmp.path().join("Quittung_März.pdf")]);
    }

    #[test]
    fn test_pattern_without_file_is_config_error() {
        assert!(matches!(discover_files("/"), Err(Error::Config(_))));
    }

    #[test]
    fn test_discover_recursive_with_alternation() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("Import");
        touch(&root.join("b.pdf"));
        touch(&root.join("a.png"));
        touch(&root.join("notes.txt"));
        touch(&root.join("2024/03/c.tiff"));
        touch(&root.join(".hidden/d.jpg"));

        let pattern = format!("{}/**/*.{{jpg,pdf,png,tif,tiff}}", root.display());
        let files = discover_files(&pattern).unwrap();
        let relative: Vec<_> = files
            .iter()
            .map(|f| f.strip_prefix(&root).unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(
            relative,
            vec![".hidden/d.jpg", "2024/03/c.tiff", "a.png", "b.pdf"]
        );
    }

    #[test]
    fn test_discover_top_level_only() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("top.pdf"));
        touch(&tmp.path().join("nested/deep.pdf"));

        let files = discover_files(&format!("{}/*.pdf", tmp.path().display())).unwrap();
        assert_eq!(files, vec![tmp.path().join("top.pdf")]);
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let tmp = TempDir::new().unwrap();
        let pattern = format!("{}/absent/**/*.pdf", tmp.path().display());
        assert!(discover_files(&pattern).unwrap().is_empty());
    }
}
