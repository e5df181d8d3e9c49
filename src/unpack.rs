//! Unpacking stage: archive extraction and document discovery.
//!
//! Each upload gets a fresh working directory derived from its identity,
//! so no two uploads ever share extraction state. The working directory is
//! deleted by the pipeline whether the upload succeeds or fails.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs::File;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::PipelineError;
use crate::models::{DocumentKind, RawDocument};

/// Fully extract the archive into `dest`, which must not already hold
/// content (freshness is the isolation guarantee between uploads). Entry
/// paths that would escape `dest` are rejected by the extractor.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<(), PipelineError> {
    if dest.exists() && dest.read_dir()?.next().is_some() {
        return Err(PipelineError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("working directory {} is not empty", dest.display()),
        )));
    }
    std::fs::create_dir_all(dest)?;

    let file = File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)?;
    zip.extract(dest)?;

    Ok(())
}

/// Recursively scan `dir` for files matching the recognized-document globs.
/// Matches are ordered by relative path, so the same archive always yields
/// the same document sequence.
pub fn discover_documents(
    dir: &Path,
    include_globs: &[String],
) -> Result<Vec<RawDocument>, PipelineError> {
    let include_set = build_globset(include_globs)?;

    let mut matches: Vec<(String, PathBuf)> = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|e| {
            PipelineError::Io(e.into_io_error().unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::Other, "walkdir failure")
            }))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(dir).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if !include_set.is_match(&rel_str) {
            continue;
        }

        matches.push((rel_str, path.to_path_buf()));
    }

    matches.sort_by(|a, b| a.0.cmp(&b.0));

    let documents: Vec<RawDocument> = matches
        .into_iter()
        .filter_map(|(_, path)| {
            DocumentKind::from_path(&path).map(|kind| RawDocument { path, kind })
        })
        .collect();

    if documents.is_empty() {
        return Err(PipelineError::NoDocumentsFound {
            dir: dir.to_path_buf(),
        });
    }

    Ok(documents)
}

/// Recursively delete a working directory. Missing directories are fine —
/// the failure path may run before anything was created.
pub fn remove_workdir(dir: &Path) -> std::io::Result<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
    }
    Ok(())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, PipelineError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            PipelineError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid glob '{}': {}", pattern, e),
            ))
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| {
        PipelineError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            e.to_string(),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn pdf_globs() -> Vec<String> {
        vec!["**/*.pdf".to_string()]
    }

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, bytes) in entries {
            writer
                .start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn extract_and_discover_stable_order() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("bundle.zip");
        write_zip(
            &archive,
            &[
                ("reports/z-inspection.pdf", b"pdf two" as &[u8]),
                ("reports/a-title.pdf", b"pdf one"),
                ("notes/readme.txt", b"not a document"),
            ],
        );

        let dest = tmp.path().join("work");
        extract_archive(&archive, &dest).unwrap();

        let docs = discover_documents(&dest, &pdf_globs()).unwrap();
        let names: Vec<String> = docs.iter().map(|d| d.file_name()).collect();
        assert_eq!(names, vec!["a-title.pdf", "z-inspection.pdf"]);
        assert!(docs.iter().all(|d| d.kind == DocumentKind::Pdf));
    }

    #[test]
    fn no_recognized_documents_fails() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("bundle.zip");
        write_zip(&archive, &[("readme.txt", b"text only" as &[u8])]);

        let dest = tmp.path().join("work");
        extract_archive(&archive, &dest).unwrap();

        let err = discover_documents(&dest, &pdf_globs()).unwrap_err();
        assert!(matches!(err, PipelineError::NoDocumentsFound { .. }));
    }

    #[test]
    fn non_empty_destination_rejected() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("bundle.zip");
        write_zip(&archive, &[("doc.pdf", b"pdf" as &[u8])]);

        let dest = tmp.path().join("work");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("leftover"), b"stale").unwrap();

        let err = extract_archive(&archive, &dest).unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }

    #[test]
    fn entries_escaping_destination_never_land_outside() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("bundle.zip");
        write_zip(&archive, &[("../escape.pdf", b"bad" as &[u8])]);

        let dest = tmp.path().join("deep").join("work");
        // The extractor either rejects the entry or strips the traversal;
        // in no case may the file appear outside the destination.
        let _ = extract_archive(&archive, &dest);
        assert!(!tmp.path().join("deep").join("escape.pdf").exists());
        assert!(!tmp.path().join("escape.pdf").exists());
    }

    #[test]
    fn remove_workdir_tolerates_missing() {
        let tmp = TempDir::new().unwrap();
        let gone = tmp.path().join("never-created");
        remove_workdir(&gone).unwrap();
    }
}
