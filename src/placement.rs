//! Document placement: turn descriptor lists into upload plans and copy
//! blobs onto a case site.
//!
//! Planning is pure and deterministic so it can be inspected (see the
//! `plan-files` command). Placement never rolls back: a document that fails
//! is logged, reported and skipped.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::model::DocumentDescriptor;
use crate::ports::{BlobStore, CaseSite};

/// Characters the document library refuses in file names.
const ILLEGAL: &[char] = &['"', '*', ':', '<', '>', '?', '/', '\\', '|', '\t'];

/// One upload: where the bytes come from and the name they land under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFile {
    /// Blob key to fetch.
    pub key: String,
    /// Sanitized, deduplicated file name.
    pub filename: String,
}

/// A document that could not be placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementFailure {
    /// Planned file name.
    pub filename: String,
    /// Why it failed.
    pub reason: String,
}

/// Outcome of one [`place`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementReport {
    /// File names written, in plan order.
    pub placed: Vec<String>,
    /// Documents skipped after a failure.
    pub failed: Vec<PlacementFailure>,
}

impl PlacementReport {
    /// True when every planned document was written.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Appends another report's results.
    pub fn absorb(&mut self, other: PlacementReport) {
        self.placed.extend(other.placed);
        self.failed.extend(other.failed);
    }
}

/// Splits a name into stem and extension at the last dot.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(i) if i + 1 < name.len() => name.split_at(i),
        _ => (name, ""),
    }
}

fn collapse_dots(stem: &str) -> String {
    let mut out = String::with_capacity(stem.len());
    for c in stem.chars() {
        if c == '.' && out.ends_with('.') {
            continue;
        }
        out.push(c);
    }
    out
}

fn replace_illegal(text: &str) -> String {
    text.chars().map(|c| if ILLEGAL.contains(&c) { '_' } else { c }).collect()
}

fn sanitize_once(name: &str) -> String {
    let (stem, extension) = split_extension(name);
    let stem = stem.trim_matches(|c| c == '.' || c == ' ');
    let stem = replace_illegal(&collapse_dots(stem));
    format!("{stem}{}", replace_illegal(extension.trim()))
}

/// Makes a declared file name safe for the document library.
///
/// Leading and trailing dots and spaces are stripped from the stem, runs of
/// dots collapse to one, illegal characters become `_`, and the extension is
/// kept. Applying it twice gives the same result as applying it once.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let mut current = sanitize_once(name);
    loop {
        let next = sanitize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Sanitizes every descriptor's name and deduplicates within the list.
///
/// Later duplicates get ` (n)` before the extension, counting from 1; the
/// first occurrence keeps the plain name. Comparison is case-sensitive.
#[must_use]
pub fn plan_placement(descriptors: &[DocumentDescriptor]) -> Vec<PlannedFile> {
    let mut taken = HashSet::new();
    descriptors
        .iter()
        .map(|descriptor| {
            let safe = sanitize_filename(&descriptor.filename);
            let (stem, extension) = split_extension(&safe);
            let mut filename = safe.clone();
            let mut index = 1;
            while taken.contains(&filename) {
                filename = format!("{stem} ({index}){extension}");
                index += 1;
            }
            taken.insert(filename.clone());
            PlannedFile { key: descriptor.key.clone(), filename }
        })
        .collect()
}

/// Copies the descriptors' blobs into `folder` on `site`, creating the folder.
///
/// Existing files of the same name are overwritten. An empty descriptor list
/// touches nothing.
pub async fn place(
    blobs: &dyn BlobStore,
    site: &dyn CaseSite,
    folder: &str,
    descriptors: &[DocumentDescriptor],
) -> PlacementReport {
    let plan = plan_placement(descriptors);
    let mut report = PlacementReport::default();
    if plan.is_empty() {
        return report;
    }

    if let Err(e) = site.ensure_folder(folder).await {
        warn!(site = site.url(), folder, error = %e, "failed to create destination folder");
        report.failed = plan
            .into_iter()
            .map(|file| PlacementFailure { filename: file.filename, reason: e.to_string() })
            .collect();
        return report;
    }

    for file in plan {
        let outcome = match blobs.fetch(&file.key).await {
            Ok(content) => site.upload_file(folder, &file.filename, content).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(()) => {
                debug!(folder, filename = %file.filename, "placed document");
                report.placed.push(file.filename);
            }
            Err(e) => {
                warn!(
                    site = site.url(),
                    folder,
                    filename = %file.filename,
                    key = %file.key,
                    error = %e,
                    "failed copying document to case site"
                );
                report
                    .failed
                    .push(PlacementFailure { filename: file.filename, reason: e.to_string() });
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryBlobs, MemorySite};

    fn descriptors(names: &[&str]) -> Vec<DocumentDescriptor> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| DocumentDescriptor::new(format!("k{i}"), *n))
            .collect()
    }

    fn planned_names(names: &[&str]) -> Vec<String> {
        plan_placement(&descriptors(names)).into_iter().map(|f| f.filename).collect()
    }

    #[test]
    fn sanitize_cleans_stem_and_keeps_extension() {
        assert_eq!(sanitize_filename(" ..report..final. .pdf"), "report.final.pdf");
        assert_eq!(sanitize_filename("a:b*c?.docx"), "a_b_c_.docx");
        assert_eq!(sanitize_filename("tab\there.txt"), "tab_here.txt");
        assert_eq!(sanitize_filename("noext"), "noext");
        assert_eq!(sanitize_filename("dir/sub\\file.csv"), "dir_sub_file.csv");
    }

    #[test]
    fn sanitize_is_idempotent() {
        for name in [
            "a .b",
            "x. .y",
            " .. ",
            "..pdf",
            "report. pdf ",
            "a...b...c",
            "\"quoted\".txt",
            "trailing.",
            ".hidden",
            "plain.tar.gz",
        ] {
            let once = sanitize_filename(name);
            assert_eq!(sanitize_filename(&once), once, "not idempotent for {name:?}");
        }
    }

    #[test]
    fn duplicates_are_numbered_before_the_extension() {
        assert_eq!(
            planned_names(&["a.txt", "a.txt", "a.txt"]),
            vec!["a.txt", "a (1).txt", "a (2).txt"]
        );
        assert_eq!(
            planned_names(&["report.pdf", "report.pdf"]),
            vec!["report.pdf", "report (1).pdf"]
        );
    }

    #[test]
    fn dedup_is_case_sensitive_and_skips_taken_suffixes() {
        assert_eq!(planned_names(&["A.txt", "a.txt"]), vec!["A.txt", "a.txt"]);
        assert_eq!(
            planned_names(&["a (1).txt", "a.txt", "a.txt"]),
            vec!["a (1).txt", "a.txt", "a (2).txt"]
        );
    }

    #[test]
    fn names_that_sanitize_alike_are_deduplicated() {
        assert_eq!(planned_names(&["a:b.txt", "a?b.txt"]), vec!["a_b.txt", "a_b (1).txt"]);
    }

    #[tokio::test]
    async fn place_skips_failures_and_reports_them() {
        let blobs = MemoryBlobs::default();
        blobs.put("k0", b"one".to_vec());
        blobs.put("k2", b"three".to_vec());
        let site = MemorySite::new("https://site/case42");

        let documents = descriptors(&["a.pdf", "b.pdf", "c.pdf"]);
        let report = place(&blobs, &site, "Docs/Call in", &documents).await;

        assert_eq!(report.placed, vec!["a.pdf", "c.pdf"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].filename, "b.pdf");
        assert!(!report.is_complete());
        assert_eq!(site.file("Docs/Call in", "c.pdf"), Some(b"three".to_vec()));
    }

    #[tokio::test]
    async fn empty_list_creates_no_folder() {
        let site = MemorySite::new("https://site/case42");
        let report = place(&MemoryBlobs::default(), &site, "Docs", &[]).await;
        assert!(report.is_complete());
        assert!(site.folders().is_empty());
    }
}
