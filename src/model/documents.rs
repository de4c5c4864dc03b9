//! Document descriptors and the per-category bundle stored on submissions.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One document to place: where its bytes live and what it was called.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDescriptor {
    /// Opaque blob key.
    pub key: String,
    /// Filename declared by the uploader; sanitized before placement.
    pub filename: String,
}

impl DocumentDescriptor {
    /// Convenience constructor.
    #[must_use]
    pub fn new(key: impl Into<String>, filename: impl Into<String>) -> Self {
        Self { key: key.into(), filename: filename.into() }
    }
}

/// Raw entry as submitted; entries lacking either part are dropped.
#[derive(Deserialize)]
struct RawDescriptor {
    key: Option<String>,
    filename: Option<String>,
}

/// Deserializes a descriptor list, treating `null` as empty and skipping
/// incomplete entries.
fn descriptor_list<'de, D>(deserializer: D) -> Result<Vec<DocumentDescriptor>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<RawDescriptor>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|d| match (d.key, d.filename) {
            (Some(key), Some(filename)) => Some(DocumentDescriptor { key, filename }),
            _ => None,
        })
        .collect())
}

/// Parses a bare descriptor list (the shape used by responses).
///
/// # Errors
///
/// Returns an error if the value is neither null nor an array of objects.
pub fn parse_descriptors(value: &Value) -> Result<Vec<DocumentDescriptor>, serde_json::Error> {
    descriptor_list(value)
}

/// The five document categories a submission carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentCategory {
    /// Assessment of compliance.
    Assessment,
    /// Call-in documents.
    CallIn,
    /// Post-award referral.
    PostAwardReferral,
    /// Eligibility description.
    EligibilityDescription,
    /// Summary of the submission.
    SubmissionSummary,
}

impl DocumentCategory {
    /// Every category, in placement order.
    pub const ALL: [Self; 5] = [
        Self::Assessment,
        Self::CallIn,
        Self::PostAwardReferral,
        Self::EligibilityDescription,
        Self::SubmissionSummary,
    ];

    /// Subfolder of the submission root the category is placed in.
    #[must_use]
    pub fn folder(self) -> &'static str {
        match self {
            Self::Assessment => "Assessment of compliance",
            Self::CallIn => "Call in",
            Self::PostAwardReferral => "Post Award Referral",
            Self::EligibilityDescription => "Eligibility description",
            Self::SubmissionSummary => "Summary of submission",
        }
    }
}

/// Documents attached to a submission, grouped by category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseDocuments {
    /// Assessment of compliance.
    #[serde(default, deserialize_with = "descriptor_list")]
    pub assessment_docs: Vec<DocumentDescriptor>,
    /// Call-in documents.
    #[serde(default, deserialize_with = "descriptor_list")]
    pub call_in_docs: Vec<DocumentDescriptor>,
    /// Post-award referral documents.
    #[serde(default, deserialize_with = "descriptor_list")]
    pub par_docs: Vec<DocumentDescriptor>,
    /// Eligibility description documents.
    #[serde(default, deserialize_with = "descriptor_list")]
    pub description_docs: Vec<DocumentDescriptor>,
    /// Submission summary documents.
    #[serde(default, deserialize_with = "descriptor_list")]
    pub submission_docs: Vec<DocumentDescriptor>,
}

impl CaseDocuments {
    /// Returns the descriptors for one category.
    #[must_use]
    pub fn category(&self, category: DocumentCategory) -> &[DocumentDescriptor] {
        match category {
            DocumentCategory::Assessment => &self.assessment_docs,
            DocumentCategory::CallIn => &self.call_in_docs,
            DocumentCategory::PostAwardReferral => &self.par_docs,
            DocumentCategory::EligibilityDescription => &self.description_docs,
            DocumentCategory::SubmissionSummary => &self.submission_docs,
        }
    }

    /// Total descriptor count across categories.
    #[must_use]
    pub fn len(&self) -> usize {
        DocumentCategory::ALL.iter().map(|c| self.category(*c).len()).sum()
    }

    /// True when no category has documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
