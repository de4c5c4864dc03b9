//! ID generator port for correlation ids.

/// Generates unique identifiers.
///
/// Every pass tags its log span with one of these so a single run can be
/// followed across records.
pub trait IdGenerator: Send + Sync {
    /// Generates a new unique identifier string.
    fn generate_id(&self) -> String;
}
