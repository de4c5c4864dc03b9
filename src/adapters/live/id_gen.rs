//! Run ids from random UUIDs.

use uuid::Uuid;

use crate::ports::IdGenerator;

/// Generates a v4 UUID for every pass.
#[derive(Default)]
pub struct UuidRunIds;

impl IdGenerator for UuidRunIds {
    fn generate_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_hyphenated_uuids() {
        let ids = UuidRunIds;
        let first = ids.generate_id();
        assert_ne!(first, ids.generate_id());
        assert_eq!(first.len(), 36);
    }
}
