//! Codelist Store (spec.md §2/§4.6): `CodeSetId → set of valid code values`,
//! loaded once per job and shared read-mostly across attribute strategies.

use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct CodelistStore {
    sets: DashMap<String, Vec<String>>,
}

impl CodelistStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, code_set_id: impl Into<String>, values: Vec<String>) {
        self.sets.insert(code_set_id.into(), values);
    }

    pub fn contains(&self, code_set_id: &str) -> bool {
        self.sets.contains_key(code_set_id)
    }

    /// `None` means the `CodeSetId` itself is unknown (the owning rule
    /// should fail at load, per spec.md §4.6); `Some(false)` means the
    /// value just isn't a member.
    pub fn is_valid(&self, code_set_id: &str, value: &str) -> Option<bool> {
        let set = self.sets.get(code_set_id)?;
        Some(set.iter().any(|v| v.eq_ignore_ascii_case(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_code_set_is_none() {
        let store = CodelistStore::new();
        assert_eq!(store.is_valid("건물구분", "BDG001"), None);
    }

    #[test]
    fn known_value_is_valid() {
        let store = CodelistStore::new();
        store.insert("건물구분", vec!["BDG001".into(), "BDG002".into()]);
        assert_eq!(store.is_valid("건물구분", "BDG001"), Some(true));
        assert_eq!(store.is_valid("건물구분", "BDG003"), Some(false));
    }
}
