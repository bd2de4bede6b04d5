use std::collections::HashMap;
use std::fs;
use std::path::Path;

use icon_audit_types::{StudyError, StudyResult};
use serde::Deserialize;

/// Section of the allow-list holding the per-store developer names.
const DEVELOPER_SECTION: &str = "developer";

/// Curated allow-list, keyed client -> section -> store -> names.
///
/// Membership is exact and case-sensitive; any missing level resolves to
/// "not allowed". Keys outside the developer section are ignored rather than
/// validated.
#[derive(Debug, Default, Deserialize)]
pub struct AllowList(HashMap<String, HashMap<String, HashMap<String, Vec<String>>>>);

impl AllowList {
    pub fn load(path: &Path) -> StudyResult<Self> {
        let contents = fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|err| {
            StudyError::configuration(format!(
                "allow-list {} is not valid JSON: {err}",
                path.display()
            ))
        })
    }

    /// Whether `developer` is an allowed developer for this client and store.
    pub fn permits(&self, client: &str, store: &str, developer: &str) -> bool {
        self.0
            .get(client)
            .and_then(|sections| sections.get(DEVELOPER_SECTION))
            .and_then(|stores| stores.get(store))
            .is_some_and(|names| names.iter().any(|name| name == developer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample() -> AllowList {
        serde_json::from_str(
            r#"{
                "acme": {
                    "developer": {
                        "play": ["Acme Studios", "Acme Labs"],
                        "appstore": ["Acme Studios"]
                    }
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn listed_developers_are_permitted_per_store() {
        let list = sample();
        assert!(list.permits("acme", "play", "Acme Studios"));
        assert!(list.permits("acme", "play", "Acme Labs"));
        assert!(list.permits("acme", "appstore", "Acme Studios"));
        assert!(!list.permits("acme", "appstore", "Acme Labs"));
    }

    #[test]
    fn any_missing_level_denies() {
        let list = sample();
        assert!(!list.permits("other", "play", "Acme Studios"));
        assert!(!list.permits("acme", "amazon", "Acme Studios"));
        assert!(!list.permits("acme", "play", "Someone Else"));
    }

    #[test]
    fn matching_is_case_sensitive() {
        let list = sample();
        assert!(!list.permits("acme", "play", "acme studios"));
        assert!(!list.permits("Acme", "play", "Acme Studios"));
    }

    #[test]
    fn unreadable_files_surface_io_errors() {
        let err = AllowList::load(Path::new("/nonexistent/allow_list.json")).unwrap_err();
        assert!(matches!(err, StudyError::Io(_)));
    }

    #[test]
    fn malformed_json_is_a_configuration_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{not json").unwrap();
        let err = AllowList::load(file.path()).unwrap_err();
        assert!(matches!(err, StudyError::Configuration { .. }));
    }
}
