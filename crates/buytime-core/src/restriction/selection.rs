use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Opaque tokens the user chose to block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestrictionSelection {
    #[serde(default)]
    pub applications: BTreeSet<String>,
    #[serde(default)]
    pub categories: BTreeSet<String>,
    #[serde(default)]
    pub web_domains: BTreeSet<String>,
}

impl RestrictionSelection {
    pub fn is_empty(&self) -> bool {
        self.applications.is_empty() && self.categories.is_empty() && self.web_domains.is_empty()
    }

    pub fn len(&self) -> usize {
        self.applications.len() + self.categories.len() + self.web_domains.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_means_all_three_sets_empty() {
        let mut selection = RestrictionSelection::default();
        assert!(selection.is_empty());
        selection.web_domains.insert("news.example".into());
        assert!(!selection.is_empty());
        assert_eq!(selection.len(), 1);
    }

    #[test]
    fn blob_tolerates_missing_sets() {
        let selection: RestrictionSelection =
            serde_json::from_str(r#"{"applications":["app.social"]}"#).unwrap();
        assert!(selection.applications.contains("app.social"));
        assert!(selection.categories.is_empty());
    }
}
