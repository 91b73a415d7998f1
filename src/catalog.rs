use crate::version::VersionId;

/// Known installable CPython releases, newest first.
///
/// Static table for now; a remote-refreshed feed can replace `bundled`
/// without touching the lookup logic.
const BUNDLED_RELEASES: &[(u32, u32, u32, Option<&str>)] = &[
    (3, 14, 0, Some("rc1")),
    (3, 13, 5, None),
    (3, 13, 1, None),
    (3, 13, 0, None),
    (3, 12, 10, None),
    (3, 12, 7, None),
    (3, 12, 5, None),
    (3, 12, 0, None),
    (3, 11, 11, None),
    (3, 11, 9, None),
    (3, 10, 16, None),
    (3, 9, 21, None),
];

/// The set of versions known to be installable, independent of what is
/// currently installed.
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<VersionId>,
}

impl Catalog {
    /// Catalog backed by the compiled-in release table
    pub fn bundled() -> Self {
        let entries = BUNDLED_RELEASES
            .iter()
            .map(|&(major, minor, patch, prerelease)| {
                let v = VersionId::new(major, minor, patch);
                match prerelease {
                    Some(tag) => v.with_prerelease(tag),
                    None => v,
                }
            })
            .collect();
        Self::with_versions(entries)
    }

    /// Catalog over an explicit version list; kept sorted newest first
    pub fn with_versions(mut entries: Vec<VersionId>) -> Self {
        entries.sort_by(|a, b| b.cmp(a));
        entries.dedup();
        Self { entries }
    }

    /// All installable versions, newest first. When `include_prerelease`
    /// is false, pre-release entries are dropped entirely.
    pub fn list_available(&self, include_prerelease: bool) -> Vec<VersionId> {
        self.entries
            .iter()
            .filter(|v| include_prerelease || !v.is_prerelease())
            .cloned()
            .collect()
    }

    pub fn contains(&self, version: &VersionId) -> bool {
        self.entries.contains(version)
    }

    /// Resolve a user-supplied spec against the catalog.
    ///
    /// Tries, in order: the literal "latest", an exact fully-qualified
    /// version, then a prefix match over canonical text (newest patch
    /// wins). Absence is represented as None, never as an error.
    pub fn find_best_match(&self, spec: &str) -> Option<VersionId> {
        let spec = spec.trim();

        if spec == "latest" {
            return self.list_available(false).into_iter().next();
        }

        // Exact lookup only for fully-qualified specs; "3.12" parses to
        // 3.12.0 but must fall through to the prefix rule below.
        if let Ok(exact) = spec.parse::<VersionId>() {
            if exact.to_string() == spec && self.contains(&exact) {
                return Some(exact);
            }
        }

        self.entries
            .iter()
            .find(|v| v.to_string().starts_with(spec))
            .cloned()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::bundled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog_of(texts: &[&str]) -> Catalog {
        Catalog::with_versions(texts.iter().map(|t| t.parse().unwrap()).collect())
    }

    #[test]
    fn test_list_available_order_and_filter() {
        let catalog = catalog_of(&["3.12.5", "3.13.0", "3.14.0rc1", "3.12.7"]);

        let all = catalog.list_available(true);
        let texts: Vec<String> = all.iter().map(|v| v.to_string()).collect();
        assert_eq!(texts, vec!["3.14.0rc1", "3.13.0", "3.12.7", "3.12.5"]);

        let stable = catalog.list_available(false);
        let texts: Vec<String> = stable.iter().map(|v| v.to_string()).collect();
        assert_eq!(texts, vec!["3.13.0", "3.12.7", "3.12.5"]);
    }

    #[test]
    fn test_latest_skips_prerelease() {
        let catalog = catalog_of(&["3.12.7", "3.14.0rc1", "3.13.1"]);
        let latest = catalog.find_best_match("latest").unwrap();
        assert_eq!(latest.to_string(), "3.13.1");

        assert!(Catalog::with_versions(vec![]).find_best_match("latest").is_none());
    }

    #[test]
    fn test_exact_match() {
        let catalog = catalog_of(&["3.12.0", "3.12.5", "3.12.7", "3.13.0"]);
        let v = catalog.find_best_match("3.12.5").unwrap();
        assert_eq!(v.to_string(), "3.12.5");
    }

    #[test]
    fn test_prefix_match_picks_newest_patch() {
        let catalog = catalog_of(&["3.12.0", "3.12.5", "3.12.7", "3.13.0"]);
        let v = catalog.find_best_match("3.12").unwrap();
        assert_eq!(v.to_string(), "3.12.7");
    }

    #[test]
    fn test_no_match_is_none() {
        let catalog = catalog_of(&["3.12.7"]);
        assert!(catalog.find_best_match("2.7").is_none());
        assert!(catalog.find_best_match("not-a-version").is_none());
    }

    #[test]
    fn test_bundled_catalog_is_sorted() {
        let catalog = Catalog::bundled();
        let all = catalog.list_available(true);
        assert!(!all.is_empty());
        for pair in all.windows(2) {
            assert!(pair[0] > pair[1]);
        }
    }
}
