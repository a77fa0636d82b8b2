//! Shared User-Agent string for crawler requests.
//!
//! Single source for the project URL and UA format so every request the
//! crawler makes identifies itself the same way (good citizenship; RFC 9308).

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/artmirror/artmirror";

/// Default User-Agent identifying the crawler and its version.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("artmirror/{version} (archival-crawler; +{PROJECT_UA_URL})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_carries_version_and_project_url() {
        let ua = default_user_agent();
        assert!(ua.contains(PROJECT_UA_URL), "UA must contain project URL");
        assert_eq!(
            env!("CARGO_PKG_VERSION"),
            ua.strip_prefix("artmirror/")
                .and_then(|s| s.split(' ').next())
                .unwrap_or_default(),
            "UA must lead with the crate version"
        );
    }
}
