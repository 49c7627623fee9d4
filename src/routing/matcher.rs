//! Route matching logic.
//!
//! # Responsibilities
//! - Match path prefixes on segment boundaries
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - `/api/v1/users` matches `/api/v1/users` and `/api/v1/users/42`,
//!   never `/api/v1/usersettings`
//! - No regex to guarantee O(n) matching

/// Trait for matching request paths against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the path matches this condition.
    fn matches(&self, path: &str) -> bool;
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher. A trailing slash is ignored.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim_end_matches('/');
        Self {
            prefix: trimmed.to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, path: &str) -> bool {
        // "/" (empty after trimming) matches everything
        if self.prefix.is_empty() {
            return true;
        }
        match path.strip_prefix(&self.prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_matcher() {
        let matcher = PathPrefixMatcher::new("/api/v1/users");

        assert!(matcher.matches("/api/v1/users"));
        assert!(matcher.matches("/api/v1/users/42"));
        assert!(!matcher.matches("/api/v1/usersettings"));
        assert!(!matcher.matches("/api/v1/orders"));
    }

    #[test]
    fn test_root_prefix_matches_all() {
        let matcher = PathPrefixMatcher::new("/");
        assert!(matcher.matches("/"));
        assert!(matcher.matches("/anything"));
    }

    #[test]
    fn test_trailing_slash_ignored() {
        let matcher = PathPrefixMatcher::new("/api/v1/orders/");
        assert_eq!(matcher.prefix(), "/api/v1/orders");
        assert!(matcher.matches("/api/v1/orders"));
    }
}
