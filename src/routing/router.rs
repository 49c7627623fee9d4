//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up the backend for a request path
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) path prefix scan (acceptable for typical route counts)
//! - Explicit NoMatch rather than silent default

use crate::config::RouteConfig;
use crate::routing::matcher::{Matcher, PathPrefixMatcher};

/// A compiled route.
#[derive(Debug)]
pub struct Route {
    pub name: String,
    pub backend: String,
    pub priority: u32,
    matcher: PathPrefixMatcher,
}

impl Route {
    pub fn prefix(&self) -> &str {
        self.matcher.prefix()
    }
}

/// Maps request paths to backend names.
#[derive(Debug)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Compile routes. Higher priority first; among equals the longer prefix wins.
    pub fn from_config(configs: &[RouteConfig]) -> Self {
        let mut routes: Vec<Route> = configs
            .iter()
            .map(|config| Route {
                name: config.name.clone(),
                backend: config.backend.clone(),
                priority: config.priority,
                matcher: PathPrefixMatcher::new(config.path_prefix.clone()),
            })
            .collect();

        routes.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.prefix().len().cmp(&a.prefix().len()))
        });

        Self { routes }
    }

    /// First route matching `path`.
    pub fn match_path(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.matcher.matches(path))
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> Router {
        let mut catch_all = RouteConfig::new("catch-all", "/", "user");
        catch_all.priority = 0;
        Router::from_config(&[
            catch_all,
            RouteConfig::new("users", "/api/v1/users", "user"),
            RouteConfig::new("orders", "/api/v1/orders", "order"),
        ])
    }

    #[test]
    fn longest_prefix_wins_among_equal_priority() {
        let router = router();
        assert_eq!(router.match_path("/api/v1/orders/9").unwrap().backend, "order");
        assert_eq!(router.match_path("/api/v1/users").unwrap().name, "users");
        assert_eq!(router.match_path("/other").unwrap().name, "catch-all");
    }

    #[test]
    fn priority_beats_prefix_length() {
        let mut urgent = RouteConfig::new("urgent", "/api", "order");
        urgent.priority = 10;
        let router = Router::from_config(&[
            RouteConfig::new("users", "/api/v1/users", "user"),
            urgent,
        ]);

        assert_eq!(router.match_path("/api/v1/users").unwrap().name, "urgent");
    }

    #[test]
    fn no_match_is_explicit() {
        let router = Router::from_config(&[RouteConfig::new("users", "/api/v1/users", "user")]);
        assert!(router.match_path("/api/v2/users").is_none());
    }
}
