//! Path-template routing.
//!
//! A [`Router`] keeps [`Route`]s in registration order and hands a path to the first one
//! whose [`UriMatcher`] accepts it. Register the more specific templates first: once
//! `/a/**` is registered, a later `/a/b` is never reached.

mod route;
mod uri_matcher;

pub use route::Route;
pub use uri_matcher::{DEFAULT_CACHE_CAPACITY, PathVariables, RouteError, UriMatcher};

use tracing::debug;

/// Ordered list of routes, first match wins.
#[derive(Debug)]
pub struct Router<T> {
    routes: Vec<Route<T>>,
    cache_capacity: usize,
}

/// The route picked for a path together with what its template captured.
#[derive(Debug)]
pub struct Dispatch<'router, T> {
    route: &'router Route<T>,
    variables: PathVariables,
}

impl<T> Router<T> {
    pub fn new() -> Self {
        Self::with_cache_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// A router whose matchers each remember up to `capacity` paths.
    pub fn with_cache_capacity(capacity: usize) -> Self {
        Self { routes: Vec::new(), cache_capacity: capacity }
    }

    /// Compiles `template` and appends it behind the routes already registered.
    pub fn route(&mut self, template: &str, handler: T) -> Result<&mut Self, RouteError> {
        let matcher = UriMatcher::with_cache_capacity(template, self.cache_capacity)?;
        self.routes.push(Route::with_matcher(matcher, handler));
        Ok(self)
    }

    pub fn dispatch(&self, path: &str) -> Option<Dispatch<'_, T>> {
        let found = self
            .routes
            .iter()
            .find_map(|route| route.matcher().try_match(path).map(|variables| Dispatch { route, variables }));

        if found.is_none() {
            debug!(path, "no route matched");
        }
        found
    }

    pub fn routes(&self) -> &[Route<T>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'router, T> Dispatch<'router, T> {
    pub fn route(&self) -> &'router Route<T> {
        self.route
    }

    pub fn handler(&self) -> &'router T {
        self.route.handler()
    }

    pub fn variables(&self) -> &PathVariables {
        &self.variables
    }

    pub fn into_variables(self) -> PathVariables {
        self.variables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_match_wins() {
        let mut router = Router::new();
        router.route("/a/**", "splat").unwrap().route("/a/b", "exact").unwrap();

        let dispatch = router.dispatch("/a/b").unwrap();
        assert_eq!(*dispatch.handler(), "splat");
        assert_eq!(dispatch.route().matcher().template(), "/a/**");
    }

    #[test]
    fn dispatch_returns_captures() {
        let mut router = Router::new();
        router.route("/health", 1).unwrap().route("/{bucket}/{key}**", 2).unwrap();

        let dispatch = router.dispatch("/photos/2024/a.jpg").unwrap();
        assert_eq!(*dispatch.handler(), 2);
        let vars = dispatch.into_variables();
        assert_eq!(vars["bucket"], "photos");
        assert_eq!(vars["key"], "2024/a.jpg");

        let health = router.dispatch("/health").unwrap();
        assert_eq!(*health.handler(), 1);
        assert!(health.variables().is_empty());
    }

    #[test]
    fn unmatched_paths_dispatch_to_nothing() {
        let mut router = Router::new();
        router.route("/health", ()).unwrap();
        assert!(router.dispatch("/health/").is_none());
        assert!(Router::<()>::default().dispatch("/").is_none());
    }

    #[test]
    fn routes_keep_registration_order() {
        let mut router = Router::with_cache_capacity(0);
        router.route("/b", 'b').unwrap().route("/a", 'a').unwrap();
        let templates: Vec<_> = router.routes().iter().map(|route| route.matcher().template()).collect();
        assert_eq!(templates, ["/b", "/a"]);
        assert_eq!(router.len(), 2);
        assert!(router.route("/{x y}", 'c').is_err());
        assert_eq!(router.len(), 2);
    }

    #[test]
    fn route_delegates_to_its_matcher() {
        let route = Route::new("/users/{id}", ()).unwrap();
        assert!(route.matches("/users/9"));
        assert_eq!(route.match_path("/users/9")["id"], "9");
        assert!(route.match_path("/groups/9").is_empty());
    }
}
