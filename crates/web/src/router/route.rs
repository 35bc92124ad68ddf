use super::uri_matcher::{PathVariables, RouteError, UriMatcher};

/// A compiled template paired with whatever should serve the paths it matches.
#[derive(Debug)]
pub struct Route<T> {
    matcher: UriMatcher,
    handler: T,
}

impl<T> Route<T> {
    pub fn new(template: &str, handler: T) -> Result<Self, RouteError> {
        Ok(Self::with_matcher(UriMatcher::new(template)?, handler))
    }

    pub fn with_matcher(matcher: UriMatcher, handler: T) -> Self {
        Self { matcher, handler }
    }

    pub fn matcher(&self) -> &UriMatcher {
        &self.matcher
    }

    pub fn handler(&self) -> &T {
        &self.handler
    }

    #[inline]
    pub fn matches(&self, path: &str) -> bool {
        self.matcher.matches(path)
    }

    #[inline]
    pub fn match_path(&self, path: &str) -> PathVariables {
        self.matcher.match_path(path)
    }
}
