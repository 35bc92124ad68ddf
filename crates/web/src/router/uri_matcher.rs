use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;
use regex::Regex;
use thiserror::Error;
use tracing::trace;

/// Variables captured from a path, keyed by the name used in the template.
pub type PathVariables = HashMap<String, String>;

/// Number of paths whose extraction result each matcher remembers.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

#[derive(Error, Debug)]
pub enum RouteError {
    #[error("invalid route template `{template}`: {source}")]
    InvalidTemplate {
        template: String,
        #[source]
        source: regex::Error,
    },
}

/// A compiled URI template.
///
/// Templates are literal paths with three kinds of placeholders:
///
/// - `{name}` captures one segment, stopping at `/` or `.`
/// - `{name}**` captures everything up to the end of the path
/// - `**` matches anything without capturing it
///
/// The whole path has to match: `/health` does not match `/health/`.
///
/// ```
/// use micro_route::router::UriMatcher;
///
/// let matcher = UriMatcher::new("/{bucket}/{key}**").unwrap();
/// let vars = matcher.match_path("/photos/2024/a.jpg");
/// assert_eq!(vars["bucket"], "photos");
/// assert_eq!(vars["key"], "2024/a.jpg");
/// ```
pub struct UriMatcher {
    template: String,
    pattern: Regex,
    variables: Vec<String>,
    cache_capacity: usize,
    cache: Mutex<MatchCache>,
}

impl UriMatcher {
    pub fn new(template: &str) -> Result<Self, RouteError> {
        Self::with_cache_capacity(template, DEFAULT_CACHE_CAPACITY)
    }

    /// Compiles `template`, remembering at most `capacity` extraction results; `0` turns the
    /// cache off.
    pub fn with_cache_capacity(template: &str, capacity: usize) -> Result<Self, RouteError> {
        let (source, variables) = translate(template);
        let pattern = Regex::new(&source)
            .map_err(|source| RouteError::InvalidTemplate { template: template.to_owned(), source })?;
        trace!(template, pattern = %pattern, "compiled route template");

        Ok(Self {
            template: template.to_owned(),
            pattern,
            variables,
            cache_capacity: capacity,
            cache: Mutex::new(MatchCache::new(capacity)),
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// The anchored regular expression the template compiled to.
    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    /// Names of the captured variables, in template order.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn matches(&self, path: &str) -> bool {
        self.pattern.is_match(path)
    }

    /// The variables captured from `path`, or an empty map when it doesn't match.
    pub fn match_path(&self, path: &str) -> PathVariables {
        self.try_match(path).unwrap_or_default()
    }

    /// Like [`UriMatcher::match_path`], but tells a miss apart from a match without variables.
    pub fn try_match(&self, path: &str) -> Option<PathVariables> {
        if self.cache_capacity > 0 {
            if let Some(cached) = self.cache.lock().get(path) {
                return cached.as_deref().cloned();
            }
        }

        let extracted = self.pattern.captures(path).map(|captures| {
            self.variables
                .iter()
                .filter_map(|name| captures.name(name).map(|value| (name.clone(), value.as_str().to_owned())))
                .collect::<PathVariables>()
        });

        if self.cache_capacity > 0 {
            self.cache.lock().put(path, extracted.clone().map(Arc::new));
        }
        extracted
    }
}

impl fmt::Debug for UriMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UriMatcher")
            .field("template", &self.template)
            .field("pattern", &self.pattern.as_str())
            .field("variables", &self.variables)
            .finish_non_exhaustive()
    }
}

/// Turns a template into a regex source and the names it captures.
fn translate(template: &str) -> (String, Vec<String>) {
    let mut source = String::from("^");
    let mut variables = Vec::new();
    let mut literal = String::new();
    let mut rest = template;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("**") {
            source.push_str(&regex::escape(&literal));
            literal.clear();
            source.push_str(".*");
            rest = after;
            continue;
        }

        if let Some((name, after)) = placeholder(rest) {
            source.push_str(&regex::escape(&literal));
            literal.clear();
            let (group, after) = match after.strip_prefix("**") {
                Some(after) => (".*", after),
                None => ("[^/.]*", after),
            };
            source.push_str(&format!("(?P<{name}>{group})"));
            variables.push(name.to_owned());
            rest = after;
            continue;
        }

        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            literal.push(c);
        }
        rest = chars.as_str();
    }

    source.push_str(&regex::escape(&literal));
    source.push('$');
    (source, variables)
}

/// Splits a leading `{name}` off `s`. Names can't be empty or contain `/`.
fn placeholder(s: &str) -> Option<(&str, &str)> {
    let body = s.strip_prefix('{')?;
    let end = body.find('}')?;
    let name = &body[..end];
    (!name.is_empty() && !name.contains('/')).then_some((name, &body[end + 1..]))
}

/// Least recently used memo of extraction results, `None` recording a miss.
///
/// Every access stamps the entry with a fresh tick; `recency` orders the live ticks so the
/// oldest entry is always its first key.
struct MatchCache {
    capacity: usize,
    tick: u64,
    entries: HashMap<String, CacheEntry>,
    recency: BTreeMap<u64, String>,
}

struct CacheEntry {
    value: Option<Arc<PathVariables>>,
    tick: u64,
}

impl MatchCache {
    fn new(capacity: usize) -> Self {
        Self { capacity, tick: 0, entries: HashMap::new(), recency: BTreeMap::new() }
    }

    fn get(&mut self, path: &str) -> Option<Option<Arc<PathVariables>>> {
        let tick = self.next_tick();
        let entry = self.entries.get_mut(path)?;
        let previous = mem::replace(&mut entry.tick, tick);
        if let Some(key) = self.recency.remove(&previous) {
            self.recency.insert(tick, key);
        }
        Some(entry.value.clone())
    }

    fn put(&mut self, path: &str, value: Option<Arc<PathVariables>>) {
        if self.capacity == 0 {
            return;
        }

        let tick = self.next_tick();
        if let Some(entry) = self.entries.get_mut(path) {
            entry.value = value;
            let previous = mem::replace(&mut entry.tick, tick);
            if let Some(key) = self.recency.remove(&previous) {
                self.recency.insert(tick, key);
            }
            return;
        }

        self.entries.insert(path.to_owned(), CacheEntry { value, tick });
        self.recency.insert(tick, path.to_owned());
        while self.recency.len() > self.capacity {
            if let Some((_, evicted)) = self.recency.pop_first() {
                self.entries.remove(&evicted);
            }
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    /// Cached paths, least recently used first.
    #[cfg(test)]
    fn by_recency(&self) -> Vec<&str> {
        self.recency.values().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_splat_captures_the_rest() {
        let matcher = UriMatcher::new("/{bucket}/{key}**").unwrap();
        assert_eq!(matcher.pattern().as_str(), "^/(?P<bucket>[^/.]*)/(?P<key>.*)$");

        let vars = matcher.match_path("/photos/2024/a.jpg");
        assert_eq!(vars.len(), 2);
        assert_eq!(vars["bucket"], "photos");
        assert_eq!(vars["key"], "2024/a.jpg");
        assert_eq!(matcher.variables(), ["bucket", "key"]);
    }

    #[test]
    fn literal_paths_match_exactly() {
        let matcher = UriMatcher::new("/health").unwrap();
        assert!(matcher.matches("/health"));
        assert!(!matcher.matches("/health/"));
        assert!(!matcher.matches("/healthz"));
        assert_eq!(matcher.try_match("/health"), Some(PathVariables::new()));
        assert_eq!(matcher.try_match("/health/"), None);
    }

    #[test]
    fn segment_capture_stops_at_dot_and_slash() {
        let matcher = UriMatcher::new("/files/{name}.{ext}").unwrap();
        let vars = matcher.match_path("/files/report.pdf");
        assert_eq!(vars["name"], "report");
        assert_eq!(vars["ext"], "pdf");

        assert!(!matcher.matches("/files/a/b.pdf"));
        assert!(matcher.match_path("/files/a/b.pdf").is_empty());
    }

    #[test]
    fn anonymous_splat_and_escaped_literals() {
        let splat = UriMatcher::new("/static/**").unwrap();
        assert!(splat.matches("/static/css/site.css"));
        assert!(splat.match_path("/static/css/site.css").is_empty());

        let literal = UriMatcher::new("/v1.0/a+b").unwrap();
        assert!(literal.matches("/v1.0/a+b"));
        assert!(!literal.matches("/v1x0/aab"));
    }

    #[test]
    fn invalid_variable_names_are_rejected() {
        let err = UriMatcher::new("/{not a name}").unwrap_err();
        assert!(matches!(err, RouteError::InvalidTemplate { ref template, .. } if template == "/{not a name}"));
        assert!(UriMatcher::new("/{id}/{id}").is_err());
    }

    #[test]
    fn match_results_are_repeatable() {
        let matcher = UriMatcher::new("/users/{id}").unwrap();
        let first = matcher.match_path("/users/42");
        let second = matcher.match_path("/users/42");
        assert_eq!(first, second);
        assert_eq!(second["id"], "42");
        assert_eq!(matcher.cache.lock().len(), 1);
    }

    #[test]
    fn cache_is_bounded() {
        let matcher = UriMatcher::with_cache_capacity("/users/{id}", 2).unwrap();
        matcher.match_path("/users/1");
        matcher.match_path("/users/2");
        matcher.match_path("/users/1");
        matcher.match_path("/users/3");

        let cache = matcher.cache.lock();
        assert_eq!(cache.len(), 2);
        assert!(cache.entries.contains_key("/users/1"));
        assert!(!cache.entries.contains_key("/users/2"));
    }

    #[test]
    fn hits_refresh_recency_before_eviction() {
        let matcher = UriMatcher::with_cache_capacity("/users/{id}", 3).unwrap();
        for id in ["1", "2", "3"] {
            matcher.match_path(&format!("/users/{id}"));
        }
        assert_eq!(matcher.cache.lock().by_recency(), ["/users/1", "/users/2", "/users/3"]);

        matcher.match_path("/users/1");
        matcher.match_path("/nope");
        assert_eq!(matcher.cache.lock().by_recency(), ["/users/3", "/users/1", "/nope"]);

        matcher.match_path("/users/3");
        matcher.match_path("/users/4");
        let cache = matcher.cache.lock();
        assert_eq!(cache.by_recency(), ["/nope", "/users/3", "/users/4"]);
        assert_eq!(cache.len(), 3);
        assert!(cache.entries["/nope"].value.is_none());
    }

    #[test]
    fn zero_capacity_disables_the_cache() {
        let matcher = UriMatcher::with_cache_capacity("/users/{id}", 0).unwrap();
        assert_eq!(matcher.match_path("/users/7")["id"], "7");
        assert_eq!(matcher.cache.lock().len(), 0);
    }
}
