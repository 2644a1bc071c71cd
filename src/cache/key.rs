//! Key namespacing and canonical key builders.

/// Prepends the configured prefix to every logical key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyNamespace {
    prefix: String,
}

impl KeyNamespace {
    /// Create a namespace with the given prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Get the prefix
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Full key as stored in both tiers
    pub fn full_key(&self, key: &str) -> String {
        let mut full = String::with_capacity(self.prefix.len() + key.len());
        full.push_str(&self.prefix);
        full.push_str(key);
        full
    }

    /// Glob pattern over full keys: the prefix matches literally and
    /// `pattern` keeps its glob meaning
    pub fn full_pattern(&self, pattern: &str) -> String {
        let mut full = glob::Pattern::escape(&self.prefix);
        full.push_str(pattern);
        full
    }

    /// Strip the prefix from a stored key
    pub fn logical_key<'a>(&self, full: &'a str) -> Option<&'a str> {
        full.strip_prefix(self.prefix.as_str())
    }
}

/// Key for data owned by a single user: `user:{id}:{suffix}`
pub fn user_key(user_id: impl std::fmt::Display, suffix: &str) -> String {
    format!("user:{}:{}", user_id, suffix)
}

/// Key for one page of a listing: `list:{type}:page:{p}:size:{s}[:search:{term}]`
///
/// The search term is lowercased so lookups are case-insensitive. An empty
/// term is treated as no search.
pub fn list_key(list_type: &str, page: u32, page_size: u32, search: Option<&str>) -> String {
    let base = format!("list:{}:page:{}:size:{}", list_type, page, page_size);
    match search.filter(|term| !term.is_empty()) {
        Some(term) => format!("{}:search:{}", base, term.to_lowercase()),
        None => base,
    }
}
