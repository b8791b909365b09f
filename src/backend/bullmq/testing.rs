//! In-memory keyspace for exercising the adapter without a Redis server.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;

use super::store::{KeyspaceStore, StoreConnector};
use crate::backend::error::ProviderError;

#[derive(Debug, Clone)]
enum Entry {
    String(String),
    List(Vec<String>),
    /// Members in ascending score order
    SortedSet(Vec<String>),
    Hash(HashMap<String, String>),
}

/// A fixed keyspace snapshot with Redis-like typing and paged SCAN.
#[derive(Debug, Clone)]
pub struct MemoryKeyspace {
    entries: BTreeMap<String, Entry>,
    page_size: usize,
    revisits: bool,
}

impl MemoryKeyspace {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            page_size: 10,
            revisits: false,
        }
    }

    pub fn with_string(mut self, key: &str, value: &str) -> Self {
        self.entries
            .insert(key.to_string(), Entry::String(value.to_string()));
        self
    }

    pub fn with_list<S: AsRef<str>>(mut self, key: &str, items: &[S]) -> Self {
        let items = items.iter().map(|s| s.as_ref().to_string()).collect();
        self.entries.insert(key.to_string(), Entry::List(items));
        self
    }

    pub fn with_sorted_set<S: AsRef<str>>(mut self, key: &str, members: &[S]) -> Self {
        let members = members.iter().map(|s| s.as_ref().to_string()).collect();
        self.entries.insert(key.to_string(), Entry::SortedSet(members));
        self
    }

    pub fn with_hash(mut self, key: &str, fields: &[(&str, &str)]) -> Self {
        let fields = fields
            .iter()
            .map(|(f, v)| (f.to_string(), v.to_string()))
            .collect();
        self.entries.insert(key.to_string(), Entry::Hash(fields));
        self
    }

    /// Keys examined per SCAN call, regardless of the COUNT hint.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Makes every page after the first repeat the previous page's last key.
    pub fn with_revisits(mut self) -> Self {
        self.revisits = true;
        self
    }

    fn wrong_type(key: &str) -> ProviderError {
        ProviderError::Internal(format!(
            "WRONGTYPE Operation against a key holding the wrong kind of value: {}",
            key
        ))
    }
}

impl Default for MemoryKeyspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Glob match supporting `*` only, which is all discovery uses.
fn glob_match(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }
    let (first, last) = (parts[0], parts[parts.len() - 1]);
    if !key.starts_with(first) || !key.ends_with(last) || key.len() < first.len() + last.len() {
        return false;
    }
    let mut rest = &key[first.len()..key.len() - last.len()];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    true
}

#[async_trait]
impl KeyspaceStore for MemoryKeyspace {
    async fn scan_page(
        &self,
        cursor: &str,
        pattern: &str,
        _count: usize,
    ) -> Result<(String, Vec<String>), ProviderError> {
        let start: usize = cursor
            .parse()
            .map_err(|_| ProviderError::Internal(format!("invalid cursor {}", cursor)))?;
        let keys: Vec<&String> = self.entries.keys().collect();
        let from = if self.revisits && start > 0 { start - 1 } else { start };
        let end = (start + self.page_size).min(keys.len());
        let matched = keys[from.min(end)..end]
            .iter()
            .filter(|k| glob_match(pattern, k))
            .map(|k| k.to_string())
            .collect();
        let next = if end >= keys.len() {
            "0".to_string()
        } else {
            end.to_string()
        };
        Ok((next, matched))
    }

    async fn list_len(&self, key: &str) -> Result<u64, ProviderError> {
        match self.entries.get(key) {
            None => Ok(0),
            Some(Entry::List(items)) => Ok(items.len() as u64),
            Some(_) => Err(Self::wrong_type(key)),
        }
    }

    async fn sorted_set_len(&self, key: &str) -> Result<u64, ProviderError> {
        match self.entries.get(key) {
            None => Ok(0),
            Some(Entry::SortedSet(members)) => Ok(members.len() as u64),
            Some(_) => Err(Self::wrong_type(key)),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, ProviderError> {
        Ok(self.entries.contains_key(key))
    }

    async fn list_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, ProviderError> {
        match self.entries.get(key) {
            None => Ok(Vec::new()),
            Some(Entry::List(items)) => Ok(slice(items.iter(), start, stop)),
            Some(_) => Err(Self::wrong_type(key)),
        }
    }

    async fn sorted_set_rev_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, ProviderError> {
        match self.entries.get(key) {
            None => Ok(Vec::new()),
            Some(Entry::SortedSet(members)) => Ok(slice(members.iter().rev(), start, stop)),
            Some(_) => Err(Self::wrong_type(key)),
        }
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, ProviderError> {
        match self.entries.get(key) {
            None => Ok(HashMap::new()),
            Some(Entry::Hash(fields)) => Ok(fields.clone()),
            Some(_) => Err(Self::wrong_type(key)),
        }
    }

    async fn ping(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Non-negative start/stop only, inclusive like LRANGE.
fn slice<'a>(items: impl Iterator<Item = &'a String>, start: isize, stop: isize) -> Vec<String> {
    let skip = start.max(0) as usize;
    let take = (stop - start + 1).max(0) as usize;
    items.skip(skip).take(take).cloned().collect()
}

/// Hands out the shared keyspace, or refuses like a dead server.
#[derive(Clone)]
pub struct MemoryConnector {
    keyspace: Option<Arc<MemoryKeyspace>>,
}

impl MemoryConnector {
    pub fn new(keyspace: MemoryKeyspace) -> Self {
        Self {
            keyspace: Some(Arc::new(keyspace)),
        }
    }

    pub fn unreachable() -> Self {
        Self { keyspace: None }
    }
}

#[async_trait]
impl StoreConnector for MemoryConnector {
    type Store = Arc<MemoryKeyspace>;

    async fn connect(&self) -> Result<Self::Store, ProviderError> {
        self.keyspace
            .clone()
            .ok_or_else(|| ProviderError::Unavailable("Connection refused (os error 111)".to_string()))
    }

    fn describe(&self) -> String {
        "memory://".to_string()
    }
}

#[async_trait]
impl KeyspaceStore for Arc<MemoryKeyspace> {
    async fn scan_page(
        &self,
        cursor: &str,
        pattern: &str,
        count: usize,
    ) -> Result<(String, Vec<String>), ProviderError> {
        (**self).scan_page(cursor, pattern, count).await
    }

    async fn list_len(&self, key: &str) -> Result<u64, ProviderError> {
        (**self).list_len(key).await
    }

    async fn sorted_set_len(&self, key: &str) -> Result<u64, ProviderError> {
        (**self).sorted_set_len(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, ProviderError> {
        (**self).exists(key).await
    }

    async fn list_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, ProviderError> {
        (**self).list_range(key, start, stop).await
    }

    async fn sorted_set_rev_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, ProviderError> {
        (**self).sorted_set_rev_range(key, start, stop).await
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, ProviderError> {
        (**self).hash_get_all(key).await
    }

    async fn ping(&self) -> Result<(), ProviderError> {
        (**self).ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("bull:*:id", "bull:emails:id"));
        assert!(glob_match("bull:*:id", "bull:a:b:id"));
        assert!(!glob_match("bull:*:id", "bull:emails:wait"));
        assert!(!glob_match("bull:*:id", "bull:id"));
    }
}
