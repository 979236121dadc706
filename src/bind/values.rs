//! Multi-valued string map produced by parsing query strings and form bodies.

use std::collections::BTreeMap;
use std::collections::btree_map;

/// An ordered, multi-valued `key → [value]` map.
///
/// Keys iterate in sorted order. Every key present in the map has at least one
/// value; values under one key keep the order they were added in.
///
/// # Examples
///
/// ```
/// use httpctx::bind::Values;
///
/// let values = Values::parse("tag=a&name=Alice+Smith&tag=b");
/// assert_eq!(values.get("name"), Some("Alice Smith"));
/// assert_eq!(values.get("tag"), Some("a"));
/// let tags: Vec<_> = values.get_all("tag").collect();
/// assert_eq!(tags, vec!["a", "b"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Values {
    inner: BTreeMap<String, Vec<String>>,
}

impl Values {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `application/x-www-form-urlencoded` text (`a=1&b=2`).
    ///
    /// Percent-escapes are decoded and `+` becomes a space. A pair without `=`
    /// maps its key to the empty string.
    pub fn parse(input: &str) -> Self {
        Self::parse_bytes(input.as_bytes())
    }

    /// Same as [`parse`](Self::parse), over raw body bytes.
    pub fn parse_bytes(input: &[u8]) -> Self {
        let mut values = Self::new();
        for (key, value) in form_urlencoded::parse(input) {
            values.add(key, value);
        }
        values
    }

    /// Appends `value` to the list under `key`.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.entry(key.into()).or_default().push(value.into());
    }

    /// Replaces every value under `key` with `value`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.insert(key.into(), vec![value.into()]);
    }

    /// Returns the first value under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner
            .get(key)
            .and_then(|list| list.first())
            .map(String::as_str)
    }

    /// Returns every value under `key`, in insertion order.
    pub fn get_all<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.inner
            .get(key)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Removes `key`, returning its values.
    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.inner.remove(key)
    }

    /// Returns `true` if `key` has at least one value.
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if there are no keys.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterates `(key, values)` in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Appends all values of `other` after the values already present.
    pub fn merge(&mut self, other: &Values) {
        for (key, list) in &other.inner {
            self.inner
                .entry(key.clone())
                .or_default()
                .extend(list.iter().cloned());
        }
    }

    /// Serializes back to `application/x-www-form-urlencoded`, keys sorted.
    pub fn encode(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, list) in &self.inner {
            for value in list {
                serializer.append_pair(key, value);
            }
        }
        serializer.finish()
    }
}

impl<K, V> FromIterator<(K, V)> for Values
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut values = Self::new();
        values.extend(iter);
        values
    }
}

impl<K, V> Extend<(K, V)> for Values
where
    K: Into<String>,
    V: Into<String>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.add(key, value);
        }
    }
}

impl<'a> IntoIterator for &'a Values {
    type Item = (&'a String, &'a Vec<String>);
    type IntoIter = btree_map::Iter<'a, String, Vec<String>>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_decodes_percent_and_plus() {
        let v = Values::parse("q=rust%20lang&name=a+b&sym=%26%3D");
        assert_eq!(v.get("q"), Some("rust lang"));
        assert_eq!(v.get("name"), Some("a b"));
        assert_eq!(v.get("sym"), Some("&="));
    }

    #[test]
    fn parse_keeps_repeated_keys_in_order() {
        let v = Values::parse("id=3&id=1&id=2");
        let ids: Vec<_> = v.get_all("id").collect();
        assert_eq!(ids, vec!["3", "1", "2"]);
        assert_eq!(v.get("id"), Some("3"));
        assert_eq!(v.len(), 1);
    }

    #[test]
    fn parse_key_without_value() {
        let v = Values::parse("flag&x=1");
        assert_eq!(v.get("flag"), Some(""));
        assert_eq!(v.get("x"), Some("1"));
    }

    #[test]
    fn parse_empty() {
        assert!(Values::parse("").is_empty());
    }

    #[test]
    fn set_replaces_all() {
        let mut v = Values::parse("a=1&a=2");
        v.set("a", "9");
        assert_eq!(v.get_all("a").collect::<Vec<_>>(), vec!["9"]);
    }

    #[test]
    fn remove_and_missing() {
        let mut v = Values::parse("a=1");
        assert_eq!(v.remove("a"), Some(vec!["1".to_owned()]));
        assert!(v.get("a").is_none());
        assert_eq!(v.get_all("a").count(), 0);
    }

    #[test]
    fn merge_appends_after_existing() {
        let mut post = Values::parse("a=body");
        post.merge(&Values::parse("a=query&b=2"));
        assert_eq!(post.get_all("a").collect::<Vec<_>>(), vec!["body", "query"]);
        assert_eq!(post.get("b"), Some("2"));
    }

    #[test]
    fn encode_sorted_by_key() {
        let v: Values = [("b", "2"), ("a", "x y")].into_iter().collect();
        assert_eq!(v.encode(), "a=x+y&b=2");
    }
}
