//! Deterministic cache key construction

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::error::{CacheError, Result};

/// Hex characters kept from the context digest. 16 chars = 64 bits, which
/// bounds the collision probability well below the point where two distinct
/// contexts could plausibly share a key within one namespace.
const CONTEXT_HASH_LEN: usize = 16;

/// Builds namespaced cache keys of the shape
/// `{namespace}:{category}:{identifier}` with a fixed-width hash suffix when
/// a context map is supplied.
///
/// Context entries are sorted lexicographically by name before hashing, so
/// the caller's insertion order never affects the resulting key. Without that
/// canonicalization, semantically identical requests would silently miss the
/// cache.
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    namespace: String,
}

impl KeyBuilder {
    /// Create a builder for the given namespace prefix.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// The namespace every key from this builder starts with.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Prefix covering every key of one category, for scan-based operations.
    pub fn category_prefix(&self, category: &str) -> String {
        format!("{}:{}:", self.namespace, category)
    }

    /// Prefix covering the whole namespace.
    pub fn namespace_prefix(&self) -> String {
        format!("{}:", self.namespace)
    }

    /// Build the key for a (category, identifier, context) triple.
    ///
    /// Absence of context is valid and yields a key without a suffix. Empty
    /// category or identifier, and non-scalar context values, are caller
    /// programming errors and fail with [`CacheError::Configuration`].
    pub fn build(
        &self,
        category: &str,
        identifier: &str,
        context: Option<&HashMap<String, serde_json::Value>>,
    ) -> Result<String> {
        if category.is_empty() {
            return Err(CacheError::configuration("cache category must not be empty"));
        }
        if identifier.is_empty() {
            return Err(CacheError::configuration(
                "cache identifier must not be empty",
            ));
        }

        let mut key = format!("{}:{}:{}", self.namespace, category, identifier);
        if let Some(context) = context {
            if !context.is_empty() {
                key.push(':');
                key.push_str(&context_hash(context)?);
            }
        }
        Ok(key)
    }
}

/// Canonicalize and digest a context map.
///
/// Entries are length-prefixed before hashing so that adjacent names and
/// values can never run together and collide (`{"ab": "c"}` vs `{"a": "bc"}`).
fn context_hash(context: &HashMap<String, serde_json::Value>) -> Result<String> {
    let mut entries: Vec<(&String, &serde_json::Value)> = context.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    let mut hasher = Sha256::new();
    for (name, value) in entries {
        if value.is_array() || value.is_object() {
            return Err(CacheError::configuration(format!(
                "context value for '{name}' must be a scalar"
            )));
        }
        hasher.update((name.len() as u64).to_le_bytes());
        hasher.update(name.as_bytes());
        let rendered = value.to_string();
        hasher.update((rendered.len() as u64).to_le_bytes());
        hasher.update(rendered.as_bytes());
    }

    let digest = format!("{:x}", hasher.finalize());
    Ok(digest[..CONTEXT_HASH_LEN].to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn builder() -> KeyBuilder {
        KeyBuilder::new("ai_cache")
    }

    #[test]
    fn test_key_without_context() {
        let key = builder().build("suggestion", "database", None).unwrap();
        assert_eq!(key, "ai_cache:suggestion:database");
    }

    #[test]
    fn test_key_deterministic() {
        let context = HashMap::from([
            ("form_type".to_string(), json!("project")),
            ("locale".to_string(), json!("en")),
        ]);
        let k1 = builder()
            .build("suggestion", "database", Some(&context))
            .unwrap();
        let k2 = builder()
            .build("suggestion", "database", Some(&context))
            .unwrap();
        assert_eq!(k1, k2);
    }

    #[test]
    fn test_context_order_irrelevant() {
        let mut forward = HashMap::new();
        forward.insert("a".to_string(), json!(1));
        forward.insert("b".to_string(), json!(2));
        forward.insert("c".to_string(), json!(3));

        let mut reversed = HashMap::new();
        reversed.insert("c".to_string(), json!(3));
        reversed.insert("b".to_string(), json!(2));
        reversed.insert("a".to_string(), json!(1));

        let k1 = builder().build("validation", "email", Some(&forward)).unwrap();
        let k2 = builder()
            .build("validation", "email", Some(&reversed))
            .unwrap();
        assert_eq!(k1, k2);
    }

    #[test]
    fn test_different_context_different_key() {
        let c1 = HashMap::from([("locale".to_string(), json!("en"))]);
        let c2 = HashMap::from([("locale".to_string(), json!("de"))]);
        let k1 = builder().build("suggestion", "database", Some(&c1)).unwrap();
        let k2 = builder().build("suggestion", "database", Some(&c2)).unwrap();
        assert_ne!(k1, k2);
    }

    #[test]
    fn test_context_suffix_fixed_width() {
        let context = HashMap::from([("k".to_string(), json!("v"))]);
        let key = builder()
            .build("suggestion", "database", Some(&context))
            .unwrap();
        let suffix = key.rsplit(':').next().unwrap();
        assert_eq!(suffix.len(), CONTEXT_HASH_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_empty_context_yields_no_suffix() {
        let context = HashMap::new();
        let key = builder()
            .build("suggestion", "database", Some(&context))
            .unwrap();
        assert_eq!(key, "ai_cache:suggestion:database");
    }

    #[test]
    fn test_adjacent_entries_do_not_collide() {
        let c1 = HashMap::from([("ab".to_string(), json!("c"))]);
        let c2 = HashMap::from([("a".to_string(), json!("bc"))]);
        let k1 = builder().build("suggestion", "field", Some(&c1)).unwrap();
        let k2 = builder().build("suggestion", "field", Some(&c2)).unwrap();
        assert_ne!(k1, k2);
    }

    #[test]
    fn test_empty_category_rejected() {
        let err = builder().build("", "database", None).unwrap_err();
        assert!(matches!(err, CacheError::Configuration { .. }));
    }

    #[test]
    fn test_empty_identifier_rejected() {
        let err = builder().build("suggestion", "", None).unwrap_err();
        assert!(matches!(err, CacheError::Configuration { .. }));
    }

    #[test]
    fn test_non_scalar_context_rejected() {
        let context = HashMap::from([("nested".to_string(), json!({"a": 1}))]);
        let err = builder()
            .build("suggestion", "database", Some(&context))
            .unwrap_err();
        assert!(matches!(err, CacheError::Configuration { .. }));
    }

    #[test]
    fn test_category_prefix() {
        assert_eq!(builder().category_prefix("suggestion"), "ai_cache:suggestion:");
        assert_eq!(builder().namespace_prefix(), "ai_cache:");
    }
}
