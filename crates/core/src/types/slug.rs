//! URL slugs for products and categories.

use core::fmt;

use serde::{Deserialize, Serialize};

/// A lowercase, hyphen-separated URL slug (`organic-cotton-tee`).
///
/// Slugs are unique per table in the backend; this type only guarantees shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Derive a slug from a display name.
    ///
    /// ASCII alphanumerics are kept (lowercased), every other run of
    /// characters collapses to a single `-`, and leading/trailing hyphens
    /// are dropped. Returns `None` when nothing usable remains.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let mut slug = String::with_capacity(name.len());
        let mut pending_dash = false;

        for c in name.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.push(c.to_ascii_lowercase());
            } else {
                pending_dash = true;
            }
        }

        (!slug.is_empty()).then_some(Self(slug))
    }

    /// Derive a slug from a name, falling back to `item-<id>` when the name
    /// has no usable characters.
    #[must_use]
    pub fn from_name_or_id(name: &str, id: uuid::Uuid) -> Self {
        Self::from_name(name).unwrap_or_else(|| Self(format!("item-{}", id.simple())))
    }

    /// The slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_or_id_falls_back() {
        let id = uuid::Uuid::nil();
        let slug = Slug::from_name_or_id("!!!", id);
        assert_eq!(slug.as_str(), "item-00000000000000000000000000000000");
        assert_eq!(Slug::from_name_or_id("Fern Mug", id).as_str(), "fern-mug");
    }

    #[test]
    fn test_from_name() {
        let slug = Slug::from_name("  Organic Cotton Tee (Large!) ");
        assert_eq!(slug.map(|s| s.0), Some("organic-cotton-tee-large".to_owned()));
    }

    #[test]
    fn test_from_name_collapses_separators() {
        let slug = Slug::from_name("Mug -- 12oz / Blue");
        assert_eq!(slug.map(|s| s.0), Some("mug-12oz-blue".to_owned()));
    }

    #[test]
    fn test_from_name_empty() {
        assert_eq!(Slug::from_name("!!!"), None);
    }
}
