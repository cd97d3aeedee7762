//! Tag registry — user-registered compiler extensions.
//!
//! A tag is (name, pattern, transform). During compilation every tag's
//! pattern is applied to the template source in registration order; each
//! match is replaced by whatever the transform emits. Re-registering a name
//! overwrites the tag in place, keeping its original position in the order.

use regex::{Captures, Regex};

use crate::error::TagError;

/// Transformation run on every pattern match; returns replacement source.
pub type TagTransform = Box<dyn Fn(&Captures<'_>) -> String + Send + Sync>;

struct RegisteredTag {
    name: String,
    pattern: Regex,
    transform: TagTransform,
}

/// Ordered collection of registered tags.
#[derive(Default)]
pub struct TagRegistry {
    tags: Vec<RegisteredTag>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or overwrite) a tag. Last write for a given name wins and
    /// applies to all subsequent compilations, not retroactively to cached
    /// artifacts.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        pattern: &str,
        transform: TagTransform,
    ) -> Result<(), TagError> {
        let name = name.into();
        let pattern = Regex::new(pattern).map_err(|source| TagError::Pattern {
            name: name.clone(),
            source,
        })?;
        let tag = RegisteredTag {
            name,
            pattern,
            transform,
        };
        match self.tags.iter_mut().find(|t| t.name == tag.name) {
            Some(existing) => *existing = tag,
            None => self.tags.push(tag),
        }
        Ok(())
    }

    /// Apply every tag to `source`, in registration order.
    pub fn apply(&self, source: &str) -> String {
        let mut out = source.to_owned();
        for tag in &self.tags {
            out = tag
                .pattern
                .replace_all(&out, |caps: &Captures<'_>| (tag.transform)(caps))
                .into_owned();
        }
        out
    }

    pub fn names(&self) -> Vec<&str> {
        self.tags.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl std::fmt::Debug for TagRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagRegistry")
            .field("tags", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_apply_in_registration_order() {
        let mut tags = TagRegistry::new();
        tags.register("a", r"\bfoo\b", Box::new(|_| "bar".to_owned()))
            .unwrap();
        tags.register("b", r"\bbar\b", Box::new(|_| "baz".to_owned()))
            .unwrap();
        // "a" runs first, so its output feeds "b".
        assert_eq!(tags.apply("foo"), "baz");
    }

    #[test]
    fn reregistering_overwrites_in_place() {
        let mut tags = TagRegistry::new();
        tags.register("x", "old", Box::new(|_| "1".to_owned()))
            .unwrap();
        tags.register("y", "unrelated", Box::new(|_| "2".to_owned()))
            .unwrap();
        tags.register("x", "new", Box::new(|_| "3".to_owned()))
            .unwrap();

        assert_eq!(tags.names(), ["x", "y"]);
        assert_eq!(tags.apply("old new"), "old 3");
    }

    #[test]
    fn transform_sees_captures() {
        let mut tags = TagRegistry::new();
        tags.register(
            "upper",
            r"\{upper '([^']*)'\}",
            Box::new(|caps| caps[1].to_uppercase()),
        )
        .unwrap();
        assert_eq!(tags.apply("say {upper 'hi'}"), "say HI");
    }

    #[test]
    fn bad_pattern_is_rejected() {
        let mut tags = TagRegistry::new();
        let err = tags.register("broken", "(", Box::new(|_| String::new()));
        assert!(matches!(err, Err(TagError::Pattern { .. })));
    }
}
