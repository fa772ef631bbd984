//! Topic read authorization
//!
//! The orchestrator asks a [`TopicAuthorizer`] whether the caller may view
//! messages of a topic before any search starts.

use crate::error::Result;
use async_trait::async_trait;
use tracing::debug;

/// Decides whether messages of a topic may be viewed
#[async_trait]
pub trait TopicAuthorizer: Send + Sync {
    /// Returns `Ok(false)` when access is denied, `Err` when the decision
    /// itself could not be made
    async fn can_view_topic_messages(&self, topic: &str) -> Result<bool>;
}

/// Authorizer that allows every topic
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllAuthorizer;

#[async_trait]
impl TopicAuthorizer for AllowAllAuthorizer {
    async fn can_view_topic_messages(&self, _topic: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Authorizer that denies topics matching configured patterns
///
/// A pattern is either an exact topic name or a prefix ending in `*`
/// (`_internal*` denies `_internal-offsets`, `_internal` and so on).
#[derive(Debug, Clone, Default)]
pub struct TopicDenyList {
    exact: Vec<String>,
    prefixes: Vec<String>,
}

impl TopicDenyList {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::default();
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }
            match pattern.strip_suffix('*') {
                Some(prefix) => list.prefixes.push(prefix.to_string()),
                None => list.exact.push(pattern.to_string()),
            }
        }
        list
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.prefixes.is_empty()
    }

    pub fn is_denied(&self, topic: &str) -> bool {
        self.exact.iter().any(|t| t == topic) || self.prefixes.iter().any(|p| topic.starts_with(p))
    }
}

#[async_trait]
impl TopicAuthorizer for TopicDenyList {
    async fn can_view_topic_messages(&self, topic: &str) -> Result<bool> {
        let denied = self.is_denied(topic);
        if denied {
            debug!(topic = %topic, "Topic matches deny list");
        }
        Ok(!denied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_allow_all() {
        assert!(AllowAllAuthorizer.can_view_topic_messages("anything").await.unwrap());
    }

    #[tokio::test]
    async fn test_deny_list_patterns() {
        let list = TopicDenyList::new(["secrets", "_internal*", "  ", ""]);
        assert!(!list.is_empty());

        assert!(!list.can_view_topic_messages("secrets").await.unwrap());
        assert!(!list.can_view_topic_messages("_internal-offsets").await.unwrap());
        assert!(!list.can_view_topic_messages("_internal").await.unwrap());
        assert!(list.can_view_topic_messages("secrets-public").await.unwrap());
        assert!(list.can_view_topic_messages("orders").await.unwrap());
    }

    #[test]
    fn test_empty_deny_list() {
        let list = TopicDenyList::new(Vec::<String>::new());
        assert!(list.is_empty());
        assert!(!list.is_denied("orders"));
    }
}
