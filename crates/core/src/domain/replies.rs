use std::collections::HashMap;

use serde::Serialize;

/// Number of public replies per parent id; key `0` holds the top-level count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplyCounts(HashMap<i64, i64>);

impl ReplyCounts {
    pub const TOP_LEVEL: i64 = 0;

    pub fn get(&self, parent: i64) -> i64 {
        self.0.get(&parent).copied().unwrap_or(0)
    }

    pub fn contains(&self, parent: i64) -> bool {
        self.0.contains_key(&parent)
    }

    /// Makes sure `parent` has an entry. The `after` filter can hide the only
    /// comment that established a parent's count.
    pub fn ensure(&mut self, parent: i64) {
        self.0.entry(parent).or_insert(0);
    }

    pub fn total(&self) -> i64 {
        self.0.values().sum()
    }

    pub fn into_inner(self) -> HashMap<i64, i64> {
        self.0
    }
}

impl From<HashMap<i64, i64>> for ReplyCounts {
    fn from(value: HashMap<i64, i64>) -> Self {
        Self(value)
    }
}

/// Replies known to exist but left out of the page. Not clamped: counts and
/// fetches are separate queries, so a concurrent insert can push it below zero.
pub fn hidden_replies(total: i64, shown: usize) -> i64 {
    total - i64::try_from(shown).unwrap_or(i64::MAX)
}

/// A comment as emitted to readers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplyView {
    pub id: i64,
    pub parent: Option<i64>,
    pub text: String,
    pub author: Option<String>,
    pub website: Option<String>,
    pub mode: i64,
    pub created: f64,
    pub modified: Option<f64>,
    pub likes: i64,
    pub dislikes: i64,
    pub hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_replies: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden_replies: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replies: Option<Vec<ReplyView>>,
}

impl ReplyView {
    pub fn attach_replies(&mut self, total: i64, replies: Vec<ReplyView>) {
        self.hidden_replies = Some(hidden_replies(total, replies.len()));
        self.total_replies = Some(total);
        self.replies = Some(replies);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplyPage {
    pub id: Option<i64>,
    pub total_replies: i64,
    pub hidden_replies: i64,
    pub replies: Vec<ReplyView>,
}

impl ReplyPage {
    pub fn new(id: Option<i64>, total_replies: i64, replies: Vec<ReplyView>) -> Self {
        Self {
            id,
            total_replies,
            hidden_replies: hidden_replies(total_replies, replies.len()),
            replies,
        }
    }

    pub fn empty(id: Option<i64>) -> Self {
        Self::new(id, 0, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{hidden_replies, ReplyCounts, ReplyPage};

    #[test]
    fn counts_default_to_zero() {
        let mut counts = ReplyCounts::from(HashMap::from([(0, 3), (7, 2)]));
        assert_eq!(counts.get(7), 2);
        assert_eq!(counts.get(9), 0);
        assert!(!counts.contains(9));
        counts.ensure(9);
        assert!(counts.contains(9));
        assert_eq!(counts.total(), 5);
    }

    #[test]
    fn hidden_replies_is_not_clamped() {
        assert_eq!(hidden_replies(5, 2), 3);
        assert_eq!(hidden_replies(1, 2), -1);
    }

    #[test]
    fn empty_page_has_zero_counts() {
        let page = ReplyPage::empty(Some(0));
        assert_eq!(page.id, Some(0));
        assert_eq!(page.total_replies, 0);
        assert_eq!(page.hidden_replies, 0);
        assert!(page.replies.is_empty());
    }
}
