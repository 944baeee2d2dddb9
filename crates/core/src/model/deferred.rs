use redkite_domain::constants::CONTINUE_THREAD_NAME;
use serde_json::{json, Value};

use super::Fields;

/// A truncated run of children in a comment tree (a `more` node)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeferredSubtree {
    pub id: String,
    pub name: String,
    /// Bare ids of children not yet materialized
    pub children: Vec<String>,
    /// Number of descendants the node stands for
    pub count: u64,
    /// Depth of the children in the tree
    pub depth: u64,
    /// Fullname of the comment or post the children hang under
    pub parent_id: Option<String>,
    /// Fullname of the post the tree belongs to
    pub link_id: Option<String>,
}

impl DeferredSubtree {
    pub(crate) fn from_fields(fields: &Fields) -> Self {
        let text = |key: &str| fields.get(key).and_then(|v| v.as_str()).map(str::to_string);
        let number = |key: &str| fields.get(key).and_then(|v| v.as_u64()).unwrap_or(0);
        let children = fields
            .get("children")
            .and_then(|v| v.as_array())
            .map(|items| items.iter().filter_map(|c| c.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        Self {
            id: text("id").unwrap_or_default(),
            name: text("name").unwrap_or_default(),
            children,
            count: number("count"),
            depth: number("depth"),
            parent_id: text("parent_id"),
            link_id: text("link_id"),
        }
    }

    /// Whether this is the "continue this thread" sentinel
    pub fn is_continue_thread(&self) -> bool {
        self.name == CONTINUE_THREAD_NAME && self.children.is_empty()
    }

    /// Whether nothing is left to expand
    pub fn is_exhausted(&self) -> bool {
        self.children.is_empty() && !self.is_continue_thread()
    }

    /// Drop the first `n` child ids
    pub(crate) fn consume(&mut self, n: usize) {
        let n = n.min(self.children.len());
        self.children.drain(..n);
        self.count = self.count.saturating_sub(n as u64);
    }

    /// Fold another node's pending children into this one
    pub(crate) fn merge(&mut self, other: DeferredSubtree) {
        self.count += other.count;
        self.children.extend(other.children);
        if self.link_id.is_none() {
            self.link_id = other.link_id;
        }
    }

    pub(crate) fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "children": self.children,
            "count": self.count,
            "depth": self.depth,
            "parent_id": self.parent_id,
            "link_id": self.link_id,
        })
    }
}
