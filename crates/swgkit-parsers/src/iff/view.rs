//! Sequential cursor over a container's children

use swgkit_core::{Error, Result};

use super::{Node, Tag};

/// Walks a child list in order, the way schema codecs consume chunks
#[derive(Debug, Clone)]
pub struct ContainerView<'a> {
    children: &'a [Node],
    index: usize,
}

impl<'a> ContainerView<'a> {
    pub fn new(children: &'a [Node]) -> Self {
        Self { children, index: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.index >= self.children.len()
    }

    pub fn peek(&self) -> Option<&'a Node> {
        self.children.get(self.index)
    }

    /// Type name of the next child if it is a container
    pub fn peek_type(&self) -> Option<Tag> {
        self.peek().and_then(Node::type_name)
    }

    /// Tag of the next child if it is a leaf
    pub fn peek_leaf_tag(&self) -> Option<Tag> {
        match self.peek()? {
            Node::Leaf { tag, .. } => Some(*tag),
            Node::Container { .. } => None,
        }
    }

    /// Consume the next child unconditionally
    pub fn next_node(&mut self) -> Option<&'a Node> {
        let node = self.children.get(self.index)?;
        self.index += 1;
        Some(node)
    }

    /// Consume the next child if it is a container of the given type
    pub fn next_form(&mut self, type_name: Tag) -> Option<&'a Node> {
        if self.peek_type() == Some(type_name) {
            self.next_node()
        } else {
            None
        }
    }

    /// Consume the next child if it is a leaf with the given tag
    pub fn next_leaf(&mut self, tag: Tag) -> Option<&'a [u8]> {
        if self.peek_leaf_tag() == Some(tag) {
            self.next_node().and_then(Node::data)
        } else {
            None
        }
    }

    pub fn expect_form(&mut self, type_name: Tag) -> Result<&'a Node> {
        self.next_form(type_name)
            .ok_or_else(|| Error::missing_chunk(format!("FORM {}", type_name)))
    }

    pub fn expect_leaf(&mut self, tag: Tag) -> Result<&'a [u8]> {
        self.next_leaf(tag)
            .ok_or_else(|| Error::missing_chunk(tag.to_string()))
    }

    /// Search all children, consumed or not, for a leaf
    pub fn find_leaf(&self, tag: Tag) -> Option<&'a [u8]> {
        self.children
            .iter()
            .find(|c| c.is_leaf(tag))
            .and_then(Node::data)
    }

    /// Search all children, consumed or not, for a container
    pub fn find_form(&self, type_name: Tag) -> Option<&'a Node> {
        self.children.iter().find(|c| c.is_form(type_name))
    }

    /// Remaining, unconsumed children
    pub fn rest(&self) -> &'a [Node] {
        &self.children[self.index.min(self.children.len())..]
    }
}

impl<'a> Iterator for ContainerView<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_node()
    }
}
