//! A compact tree, built bottom-up, used to represent derivations.
//!
//! Nodes are stored in creation order.  Since children are always added
//! before their parent, that order is a postorder and the root is the last
//! node.
use core::ops::Index;

pub(crate) type NodeId = usize;

#[derive(Debug, Clone)]
struct TreeNode<TreeItem> {
    item: TreeItem,
    first_child: NodeId,
    next_sibling: NodeId,
}

#[derive(Debug, Clone)]
pub(crate) struct Tree<TreeItem> {
    nodes: Vec<TreeNode<TreeItem>>,
}

impl<TreeItem> Default for Tree<TreeItem> {
    fn default() -> Self {
        Self { nodes: vec![] }
    }
}

impl<TreeItem> Tree<TreeItem> {
    /// Create a new node with the given item and children (previously added
    /// to the tree).  Node ids start at 1, 0 being the null node.
    pub(crate) fn add_node(&mut self, item: TreeItem, children: &[NodeId]) -> NodeId {
        let mut new_node = TreeNode {
            item,
            first_child: 0,
            next_sibling: 0,
        };
        let mut pointer = &mut new_node.first_child;
        for child_index in children {
            *pointer = *child_index;
            pointer = &mut self.nodes[*child_index - 1].next_sibling;
            assert!(
                *pointer == 0,
                "Children added to a node shall not be chained yet!"
            );
        }
        self.nodes.push(new_node);
        self.nodes.len()
    }

    /// Checked accessor to a tree node
    #[inline]
    fn node(&self, node_id: NodeId) -> &'_ TreeNode<TreeItem> {
        assert!(node_id > 0, "Cannot index null node!");
        assert!(node_id <= self.nodes.len(), "Cannot index outside of tree!");
        &self.nodes[node_id - 1]
    }

    /// The last node added, if any.
    pub(crate) fn root(&self) -> Option<NodeId> {
        (!self.nodes.is_empty()).then_some(self.nodes.len())
    }

    /// iterator through the children of the given node
    pub(crate) fn children_iter(&self, node_id: NodeId) -> SiblingIter<'_, TreeItem> {
        SiblingIter {
            tree: self,
            current_id: self.first_child(node_id),
        }
    }

    fn next_sibling(&self, node_id: NodeId) -> Option<NodeId> {
        match self.node(node_id).next_sibling {
            0 => None,
            node_id => Some(node_id),
        }
    }

    fn first_child(&self, node_id: NodeId) -> Option<NodeId> {
        match self.node(node_id).first_child {
            0 => None,
            node_id => Some(node_id),
        }
    }

    /// Number of nodes.
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns an iterator over all the items in the tree, in postorder.
    pub(crate) fn iter(&self) -> impl ExactSizeIterator<Item = &TreeItem> + '_ {
        self.nodes.iter().map(|node| &node.item)
    }
}

impl<TreeItem> Index<NodeId> for Tree<TreeItem> {
    type Output = TreeItem;

    fn index(&self, node_id: NodeId) -> &Self::Output {
        &self.node(node_id).item
    }
}

/// An iterator through sibling nodes
#[derive(Debug)]
pub(crate) struct SiblingIter<'a, TreeItem> {
    tree: &'a Tree<TreeItem>,
    current_id: Option<NodeId>,
}

impl<TreeItem> Iterator for SiblingIter<'_, TreeItem> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current_id = self.current_id;
        std::mem::replace(&mut self.current_id, self.tree.next_sibling(current_id?))
    }
}

#[cfg(test)]
mod tests {
    use super::Tree;

    #[test]
    fn test_postorder() {
        let mut tree = Tree::default();
        let a = tree.add_node("a", &[]);
        let b = tree.add_node("b", &[]);
        let root = tree.add_node("ab", &[a, b]);
        assert_eq!(tree.root(), Some(root));
        assert_eq!(tree.children_iter(root).collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(tree.children_iter(a).count(), 0);
        assert_eq!(tree.iter().copied().collect::<Vec<_>>(), vec!["a", "b", "ab"]);
        assert_eq!(tree[root], "ab");
    }
}
