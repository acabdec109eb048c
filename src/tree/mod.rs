//! Multifurcating phylogenetic trees read from and written to newick.
use std::collections::BTreeSet;
use std::fmt::{self, Display};
use std::str::FromStr;

use anyhow::bail;
use hashbrown::HashSet;
use log::warn;

use crate::errors::{ParseIqTreeError, ValidationError};
use crate::Result;
use NodeIdx::{Internal as Int, Leaf};

mod tree_parser;

pub use tree_parser::{from_newick_string, ParsingError};

#[derive(Debug, PartialEq, Clone, Copy, PartialOrd, Eq, Ord, Hash)]
pub enum NodeIdx {
    Internal(usize),
    Leaf(usize),
}

impl From<NodeIdx> for usize {
    fn from(node_idx: NodeIdx) -> usize {
        match node_idx {
            Int(idx) => idx,
            Leaf(idx) => idx,
        }
    }
}

impl Display for NodeIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Int(idx) => write!(f, "internal node {}", idx),
            Leaf(idx) => write!(f, "leaf node {}", idx),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub idx: NodeIdx,
    pub parent: Option<NodeIdx>,
    pub children: Vec<NodeIdx>,
    pub blen: Option<f64>,
    pub id: String,
}

impl Node {
    pub(crate) fn new(idx: NodeIdx, parent: Option<NodeIdx>) -> Self {
        Self {
            idx,
            parent,
            children: Vec::new(),
            blen: None,
            id: String::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.idx, Leaf(_))
    }
}

/// Nodes are stored in preorder, the root first.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    pub root: NodeIdx,
    pub nodes: Vec<Node>,
}

impl Tree {
    pub fn node(&self, idx: &NodeIdx) -> &Node {
        &self.nodes[usize::from(*idx)]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn leaves(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|node| node.is_leaf())
    }

    pub fn n(&self) -> usize {
        self.leaves().count()
    }

    /// Leaf names in the order they appear in the newick string.
    pub fn leaf_ids(&self) -> Vec<String> {
        self.leaves().map(|node| node.id.clone()).collect()
    }

    pub fn preorder(&self) -> Vec<NodeIdx> {
        self.nodes.iter().map(|node| node.idx).collect()
    }

    pub fn postorder(&self) -> Vec<NodeIdx> {
        let mut order = Vec::with_capacity(self.len());
        let mut stack = vec![self.root];
        while let Some(idx) = stack.pop() {
            order.push(idx);
            stack.extend(self.node(&idx).children.iter().copied());
        }
        order.reverse();
        order
    }

    /// Branch lengths of all non-root nodes, in preorder. Missing lengths
    /// count as zero.
    pub fn branch_lengths(&self) -> Vec<f64> {
        self.nodes
            .iter()
            .filter(|node| node.parent.is_some())
            .map(|node| node.blen.unwrap_or_default())
            .collect()
    }

    pub fn total_length(&self) -> f64 {
        self.branch_lengths().iter().sum()
    }

    pub fn set_branch_lengths(&mut self, blen: f64) {
        for node in self.nodes.iter_mut().filter(|n| n.parent.is_some()) {
            node.blen = Some(blen);
        }
    }

    /// Replaces negative branch lengths below the root with zero.
    pub fn clamp_negative_branch_lengths(&mut self) {
        let mut clamped = 0;
        for node in self.nodes.iter_mut().filter(|n| n.parent.is_some()) {
            if let Some(blen) = node.blen.filter(|b| *b < 0.0) {
                node.blen = Some(0.0);
                clamped += 1;
                if blen < -1.0 {
                    warn!("Clamped large negative branch length {} on {}", blen, node.idx);
                }
            }
        }
        if clamped > 0 {
            warn!("Clamped {} negative branch length(s) to zero", clamped);
        }
    }

    /// Rewrites every leaf name with `f`, stopping at the first error.
    pub fn map_leaf_ids(&mut self, mut f: impl FnMut(&str) -> Result<String>) -> Result<()> {
        for node in self.nodes.iter_mut().filter(|n| n.is_leaf()) {
            node.id = f(&node.id)?;
        }
        Ok(())
    }

    /// Leaves named by sequence index (`"0"`, `"1"`, ...) are given the
    /// corresponding name.
    pub fn rename_leaves<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        self.map_leaf_ids(|id| match id.parse::<usize>().ok().and_then(|i| names.get(i)) {
            Some(name) => Ok(name.as_ref().to_string()),
            None => bail!(ParseIqTreeError::new(format!(
                "Tip name '{}' is not the index of one of {} sequences",
                id,
                names.len()
            ))),
        })
    }

    pub fn taxa_set(&self) -> HashSet<&str> {
        self.leaves().map(|node| node.id.as_str()).collect()
    }

    pub fn same_taxa_set(&self, other: &Tree) -> bool {
        self.taxa_set() == other.taxa_set()
    }

    fn clade(&self, idx: &NodeIdx) -> BTreeSet<&str> {
        let mut clade = BTreeSet::new();
        let mut stack = vec![*idx];
        while let Some(idx) = stack.pop() {
            let node = self.node(&idx);
            if node.is_leaf() {
                clade.insert(node.id.as_str());
            }
            stack.extend(node.children.iter().copied());
        }
        clade
    }

    /// Non-trivial bipartitions, each written as the side without the
    /// smallest taxon name.
    fn splits(&self) -> HashSet<BTreeSet<&str>> {
        let all = self.clade(&self.root);
        let Some(first) = all.iter().next().copied() else {
            return HashSet::new();
        };
        self.nodes
            .iter()
            .filter(|node| !node.is_leaf() && node.parent.is_some())
            .map(|node| {
                let clade = self.clade(&node.idx);
                if clade.contains(first) {
                    all.difference(&clade).copied().collect()
                } else {
                    clade
                }
            })
            .filter(|split: &BTreeSet<&str>| split.len() > 1 && split.len() < all.len() - 1)
            .collect()
    }

    /// Unrooted topology comparison by leaf names, ignoring branch lengths.
    pub fn same_topology(&self, other: &Tree) -> bool {
        self.same_taxa_set(other) && self.splits() == other.splits()
    }

    /// Structural equality in child order: leaves must match by name and
    /// branch length, internal nodes by branch length only.
    pub fn tree_equal(&self, other: &Tree) -> bool {
        self.subtree_equal(&self.root, other, &other.root)
    }

    fn subtree_equal(&self, idx: &NodeIdx, other: &Tree, other_idx: &NodeIdx) -> bool {
        let (node, other_node) = (self.node(idx), other.node(other_idx));
        if node.children.len() != other_node.children.len() {
            return false;
        }
        let children_equal = node
            .children
            .iter()
            .zip(&other_node.children)
            .all(|(a, b)| self.subtree_equal(a, other, b));
        if !children_equal {
            return false;
        }
        if node.children.is_empty() {
            node.id == other_node.id && node.blen == other_node.blen
        } else {
            node.blen == other_node.blen
        }
    }

    pub fn to_newick(&self) -> String {
        let mut newick = String::new();
        self.write_newick(&self.root, &mut newick);
        newick.push(';');
        newick
    }

    fn write_newick(&self, idx: &NodeIdx, out: &mut String) {
        let node = self.node(idx);
        if !node.is_leaf() {
            out.push('(');
            for (i, child) in node.children.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                self.write_newick(child, out);
            }
            out.push(')');
        }
        out.push_str(&quote_label(&node.id));
        if let Some(blen) = node.blen {
            out.push_str(&format!(":{}", blen));
        }
    }
}

fn quote_label(label: &str) -> String {
    let special = |c: char| c.is_whitespace() || "()[]':;,".contains(c);
    if label.contains(special) {
        format!("'{}'", label.replace('\'', "''"))
    } else {
        label.to_string()
    }
}

impl FromStr for Tree {
    type Err = anyhow::Error;

    /// Parses a string holding exactly one newick tree.
    fn from_str(newick: &str) -> Result<Self> {
        let mut trees = from_newick_string(newick)?;
        if trees.len() != 1 {
            bail!(ValidationError::new(format!(
                "Expected a single newick tree, found {}",
                trees.len()
            )));
        }
        Ok(trees.remove(0))
    }
}

impl Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_newick())
    }
}
