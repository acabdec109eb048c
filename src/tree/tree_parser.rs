use std::fmt;

use anyhow::bail;
use log::{debug, info};
use pest::{error::Error as PestError, iterators::Pair, Parser};
use pest_derive::Parser;

use crate::errors::ValidationError;
use crate::tree::{
    Node,
    NodeIdx::{self, Internal as Int, Leaf},
    Tree,
};
use crate::Result;

#[derive(Parser)]
#[grammar = "./tree/newick.pest"]
pub struct NewickParser;

#[derive(Debug)]
pub struct ParsingError(pub(crate) Box<PestError<Rule>>);

impl fmt::Display for ParsingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Malformed newick string")?;
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ParsingError {}

/// Parses every tree in a newick string, in order.
///
/// # Example
/// ```
/// use piqtree::tree::from_newick_string;
/// let trees = from_newick_string("(a:0.1,b:0.2,c:0.3);\n((a,b),c,d);").unwrap();
/// assert_eq!(trees.len(), 2);
/// assert_eq!(trees[1].leaf_ids(), vec!["a", "b", "c", "d"]);
/// ```
pub fn from_newick_string(newick_string: &str) -> Result<Vec<Tree>> {
    debug!("Parsing newick trees.");
    let newick_rule = match NewickParser::parse(Rule::newick, newick_string) {
        Ok(mut pairs) => match pairs.next() {
            Some(rule) => rule,
            None => unreachable!(),
        },
        Err(e) => bail!(ParsingError(Box::new(e))),
    };
    let mut trees = Vec::new();
    for tree_rule in newick_rule.into_inner() {
        if tree_rule.as_rule() == Rule::tree {
            trees.push(Tree::from_tree_rule(tree_rule)?);
        }
    }
    info!("Parsed {} newick tree(s).", trees.len());
    Ok(trees)
}

impl Tree {
    fn from_tree_rule(tree_rule: Pair<Rule>) -> Result<Self> {
        let mut tree = Tree {
            root: Leaf(0),
            nodes: Vec::new(),
        };
        match tree_rule.into_inner().next() {
            Some(node_rule) => tree.root = tree.parse_node_rule(node_rule, None)?,
            None => unreachable!(),
        }
        Ok(tree)
    }

    fn parse_node_rule(&mut self, node_rule: Pair<Rule>, parent: Option<NodeIdx>) -> Result<NodeIdx> {
        let pos = self.nodes.len();
        let idx = match node_rule.as_rule() {
            Rule::internal => Int(pos),
            Rule::leaf => Leaf(pos),
            _ => unreachable!(),
        };
        self.nodes.push(Node::new(idx, parent));
        let mut children = Vec::new();
        for rule in node_rule.into_inner() {
            match rule.as_rule() {
                Rule::internal | Rule::leaf => children.push(self.parse_node_rule(rule, Some(idx))?),
                Rule::label => self.nodes[pos].id = Tree::parse_label_rule(rule),
                Rule::branch_length => {
                    self.nodes[pos].blen = Some(Tree::parse_branch_length_rule(rule)?)
                }
                _ => unreachable!(),
            }
        }
        self.nodes[pos].children = children;
        Ok(idx)
    }

    fn parse_branch_length_rule(rule: Pair<Rule>) -> Result<f64> {
        let text = rule.as_str().trim_start_matches(':').trim();
        match text.parse::<f64>() {
            Ok(blen) => Ok(blen),
            Err(_) => bail!(ValidationError::new(format!(
                "Invalid branch length '{}'",
                text
            ))),
        }
    }

    fn parse_label_rule(rule: Pair<Rule>) -> String {
        let text = rule.as_str();
        match text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
            Some(quoted) => quoted.replace("''", "'"),
            None => text.to_string(),
        }
    }
}
