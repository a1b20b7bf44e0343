//! Property graph write path.
//!
//! [`GraphStore`] is everything the loader asks of a graph database. Labels,
//! relationship types and property names are closed sets known at compile
//! time; only property values come from the data. [`MemoryGraph`] implements
//! the same MERGE/MATCH semantics in process for tests and dry runs.

use crate::error::{DblpGraphError, Result};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Mutex, MutexGuard};

/// Node labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Label {
    Conference,
    Journal,
    Paper,
    Author,
    Keyword,
    School,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Conference => "Conference",
            Label::Journal => "Journal",
            Label::Paper => "Paper",
            Label::Author => "Author",
            Label::Keyword => "Keyword",
            Label::School => "School",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relationship types
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RelType {
    /// Paper -> Conference | Journal
    PublishedIn,
    /// Author -> Paper
    Write,
    /// Paper -> Paper
    Cite,
    /// Paper -> Keyword
    HasKeyword,
    /// Author -> School
    AffiliatedWith,
    /// Author -> Paper
    Reviewed,
}

impl RelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelType::PublishedIn => "PUBLISHED_IN",
            RelType::Write => "WRITE",
            RelType::Cite => "CITE",
            RelType::HasKeyword => "HAS_KEYWORD",
            RelType::AffiliatedWith => "AFFILIATED_WITH",
            RelType::Reviewed => "REVIEWED",
        }
    }
}

impl fmt::Display for RelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A property value
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum PropertyValue {
    String(String),
    Int(i64),
    Bool(bool),
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

/// Ordered (name, value) pairs
pub type Properties = Vec<(&'static str, PropertyValue)>;

/// A label plus the properties that identify a node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRef {
    pub label: Label,
    pub key: Properties,
}

impl NodeRef {
    pub fn new(label: Label) -> Self {
        Self {
            label,
            key: Vec::new(),
        }
    }

    /// Add an identifying property.
    pub fn with(mut self, name: &'static str, value: impl Into<PropertyValue>) -> Self {
        self.key.push((name, value.into()));
        self
    }
}

/// Node and relationship totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphCounts {
    pub nodes: usize,
    pub relationships: usize,
}

/// Write operations the loader needs from a graph database
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// MERGE the node identified by `node`, then set `props` on it.
    async fn upsert_node(&self, node: &NodeRef, props: &Properties) -> Result<()>;

    /// Set `props` on every node matching `node`. Returns the match count.
    async fn set_properties(&self, node: &NodeRef, props: &Properties) -> Result<usize>;

    /// MERGE a `rel` edge between every match of `from` and every match of
    /// `to`, then set `props` on it. Returns the number of edges merged;
    /// zero means one of the endpoints did not match.
    async fn upsert_relationship(
        &self,
        rel: RelType,
        from: &NodeRef,
        to: &NodeRef,
        props: &Properties,
    ) -> Result<usize>;

    /// DETACH DELETE every node with `label`. Returns the number removed.
    async fn delete_all(&self, label: Label) -> Result<usize>;

    /// Ensure an index on `label.field` exists.
    async fn create_index(&self, label: Label, field: &'static str) -> Result<()>;

    /// Connect each ordered pair of distinct `label` nodes with a `rel`
    /// edge with independent probability `probability`. Nodes are ordered
    /// by `key_field` before sampling so a given `seed` always picks the
    /// same pairs. Returns the number of edges merged.
    async fn generate_random_edges(
        &self,
        label: Label,
        rel: RelType,
        key_field: &'static str,
        probability: f64,
        seed: u64,
    ) -> Result<usize>;

    async fn counts(&self) -> Result<GraphCounts>;
}

/// Sample ordered pairs `(i, j)`, `i != j`, over `0..n`, each with
/// probability `p`.
pub fn sample_pairs<R: Rng + ?Sized>(n: usize, p: f64, rng: &mut R) -> Result<Vec<(usize, usize)>> {
    if !(0.0..=1.0).contains(&p) {
        return Err(DblpGraphError::Config(format!(
            "edge probability must be within [0, 1], got {}",
            p
        )));
    }

    let mut pairs = Vec::new();
    for i in 0..n {
        for j in 0..n {
            if i != j && rng.gen_bool(p) {
                pairs.push((i, j));
            }
        }
    }
    Ok(pairs)
}

/// Property name -> value of one node or edge
pub type PropertyMap = BTreeMap<&'static str, PropertyValue>;

#[derive(Debug, Clone)]
struct MemoryNode {
    label: Label,
    props: PropertyMap,
}

impl MemoryNode {
    fn matches(&self, node: &NodeRef) -> bool {
        self.label == node.label
            && node
                .key
                .iter()
                .all(|(name, value)| self.props.get(name) == Some(value))
    }
}

#[derive(Debug, Clone)]
struct MemoryEdge {
    rel: RelType,
    from: u64,
    to: u64,
    props: PropertyMap,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: u64,
    nodes: BTreeMap<u64, MemoryNode>,
    edges: Vec<MemoryEdge>,
    indexes: BTreeSet<(Label, &'static str)>,
}

impl MemoryState {
    fn matching(&self, node: &NodeRef) -> Vec<u64> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.matches(node))
            .map(|(id, _)| *id)
            .collect()
    }

    fn merge_edge(&mut self, rel: RelType, from: u64, to: u64, props: &Properties) {
        let index = match self
            .edges
            .iter()
            .position(|e| e.rel == rel && e.from == from && e.to == to)
        {
            Some(index) => index,
            None => {
                self.edges.push(MemoryEdge {
                    rel,
                    from,
                    to,
                    props: PropertyMap::new(),
                });
                self.edges.len() - 1
            }
        };
        let edge = &mut self.edges[index];
        for (name, value) in props {
            edge.props.insert(*name, value.clone());
        }
    }
}

/// In-process [`GraphStore`]
#[derive(Debug, Default)]
pub struct MemoryGraph {
    state: Mutex<MemoryState>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of nodes with `label`
    pub fn node_count(&self, label: Label) -> usize {
        self.state().nodes.values().filter(|n| n.label == label).count()
    }

    /// Number of `rel` edges
    pub fn relationship_count(&self, rel: RelType) -> usize {
        self.state().edges.iter().filter(|e| e.rel == rel).count()
    }

    /// Value of `field` on the first node matching `node`
    pub fn property(&self, node: &NodeRef, field: &str) -> Option<PropertyValue> {
        self.state()
            .nodes
            .values()
            .find(|n| n.matches(node))
            .and_then(|n| n.props.get(field).cloned())
    }

    /// Properties of the `rel` edge between the first matches of `from` and `to`
    pub fn relationship(&self, rel: RelType, from: &NodeRef, to: &NodeRef) -> Option<PropertyMap> {
        let state = self.state();
        let from = state.matching(from).into_iter().next()?;
        let to = state.matching(to).into_iter().next()?;
        state
            .edges
            .iter()
            .find(|e| e.rel == rel && e.from == from && e.to == to)
            .map(|e| e.props.clone())
    }

    pub fn has_index(&self, label: Label, field: &str) -> bool {
        self.state()
            .indexes
            .iter()
            .any(|(l, f)| *l == label && *f == field)
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn upsert_node(&self, node: &NodeRef, props: &Properties) -> Result<()> {
        let mut state = self.state();
        let id = match state.matching(node).first() {
            Some(id) => *id,
            None => {
                let id = state.next_id;
                state.next_id += 1;
                let key = node.key.iter().map(|(k, v)| (*k, v.clone())).collect();
                state.nodes.insert(
                    id,
                    MemoryNode {
                        label: node.label,
                        props: key,
                    },
                );
                id
            }
        };
        if let Some(n) = state.nodes.get_mut(&id) {
            for (name, value) in props {
                n.props.insert(*name, value.clone());
            }
        }
        Ok(())
    }

    async fn set_properties(&self, node: &NodeRef, props: &Properties) -> Result<usize> {
        let mut state = self.state();
        let mut matched = 0;
        for n in state.nodes.values_mut().filter(|n| n.matches(node)) {
            for (name, value) in props {
                n.props.insert(*name, value.clone());
            }
            matched += 1;
        }
        Ok(matched)
    }

    async fn upsert_relationship(
        &self,
        rel: RelType,
        from: &NodeRef,
        to: &NodeRef,
        props: &Properties,
    ) -> Result<usize> {
        let mut state = self.state();
        let froms = state.matching(from);
        let tos = state.matching(to);
        let mut merged = 0;
        for a in &froms {
            for b in &tos {
                state.merge_edge(rel, *a, *b, props);
                merged += 1;
            }
        }
        Ok(merged)
    }

    async fn delete_all(&self, label: Label) -> Result<usize> {
        let mut state = self.state();
        let doomed: BTreeSet<u64> = state
            .nodes
            .iter()
            .filter(|(_, n)| n.label == label)
            .map(|(id, _)| *id)
            .collect();
        state.nodes.retain(|id, _| !doomed.contains(id));
        state
            .edges
            .retain(|e| !doomed.contains(&e.from) && !doomed.contains(&e.to));
        Ok(doomed.len())
    }

    async fn create_index(&self, label: Label, field: &'static str) -> Result<()> {
        self.state().indexes.insert((label, field));
        Ok(())
    }

    async fn generate_random_edges(
        &self,
        label: Label,
        rel: RelType,
        key_field: &'static str,
        probability: f64,
        seed: u64,
    ) -> Result<usize> {
        let mut state = self.state();
        let mut ordered: Vec<(Option<PropertyValue>, u64)> = state
            .nodes
            .iter()
            .filter(|(_, n)| n.label == label)
            .map(|(id, n)| (n.props.get(key_field).cloned(), *id))
            .collect();
        ordered.sort();

        let mut rng = StdRng::seed_from_u64(seed);
        let pairs = sample_pairs(ordered.len(), probability, &mut rng)?;
        for (i, j) in &pairs {
            state.merge_edge(rel, ordered[*i].1, ordered[*j].1, &Vec::new());
        }
        Ok(pairs.len())
    }

    async fn counts(&self) -> Result<GraphCounts> {
        let state = self.state();
        Ok(GraphCounts {
            nodes: state.nodes.len(),
            relationships: state.edges.len(),
        })
    }
}
