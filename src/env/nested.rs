//! Nested, ordered key trees for observations and their specs.
//!
//! Both the per-environment observation data and the environment's
//! observation spec are trees of named fields. Keys are addressed with dotted
//! paths (`agents.observation`, `stats.return`) and field order is the
//! insertion order, which ravel transforms rely on.

use serde::{Deserialize, Serialize};

/// An ordered tree whose leaves hold `T`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Nested<T> {
    Leaf(T),
    Node(Vec<(String, Nested<T>)>),
}

/// Shape and bounds of one leaf in an observation spec.
///
/// Per-agent leaves have shape `[n_agents, width]`; environment-level leaves
/// (statistics, flags) have shape `[width]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafSpec {
    pub shape: Vec<usize>,
    pub low: f32,
    pub high: f32,
}

impl LeafSpec {
    /// An unbounded leaf of the given shape.
    pub fn unbounded(shape: Vec<usize>) -> Self {
        Self {
            shape,
            low: f32::NEG_INFINITY,
            high: f32::INFINITY,
        }
    }

    /// Total number of scalars.
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    /// Width of the trailing dimension.
    pub fn width(&self) -> usize {
        self.shape.last().copied().unwrap_or(1)
    }
}

/// Observation spec: a tree of [`LeafSpec`].
pub type Spec = Nested<LeafSpec>;

/// One environment's observation: a tree of flat `f32` buffers laid out
/// row-major according to the matching [`LeafSpec`].
pub type Observation = Nested<Vec<f32>>;

impl<T> Nested<T> {
    /// An empty interior node.
    pub fn node() -> Self {
        Nested::Node(Vec::new())
    }

    /// Builder-style insert, for literal trees.
    pub fn with(mut self, key: &str, value: Nested<T>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a direct child. A leaf is turned into a node first.
    pub fn insert(&mut self, key: &str, value: Nested<T>) {
        if let Nested::Leaf(_) = self {
            *self = Nested::node();
        }
        if let Nested::Node(children) = self {
            match children.iter_mut().find(|(k, _)| k == key) {
                Some((_, slot)) => *slot = value,
                None => children.push((key.to_string(), value)),
            }
        }
    }

    /// Look up a dotted path.
    pub fn get(&self, path: &str) -> Option<&Nested<T>> {
        path.split('.').try_fold(self, |node, part| match node {
            Nested::Node(children) => children.iter().find(|(k, _)| k == part).map(|(_, v)| v),
            Nested::Leaf(_) => None,
        })
    }

    /// Mutable lookup of a dotted path.
    pub fn get_mut(&mut self, path: &str) -> Option<&mut Nested<T>> {
        let mut node = self;
        for part in path.split('.') {
            node = match node {
                Nested::Node(children) => {
                    children.iter_mut().find(|(k, _)| k == part).map(|(_, v)| v)?
                }
                Nested::Leaf(_) => return None,
            };
        }
        Some(node)
    }

    /// The leaf value, if this is a leaf.
    pub fn as_leaf(&self) -> Option<&T> {
        match self {
            Nested::Leaf(v) => Some(v),
            Nested::Node(_) => None,
        }
    }

    /// All leaves depth-first in field order, with their dotted keys.
    pub fn leaves(&self) -> Vec<(String, &T)> {
        let mut out = Vec::new();
        self.collect_leaves(String::new(), &mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, prefix: String, out: &mut Vec<(String, &'a T)>) {
        match self {
            Nested::Leaf(v) => out.push((prefix, v)),
            Nested::Node(children) => {
                for (key, child) in children {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{prefix}.{key}")
                    };
                    child.collect_leaves(path, out);
                }
            }
        }
    }

    /// Dotted keys of all leaves.
    pub fn keys(&self) -> Vec<String> {
        self.leaves().into_iter().map(|(k, _)| k).collect()
    }
}

impl Nested<Vec<f32>> {
    /// First scalar of the leaf at `path`, widened to `f64`.
    pub fn scalar(&self, path: &str) -> Option<f64> {
        self.get(path)
            .and_then(Nested::as_leaf)
            .and_then(|v| v.first())
            .map(|&x| f64::from(x))
    }

    /// Concatenate, per agent, every leaf under this subtree in field order.
    ///
    /// Each leaf is assumed to be `[n_agents, width]` row-major.
    pub fn agent_rows(&self, n_agents: usize) -> Vec<Vec<f32>> {
        let n_agents = n_agents.max(1);
        let mut rows = vec![Vec::new(); n_agents];
        for (_, data) in self.leaves() {
            let width = data.len() / n_agents;
            for (agent, row) in rows.iter_mut().enumerate() {
                row.extend_from_slice(&data[agent * width..(agent + 1) * width]);
            }
        }
        rows
    }
}

/// Dotted keys of all leaves under the reserved `stats` namespace.
pub fn stats_keys(spec: &Spec) -> Vec<String> {
    spec.keys()
        .into_iter()
        .filter(|k| k.split('.').next() == Some(STATS_NAMESPACE) && k.contains('.'))
        .collect()
}

/// Top-level key under which environments report episode statistics.
pub const STATS_NAMESPACE: &str = "stats";
