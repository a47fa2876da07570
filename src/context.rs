//! Named service tree built from configuration.
//!
//! The context owns every node it creates. Nodes only hold weak links to
//! their parents, so the tree lives exactly as long as the context.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::Serialize;

use crate::config::Config;
use crate::di::Service;
use crate::error::AppError;
use crate::node::{Node, Role};

/// Root of a config-driven tree.
#[derive(Debug)]
pub struct Context {
    nodes: BTreeMap<String, Arc<Node>>,
    safe_raise: bool,
}

/// Serializable view of one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSnapshot {
    pub name: String,
    pub parent: Option<String>,
    pub sentinel: bool,
    pub bound: bool,
    pub services: Vec<String>,
}

impl Context {
    /// Creates every declared node, registers its services, then links each
    /// node below its parent.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let mut nodes = BTreeMap::new();

        for decl in &config.nodes {
            let role = if decl.sentinel {
                Role::Sentinel
            } else {
                Role::Container
            };
            let node = Node::with_role(decl.name.as_str(), role);
            for (key, value) in &decl.services {
                node.set_service(key.as_str(), Arc::new(value.clone()) as Service);
            }
            if nodes.insert(decl.name.clone(), node).is_some() {
                return Err(AppError::InvalidTree(format!(
                    "node '{}' is declared twice",
                    decl.name
                )));
            }
        }

        for decl in &config.nodes {
            if let Some(parent) = &decl.parent {
                if !nodes.contains_key(parent) {
                    return Err(AppError::InvalidTree(format!(
                        "node '{}' names unknown parent '{}'",
                        decl.name, parent
                    )));
                }
            }
        }

        check_acyclic(config)?;

        for decl in &config.nodes {
            if let Some(parent) = &decl.parent {
                nodes[&decl.name].link_from(&nodes[parent])?;
            }
        }

        tracing::info!(nodes = nodes.len(), "Built service tree");

        Ok(Self {
            nodes,
            safe_raise: config.raise.safe,
        })
    }

    /// Looks up a node by name.
    pub fn node(&self, name: &str) -> Result<Arc<Node>, AppError> {
        self.nodes
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::UnknownNode(name.to_string()))
    }

    /// Resolves a string service from the named node.
    pub fn resolve(&self, name: &str, key: &str) -> Result<Arc<String>, AppError> {
        Ok(self.node(name)?.get_as::<String>(key)?)
    }

    /// Raises `key` from the named node, using the configured safety when
    /// `safe` is `None`.
    pub fn raise(&self, name: &str, key: &str, safe: Option<bool>) -> Result<usize, AppError> {
        let safe = safe.unwrap_or(self.safe_raise);
        let depth = self.node(name)?.raise(key, safe)?;
        tracing::info!(node = %name, key = %key, safe, depth, "Raised service");
        Ok(depth)
    }

    /// Current state of every node, ordered by name.
    pub fn snapshot(&self) -> Vec<NodeSnapshot> {
        self.nodes
            .iter()
            .map(|(name, node)| NodeSnapshot {
                name: name.clone(),
                parent: node.parent().map(|p| p.label().to_string()),
                sentinel: node.is_sentinel(),
                bound: node.is_bound(),
                services: node.local_keys(),
            })
            .collect()
    }
}

/// Rejects parent declarations that loop back on themselves.
fn check_acyclic(config: &Config) -> Result<(), AppError> {
    let parents: BTreeMap<&str, &str> = config
        .nodes
        .iter()
        .filter_map(|n| n.parent.as_deref().map(|p| (n.name.as_str(), p)))
        .collect();

    for start in parents.keys() {
        let mut seen = HashSet::new();
        let mut current = *start;
        while let Some(&parent) = parents.get(current) {
            if !seen.insert(current) {
                return Err(AppError::InvalidTree(format!(
                    "parent chain of '{}' loops through '{}'",
                    start, current
                )));
            }
            current = parent;
        }
    }
    Ok(())
}
