use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use anyhow::anyhow;
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;

use crate::traversal::TraversalGraph;
use crate::types::Asset;
use crate::types::Dependency;

/// Lifecycle of a dependency edge within one build.
///
/// Transitions are monotone: New moves to exactly one of the other states
/// and never back. In particular Deferred never flips to Resolved inside a
/// build; newly discovered usage is reported through `on_undeferred` and
/// handled by the incremental-build collaborator in a later pass.
#[derive(Clone, Debug, PartialEq)]
pub enum DependencyState {
  New,
  Deferred,
  Excluded,
  Resolved,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AssetNode {
  pub asset: Arc<Asset>,
  pub requested_symbols: HashSet<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DependencyNode {
  pub dependency: Arc<Dependency>,
  pub requested_symbols: HashSet<String>,
  pub state: DependencyState,
}

#[derive(Clone, Debug, PartialEq)]
#[allow(clippy::large_enum_variant)]
pub enum AssetGraphNode {
  Root,
  Asset(AssetNode),
  Dependency(DependencyNode),
}

pub type NodeId = usize;

/// How a dependency was answered by the resolver collaborator.
///
/// Resolution failure for a non-optional dependency is not representable
/// here on purpose: it never enters the graph, it surfaces as a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DependencyResolution {
  /// The dependency resolved to an asset node already in the graph
  Asset(NodeId),
  /// The resolver excluded the target from the build
  Excluded,
}

/// The base bipartite graph of assets and the import edges between them.
///
/// Built by applying resolver/transformer results; append-only during one
/// build. Node payloads live in a side table so ids stay stable and
/// insertion is idempotent by content key.
#[derive(Clone, Debug)]
pub struct AssetGraph {
  pub graph: StableDiGraph<NodeId, ()>,
  nodes: Vec<AssetGraphNode>,
  content_key_to_node_id: HashMap<String, NodeId>,
  node_id_to_node_index: HashMap<NodeId, NodeIndex>,
  root_node_id: NodeId,
}

impl Default for AssetGraph {
  fn default() -> Self {
    Self::new()
  }
}

impl AssetGraph {
  pub fn new() -> Self {
    let mut graph = StableDiGraph::new();

    let mut node_id_to_node_index = HashMap::new();
    let nodes = vec![AssetGraphNode::Root];
    let root_node_id = 0;

    node_id_to_node_index.insert(root_node_id, graph.add_node(root_node_id));

    AssetGraph {
      graph,
      nodes,
      content_key_to_node_id: HashMap::new(),
      node_id_to_node_index,
      root_node_id,
    }
  }

  pub fn root_node(&self) -> NodeId {
    self.root_node_id
  }

  pub fn nodes(&self) -> impl Iterator<Item = &AssetGraphNode> {
    self.nodes.iter()
  }

  pub fn get_node(&self, id: NodeId) -> Option<&AssetGraphNode> {
    self.nodes.get(id)
  }

  pub fn get_node_id_by_content_key(&self, content_key: &str) -> Option<NodeId> {
    self.content_key_to_node_id.get(content_key).copied()
  }

  pub fn get_asset_node(&self, id: NodeId) -> Option<&AssetNode> {
    match self.nodes.get(id)? {
      AssetGraphNode::Asset(node) => Some(node),
      _ => None,
    }
  }

  pub fn get_asset_node_mut(&mut self, id: NodeId) -> Option<&mut AssetNode> {
    match self.nodes.get_mut(id)? {
      AssetGraphNode::Asset(node) => Some(node),
      _ => None,
    }
  }

  pub fn get_dependency_node(&self, id: NodeId) -> Option<&DependencyNode> {
    match self.nodes.get(id)? {
      AssetGraphNode::Dependency(node) => Some(node),
      _ => None,
    }
  }

  pub fn get_dependency_node_mut(&mut self, id: NodeId) -> Option<&mut DependencyNode> {
    match self.nodes.get_mut(id)? {
      AssetGraphNode::Dependency(node) => Some(node),
      _ => None,
    }
  }

  pub fn get_assets(&self) -> impl Iterator<Item = &AssetNode> {
    self.nodes.iter().filter_map(|node| match node {
      AssetGraphNode::Asset(asset_node) => Some(asset_node),
      _ => None,
    })
  }

  pub fn get_dependency_nodes(&self) -> impl Iterator<Item = &DependencyNode> {
    self.nodes.iter().filter_map(|node| match node {
      AssetGraphNode::Dependency(dependency_node) => Some(dependency_node),
      _ => None,
    })
  }

  fn add_node(&mut self, content_key: String, node: AssetGraphNode) -> NodeId {
    if let Some(existing_node_id) = self.content_key_to_node_id.get(&content_key) {
      return *existing_node_id;
    }

    let node_id = self.nodes.len();
    self.nodes.push(node);
    self.content_key_to_node_id.insert(content_key, node_id);

    let node_index = self.graph.add_node(node_id);
    self.node_id_to_node_index.insert(node_id, node_index);

    node_id
  }

  pub fn add_asset(&mut self, asset: Arc<Asset>) -> NodeId {
    let content_key = asset.id.clone();
    self.add_node(
      content_key,
      AssetGraphNode::Asset(AssetNode {
        asset,
        requested_symbols: HashSet::new(),
      }),
    )
  }

  /// Adds a dependency originating from `from_node` (an asset, or the root
  /// for entries).
  ///
  /// Idempotent: a dependency with the same specifier, environment and
  /// pipeline key from the same asset maps to the same id and returns the
  /// existing node rather than a duplicate edge.
  pub fn add_dependency(&mut self, from_node: NodeId, dependency: Dependency) -> NodeId {
    let content_key = dependency.id();
    let node_id = self.add_node(
      content_key,
      AssetGraphNode::Dependency(DependencyNode {
        dependency: Arc::new(dependency),
        requested_symbols: HashSet::new(),
        state: DependencyState::New,
      }),
    );

    self.add_edge(from_node, node_id);
    node_id
  }

  /// Roots the graph with an entry dependency. A library entry requests the
  /// full `*` namespace so every export is retained.
  pub fn add_entry_dependency(&mut self, dependency: Dependency) -> NodeId {
    let is_library = dependency.env.is_library;
    let root = self.root_node();
    let dependency_node_id = self.add_dependency(root, dependency);

    if is_library {
      if let Some(node) = self.get_dependency_node_mut(dependency_node_id) {
        node.requested_symbols.insert("*".into());
      }
    }

    dependency_node_id
  }

  /// Records the resolver's answer for a dependency and applies the deferral
  /// policy.
  ///
  /// A resolved dependency is deferred when its import sites are statically
  /// known and non-empty, none of those symbols were requested by any live
  /// code path propagated so far, and the target asset is side-effect free.
  /// Callers therefore propagate requested symbols from the importer before
  /// resolving its dependencies.
  pub fn resolve_dependency(
    &mut self,
    dependency_node: NodeId,
    resolution: DependencyResolution,
  ) -> anyhow::Result<DependencyState> {
    let Some(node) = self.get_dependency_node(dependency_node) else {
      return Err(anyhow!(
        "Node {} is not a dependency node",
        dependency_node
      ));
    };

    let state = match resolution {
      DependencyResolution::Excluded => DependencyState::Excluded,
      DependencyResolution::Asset(asset_node) => {
        let Some(target) = self.get_asset_node(asset_node) else {
          return Err(anyhow!("Node {} is not an asset node", asset_node));
        };

        let statically_known_imports = node
          .dependency
          .symbols
          .as_ref()
          .is_some_and(|symbols| !symbols.is_empty());
        let nothing_requested = node.requested_symbols.is_empty();
        let side_effect_free = !target.asset.side_effects;

        self.add_edge(dependency_node, asset_node);

        if statically_known_imports && nothing_requested && side_effect_free {
          DependencyState::Deferred
        } else {
          DependencyState::Resolved
        }
      }
    };

    let node = self
      .get_dependency_node_mut(dependency_node)
      .expect("checked above");
    node.state = state.clone();

    Ok(state)
  }

  /// Stable for the whole build: once true it never flips back. Un-deferral
  /// is a rebuild concern, not a graph mutation.
  pub fn is_dependency_deferred(&self, dependency_node: NodeId) -> bool {
    self
      .get_dependency_node(dependency_node)
      .is_some_and(|node| node.state == DependencyState::Deferred)
  }

  pub fn has_edge(&self, from: NodeId, to: NodeId) -> bool {
    self
      .graph
      .contains_edge(self.node_id_to_node_index[&from], self.node_id_to_node_index[&to])
  }

  pub fn add_edge(&mut self, from: NodeId, to: NodeId) {
    if !self.has_edge(from, to) {
      self.graph.add_edge(
        self.node_id_to_node_index[&from],
        self.node_id_to_node_index[&to],
        (),
      );
    }
  }

  /// Outgoing neighbors in edge insertion order. Petgraph iterates adjacency
  /// most-recent-first, hence the reverse.
  pub fn outgoing_neighbors(&self, node: NodeId) -> Vec<NodeId> {
    let mut neighbors: Vec<NodeId> = self
      .graph
      .neighbors_directed(self.node_id_to_node_index[&node], Direction::Outgoing)
      .filter_map(|node_index| self.graph.node_weight(node_index).copied())
      .collect();
    neighbors.reverse();
    neighbors
  }

  pub fn incoming_neighbors(&self, node: NodeId) -> Vec<NodeId> {
    let mut neighbors: Vec<NodeId> = self
      .graph
      .neighbors_directed(self.node_id_to_node_index[&node], Direction::Incoming)
      .filter_map(|node_index| self.graph.node_weight(node_index).copied())
      .collect();
    neighbors.reverse();
    neighbors
  }

  /// Every dependency of an asset, regardless of state.
  pub fn get_outgoing_dependencies(&self, asset_node: NodeId) -> Vec<NodeId> {
    self
      .outgoing_neighbors(asset_node)
      .into_iter()
      .filter(|id| self.get_dependency_node(*id).is_some())
      .collect()
  }

  /// The dependencies of an asset that participate in code inclusion:
  /// deferred and excluded edges are filtered out.
  pub fn get_dependencies(&self, asset_node: NodeId) -> Vec<NodeId> {
    self
      .outgoing_neighbors(asset_node)
      .into_iter()
      .filter(|id| {
        self.get_dependency_node(*id).is_some_and(|node| {
          !matches!(
            node.state,
            DependencyState::Deferred | DependencyState::Excluded
          )
        })
      })
      .collect()
  }

  /// All dependencies pointing at an asset, including deferred and excluded
  /// ones, so diagnostics can name every importer.
  pub fn get_incoming_dependencies(&self, asset_node: NodeId) -> Vec<NodeId> {
    self
      .incoming_neighbors(asset_node)
      .into_iter()
      .filter(|id| self.get_dependency_node(*id).is_some())
      .collect()
  }

  pub fn get_resolved_asset(&self, dependency_node: NodeId) -> Option<NodeId> {
    self
      .outgoing_neighbors(dependency_node)
      .into_iter()
      .find(|id| self.get_asset_node(*id).is_some())
  }
}

/// The code-inclusion view of the graph: an asset leads to its live
/// dependencies, a dependency to its resolved asset. Deferred and excluded
/// edges are invisible to this walk.
impl TraversalGraph for AssetGraph {
  type NodeId = NodeId;

  fn children(&self, node: NodeId) -> Vec<NodeId> {
    match self.get_node(node) {
      Some(AssetGraphNode::Asset(_)) => self.get_dependencies(node),
      Some(AssetGraphNode::Dependency(dependency_node)) => {
        if matches!(
          dependency_node.state,
          DependencyState::Deferred | DependencyState::Excluded
        ) {
          Vec::new()
        } else {
          self.get_resolved_asset(node).into_iter().collect()
        }
      }
      Some(AssetGraphNode::Root) => self.outgoing_neighbors(node),
      None => Vec::new(),
    }
  }
}
