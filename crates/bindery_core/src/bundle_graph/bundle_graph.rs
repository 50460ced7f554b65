use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use petgraph::Direction;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::EdgeRef;
use thiserror::Error;

use crate::asset_graph::{AssetGraph, AssetGraphNode, DependencyState};
use crate::traversal::{GraphVisitor, TraversalGraph, traverse};
use crate::types::{
  Asset, AssetId, Bundle, BundleBehavior, BundleGroup, Dependency, Environment, FileType,
  MaybeBundleBehavior, Priority, Target, create_bundle_group_id, create_bundle_id,
};

pub type NodeId = usize;

/// Edge types in the bundle graph.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(u8)]
pub enum BundleGraphEdgeType {
  /// Base asset-graph edges copied when the bundle graph is derived
  Null = 1,
  /// Bundle -> asset/dependency physical inclusion
  Contains = 2,
  /// Root/dependency -> bundle group, and bundle group -> member bundle
  Bundle = 3,
  /// Explicit reference relationships created by `create_bundle_reference`
  /// and `create_asset_reference`; never inferred from URL-ness
  References = 4,
  /// Bundle -> dependency for internalized async edges
  InternalAsync = 5,
}

#[derive(Clone, Debug, PartialEq)]
#[allow(clippy::large_enum_variant)]
pub enum BundleGraphNode {
  Root,
  Asset(Arc<Asset>),
  Dependency(Arc<Dependency>),
  Bundle(Bundle),
  BundleGroup(BundleGroup),
}

/// A plugin called a mutation with invalid preconditions. These abort the
/// plugin invocation with enough context for a diagnostic; the graph itself
/// is left uncorrupted.
#[derive(Debug, Error, PartialEq)]
pub enum BundleGraphError {
  #[error("createBundle requires either an entry asset or a unique key with an explicit type and environment")]
  InvalidBundleOptions,

  #[error("Asset {asset_id} is not present in the bundle graph")]
  UnknownAsset { asset_id: String },

  #[error("Bundle {bundle_id} is not present in the bundle graph")]
  UnknownBundle { bundle_id: String },

  #[error("Dependency {dependency_id} is not present in the bundle graph")]
  UnknownDependency { dependency_id: String },

  #[error("Bundle group {group_id} is not present in the bundle graph")]
  UnknownBundleGroup { group_id: String },

  #[error("Dependency {dependency_id} has no resolved asset to anchor a bundle group")]
  GroupWithoutResolvedAsset { dependency_id: String },

  #[error(
    "Cannot internalize dependency {dependency_id} into bundle {bundle_id}: asset {asset_id} is not contained in the bundle"
  )]
  InternalizeUncontainedAsset {
    bundle_id: String,
    dependency_id: String,
    asset_id: String,
  },
}

/// What an async/entry dependency resolves to from the perspective of a
/// bundle: a bundle group that must be loaded, or an asset that is available
/// in place. `None` (the dependency was deferred or excluded) means the
/// import vanishes entirely.
#[derive(Debug, PartialEq)]
pub enum ExternalDependencyResolution<'a> {
  BundleGroup(&'a BundleGroup),
  Asset(&'a Asset),
}

/// Options for [`BundleGraph::create_bundle`].
///
/// Either `entry_asset_id` is set (type, environment and splittability are
/// inferred from the asset), or `unique_key`, `bundle_type` and `env` are all
/// supplied for a bundle with no single entry, such as a shared chunk.
#[derive(Clone, Debug, Default)]
pub struct CreateBundleOptions {
  pub entry_asset_id: Option<AssetId>,
  pub unique_key: Option<String>,
  pub bundle_type: Option<FileType>,
  pub env: Option<Arc<Environment>>,
  pub target: Target,
  pub name: Option<String>,
  pub is_entry: bool,
  pub needs_stable_name: bool,
  pub is_splittable: Option<bool>,
  pub bundle_behavior: MaybeBundleBehavior,
}

/// The derived structure grouping assets into bundles and bundles into
/// bundle groups.
///
/// Created from a finalized [`AssetGraph`] snapshot, mutated exclusively by
/// the bundling/optimizing phase (`&mut self` methods, single writer), then
/// handed to packaging-phase consumers as `&BundleGraph`, which freezes it:
/// every query is `&self` and structure-preserving.
#[derive(Clone, Debug)]
pub struct BundleGraph {
  graph: StableDiGraph<NodeId, BundleGraphEdgeType>,
  nodes: Vec<BundleGraphNode>,
  content_key_to_node_id: HashMap<String, NodeId>,
  node_id_to_node_index: HashMap<NodeId, NodeIndex>,
  root_node_id: NodeId,
  dependency_states: HashMap<NodeId, DependencyState>,
  asset_public_ids: HashSet<String>,
  public_id_by_asset_id: HashMap<String, String>,
  bundle_public_ids: HashSet<String>,
}

impl Default for BundleGraph {
  fn default() -> Self {
    Self::new()
  }
}

impl BundleGraph {
  pub fn new() -> Self {
    let mut graph = StableDiGraph::new();
    let mut node_id_to_node_index = HashMap::new();
    let nodes = vec![BundleGraphNode::Root];
    let root_node_id = 0;
    node_id_to_node_index.insert(root_node_id, graph.add_node(root_node_id));

    Self {
      graph,
      nodes,
      content_key_to_node_id: HashMap::new(),
      node_id_to_node_index,
      root_node_id,
      dependency_states: HashMap::new(),
      asset_public_ids: HashSet::new(),
      public_id_by_asset_id: HashMap::new(),
      bundle_public_ids: HashSet::new(),
    }
  }

  /// Seeds the bundle graph from a finalized asset graph: every asset and
  /// dependency node is copied, the base edges become `Null` edges, and
  /// dependency states come along so deferred/excluded edges stay invisible
  /// to code-inclusion queries.
  pub fn from_asset_graph(asset_graph: &AssetGraph) -> Self {
    let mut bundle_graph = BundleGraph::new();

    let mut asset_node_mapping: HashMap<crate::asset_graph::NodeId, NodeId> = HashMap::new();
    asset_node_mapping.insert(asset_graph.root_node(), bundle_graph.root_node_id);

    for (index, node) in asset_graph.nodes().enumerate() {
      match node {
        AssetGraphNode::Root => {}
        AssetGraphNode::Asset(asset_node) => {
          let node_id = bundle_graph.add_asset(Arc::clone(&asset_node.asset));
          asset_node_mapping.insert(index, node_id);
        }
        AssetGraphNode::Dependency(dependency_node) => {
          let node_id = bundle_graph.add_dependency(Arc::clone(&dependency_node.dependency));
          bundle_graph
            .dependency_states
            .insert(node_id, dependency_node.state.clone());
          asset_node_mapping.insert(index, node_id);
        }
      }
    }

    for (index, _node) in asset_graph.nodes().enumerate() {
      let Some(from_id) = asset_node_mapping.get(&index) else {
        continue;
      };
      for neighbor in asset_graph.outgoing_neighbors(index) {
        if let Some(to_id) = asset_node_mapping.get(&neighbor) {
          bundle_graph.add_typed_edge(*from_id, *to_id, BundleGraphEdgeType::Null);
        }
      }
    }

    // Assign public ids for assets up front so consumers get stable short
    // handles regardless of bundling order.
    for node in bundle_graph.nodes.iter() {
      if let BundleGraphNode::Asset(asset) = node {
        let public_id = generate_public_id(&asset.id, |candidate| {
          bundle_graph.asset_public_ids.contains(candidate)
        });
        bundle_graph.asset_public_ids.insert(public_id.clone());
        bundle_graph
          .public_id_by_asset_id
          .insert(asset.id.clone(), public_id);
      }
    }

    bundle_graph
  }

  pub fn root_node(&self) -> NodeId {
    self.root_node_id
  }

  fn is_live(&self, id: NodeId) -> bool {
    self.node_id_to_node_index.contains_key(&id)
  }

  pub fn get_node(&self, id: NodeId) -> Option<&BundleGraphNode> {
    if !self.is_live(id) {
      return None;
    }
    self.nodes.get(id)
  }

  pub fn get_node_id_by_content_key(&self, content_key: &str) -> Option<NodeId> {
    self
      .content_key_to_node_id
      .get(content_key)
      .copied()
      .filter(|id| self.is_live(*id))
  }

  fn add_node(&mut self, content_key: String, node: BundleGraphNode) -> NodeId {
    if let Some(existing_node_id) = self.content_key_to_node_id.get(&content_key) {
      if self.is_live(*existing_node_id) {
        return *existing_node_id;
      }
    }

    let node_id = self.nodes.len();
    self.nodes.push(node);
    self.content_key_to_node_id.insert(content_key, node_id);

    let node_index = self.graph.add_node(node_id);
    self.node_id_to_node_index.insert(node_id, node_index);
    node_id
  }

  fn remove_node(&mut self, id: NodeId) {
    if let Some(node_index) = self.node_id_to_node_index.remove(&id) {
      self.graph.remove_node(node_index);
    }
  }

  fn add_asset(&mut self, asset: Arc<Asset>) -> NodeId {
    let content_key = asset.id.clone();
    self.add_node(content_key, BundleGraphNode::Asset(asset))
  }

  fn add_dependency(&mut self, dependency: Arc<Dependency>) -> NodeId {
    let content_key = dependency.id();
    self.add_node(content_key, BundleGraphNode::Dependency(dependency))
  }

  pub fn has_typed_edge(&self, from: NodeId, to: NodeId, edge_type: BundleGraphEdgeType) -> bool {
    let (Some(from_index), Some(to_index)) = (
      self.node_id_to_node_index.get(&from),
      self.node_id_to_node_index.get(&to),
    ) else {
      return false;
    };
    self
      .graph
      .edges_connecting(*from_index, *to_index)
      .any(|edge| *edge.weight() == edge_type)
  }

  fn add_typed_edge(&mut self, from: NodeId, to: NodeId, edge_type: BundleGraphEdgeType) {
    if !self.has_typed_edge(from, to, edge_type) {
      self.graph.add_edge(
        self.node_id_to_node_index[&from],
        self.node_id_to_node_index[&to],
        edge_type,
      );
    }
  }

  fn remove_typed_edge(&mut self, from: NodeId, to: NodeId, edge_type: BundleGraphEdgeType) {
    let (Some(from_index), Some(to_index)) = (
      self.node_id_to_node_index.get(&from),
      self.node_id_to_node_index.get(&to),
    ) else {
      return;
    };
    let edge = self
      .graph
      .edges_connecting(*from_index, *to_index)
      .find(|edge| *edge.weight() == edge_type)
      .map(|edge| edge.id());
    if let Some(edge) = edge {
      self.graph.remove_edge(edge);
    }
  }

  /// Outgoing neighbors over one edge type, in edge insertion order.
  fn typed_outgoing(&self, node: NodeId, edge_type: BundleGraphEdgeType) -> Vec<NodeId> {
    let Some(node_index) = self.node_id_to_node_index.get(&node) else {
      return Vec::new();
    };
    let mut neighbors: Vec<NodeId> = self
      .graph
      .edges_directed(*node_index, Direction::Outgoing)
      .filter(|edge| *edge.weight() == edge_type)
      .filter_map(|edge| self.graph.node_weight(edge.target()).copied())
      .collect();
    neighbors.reverse();
    neighbors
  }

  fn typed_incoming(&self, node: NodeId, edge_type: BundleGraphEdgeType) -> Vec<NodeId> {
    let Some(node_index) = self.node_id_to_node_index.get(&node) else {
      return Vec::new();
    };
    let mut neighbors: Vec<NodeId> = self
      .graph
      .edges_directed(*node_index, Direction::Incoming)
      .filter(|edge| *edge.weight() == edge_type)
      .filter_map(|edge| self.graph.node_weight(edge.source()).copied())
      .collect();
    neighbors.reverse();
    neighbors
  }

  fn asset_node_id(&self, asset_id: &str) -> Result<NodeId, BundleGraphError> {
    self
      .get_node_id_by_content_key(asset_id)
      .filter(|id| matches!(self.get_node(*id), Some(BundleGraphNode::Asset(_))))
      .ok_or_else(|| BundleGraphError::UnknownAsset {
        asset_id: asset_id.to_string(),
      })
  }

  fn bundle_node_id(&self, bundle_id: &str) -> Result<NodeId, BundleGraphError> {
    self
      .get_node_id_by_content_key(bundle_id)
      .filter(|id| matches!(self.get_node(*id), Some(BundleGraphNode::Bundle(_))))
      .ok_or_else(|| BundleGraphError::UnknownBundle {
        bundle_id: bundle_id.to_string(),
      })
  }

  fn dependency_node_id(&self, dependency_id: &str) -> Result<NodeId, BundleGraphError> {
    self
      .get_node_id_by_content_key(dependency_id)
      .filter(|id| matches!(self.get_node(*id), Some(BundleGraphNode::Dependency(_))))
      .ok_or_else(|| BundleGraphError::UnknownDependency {
        dependency_id: dependency_id.to_string(),
      })
  }

  fn group_node_id(&self, group_id: &str) -> Result<NodeId, BundleGraphError> {
    self
      .get_node_id_by_content_key(group_id)
      .filter(|id| matches!(self.get_node(*id), Some(BundleGraphNode::BundleGroup(_))))
      .ok_or_else(|| BundleGraphError::UnknownBundleGroup {
        group_id: group_id.to_string(),
      })
  }

  fn dependency_state(&self, dependency_node: NodeId) -> DependencyState {
    self
      .dependency_states
      .get(&dependency_node)
      .cloned()
      .unwrap_or(DependencyState::Resolved)
  }

  fn is_dependency_node_live(&self, dependency_node: NodeId) -> bool {
    !matches!(
      self.dependency_state(dependency_node),
      DependencyState::Deferred | DependencyState::Excluded
    )
  }

  // --- Mutation surface (bundling/optimizing phase only) ------------------

  /// Creates an empty bundle. The caller must subsequently call
  /// [`BundleGraph::add_asset_graph_to_bundle`] to give it contents.
  pub fn create_bundle(&mut self, opts: CreateBundleOptions) -> Result<Bundle, BundleGraphError> {
    let (primary_key, bundle_type, env, entry_asset_ids, is_splittable, behavior) =
      if let Some(entry_asset_id) = &opts.entry_asset_id {
        let entry_node = self.asset_node_id(entry_asset_id)?;
        let Some(BundleGraphNode::Asset(asset)) = self.get_node(entry_node) else {
          unreachable!("asset_node_id only returns asset nodes");
        };
        (
          entry_asset_id.clone(),
          opts.bundle_type.unwrap_or_else(|| asset.file_type.clone()),
          opts.env.unwrap_or_else(|| Arc::clone(&asset.env)),
          vec![entry_asset_id.clone()],
          opts.is_splittable.unwrap_or(asset.is_bundle_splittable),
          opts.bundle_behavior.or(asset.bundle_behavior),
        )
      } else {
        match (&opts.unique_key, &opts.bundle_type, &opts.env) {
          (Some(unique_key), Some(bundle_type), Some(env)) => (
            unique_key.clone(),
            bundle_type.clone(),
            Arc::clone(env),
            Vec::new(),
            opts.is_splittable.unwrap_or(false),
            opts.bundle_behavior,
          ),
          _ => return Err(BundleGraphError::InvalidBundleOptions),
        }
      };

    let id = create_bundle_id(&primary_key, &opts.target.name, &bundle_type, &env.id());
    let public_id = generate_public_id(&id, |candidate| self.bundle_public_ids.contains(candidate));
    self.bundle_public_ids.insert(public_id.clone());

    let bundle = Bundle {
      hash_reference: format!("@@HASH_REFERENCE_{}", id),
      id,
      public_id: Some(public_id),
      bundle_type,
      env,
      target: opts.target,
      entry_asset_ids,
      name: opts.name,
      is_entry: opts.is_entry,
      is_inline: behavior == Some(BundleBehavior::Inline),
      is_splittable,
      needs_stable_name: opts.needs_stable_name,
    };

    self.add_node(bundle.id.clone(), BundleGraphNode::Bundle(bundle.clone()));
    tracing::debug!(bundle_id = %bundle.id, "created bundle");
    Ok(bundle)
  }

  /// An asset is a bundle boundary when it is the entry of some other
  /// bundle; the sync closure stops there because the asset already ships.
  fn is_foreign_bundle_boundary(&self, asset_id: &str, bundle_node: NodeId) -> bool {
    let Ok(asset_node) = self.asset_node_id(asset_id) else {
      return false;
    };
    self
      .typed_incoming(asset_node, BundleGraphEdgeType::Contains)
      .into_iter()
      .any(|container| {
        if container == bundle_node {
          return false;
        }
        match self.get_node(container) {
          Some(BundleGraphNode::Bundle(bundle)) => {
            bundle.entry_asset_ids.iter().any(|id| id == asset_id)
          }
          _ => false,
        }
      })
  }

  /// The sync closure of an asset: the asset itself, every dependency node
  /// hanging off a collected asset (all priorities, so bundle-level queries
  /// see async edges), and every asset reached through synchronous,
  /// non-deferred, non-excluded dependencies. Stops at foreign bundle
  /// boundaries unless `force` is set.
  fn asset_sync_closure(
    &self,
    start_asset: NodeId,
    bundle_node: NodeId,
    force: bool,
  ) -> (Vec<NodeId>, Vec<NodeId>) {
    let mut assets = Vec::new();
    let mut dependencies = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![start_asset];

    while let Some(asset_node) = stack.pop() {
      if !visited.insert(asset_node) {
        continue;
      }
      assets.push(asset_node);

      for dependency_node in self.typed_outgoing(asset_node, BundleGraphEdgeType::Null) {
        let Some(BundleGraphNode::Dependency(dependency)) = self.get_node(dependency_node) else {
          continue;
        };
        if !self.is_dependency_node_live(dependency_node) {
          continue;
        }
        dependencies.push(dependency_node);

        if dependency.priority != Priority::Sync {
          continue;
        }

        for resolved in self.typed_outgoing(dependency_node, BundleGraphEdgeType::Null) {
          let Some(BundleGraphNode::Asset(asset)) = self.get_node(resolved) else {
            continue;
          };
          if !force && self.is_foreign_bundle_boundary(&asset.id, bundle_node) {
            continue;
          }
          stack.push(resolved);
        }
      }
    }

    (assets, dependencies)
  }

  /// Adds `asset` and its sync closure to the bundle's contains set.
  pub fn add_asset_graph_to_bundle(
    &mut self,
    asset_id: &str,
    bundle_id: &str,
    force: bool,
  ) -> Result<(), BundleGraphError> {
    let asset_node = self.asset_node_id(asset_id)?;
    let bundle_node = self.bundle_node_id(bundle_id)?;

    let (assets, dependencies) = self.asset_sync_closure(asset_node, bundle_node, force);
    for node in assets.into_iter().chain(dependencies) {
      self.add_typed_edge(bundle_node, node, BundleGraphEdgeType::Contains);
    }

    Ok(())
  }

  /// Exact inverse of [`BundleGraph::add_asset_graph_to_bundle`]: removes
  /// the contains edges for the same subgraph, leaving the underlying asset
  /// graph untouched.
  pub fn remove_asset_graph_from_bundle(
    &mut self,
    asset_id: &str,
    bundle_id: &str,
    force: bool,
  ) -> Result<(), BundleGraphError> {
    let asset_node = self.asset_node_id(asset_id)?;
    let bundle_node = self.bundle_node_id(bundle_id)?;

    let (assets, dependencies) = self.asset_sync_closure(asset_node, bundle_node, force);
    for node in assets.into_iter().chain(dependencies) {
      self.remove_typed_edge(bundle_node, node, BundleGraphEdgeType::Contains);
    }

    Ok(())
  }

  /// Creates a bundle group anchored at the dependency's resolved asset,
  /// turning the direct dependency -> asset edge into
  /// dependency -> group -> bundles -> assets.
  ///
  /// Idempotent per dependency: the first target wins and later calls return
  /// the existing group unchanged.
  pub fn create_bundle_group(
    &mut self,
    dependency_id: &str,
    target: Target,
  ) -> Result<BundleGroup, BundleGraphError> {
    let dependency_node = self.dependency_node_id(dependency_id)?;

    if let Some(existing) = self
      .typed_outgoing(dependency_node, BundleGraphEdgeType::Bundle)
      .into_iter()
      .find_map(|id| match self.get_node(id) {
        Some(BundleGraphNode::BundleGroup(group)) => Some(group.clone()),
        _ => None,
      })
    {
      return Ok(existing);
    }

    let entry_asset_id = self
      .typed_outgoing(dependency_node, BundleGraphEdgeType::Null)
      .into_iter()
      .find_map(|id| match self.get_node(id) {
        Some(BundleGraphNode::Asset(asset)) => Some(asset.id.clone()),
        _ => None,
      })
      .ok_or_else(|| BundleGraphError::GroupWithoutResolvedAsset {
        dependency_id: dependency_id.to_string(),
      })?;

    let is_entry = match self.get_node(dependency_node) {
      Some(BundleGraphNode::Dependency(dependency)) => dependency.is_entry,
      _ => false,
    };

    let group = BundleGroup {
      id: create_bundle_group_id(&target.name, &entry_asset_id),
      target,
      entry_asset_id,
    };

    let group_node = self.add_node(group.id.clone(), BundleGraphNode::BundleGroup(group.clone()));
    self.add_typed_edge(dependency_node, group_node, BundleGraphEdgeType::Bundle);
    if is_entry {
      self.add_typed_edge(self.root_node_id, group_node, BundleGraphEdgeType::Bundle);
    }

    tracing::debug!(group_id = %group.id, "created bundle group");
    Ok(group)
  }

  pub fn add_bundle_to_bundle_group(
    &mut self,
    bundle_id: &str,
    group_id: &str,
  ) -> Result<(), BundleGraphError> {
    let bundle_node = self.bundle_node_id(bundle_id)?;
    let group_node = self.group_node_id(group_id)?;
    self.add_typed_edge(group_node, bundle_node, BundleGraphEdgeType::Bundle);
    Ok(())
  }

  /// Marks that `to_bundle` is loaded by reference (e.g. by URL) from
  /// `from_bundle`, without being part of any shared load group.
  pub fn create_bundle_reference(
    &mut self,
    from_bundle_id: &str,
    to_bundle_id: &str,
  ) -> Result<(), BundleGraphError> {
    let from_node = self.bundle_node_id(from_bundle_id)?;
    let to_node = self.bundle_node_id(to_bundle_id)?;
    self.add_typed_edge(from_node, to_node, BundleGraphEdgeType::References);
    Ok(())
  }

  /// Marks that a dependency's value comes from a specific asset inside
  /// another bundle, for inlining and URL cases.
  pub fn create_asset_reference(
    &mut self,
    dependency_id: &str,
    asset_id: &str,
    bundle_id: &str,
  ) -> Result<(), BundleGraphError> {
    let dependency_node = self.dependency_node_id(dependency_id)?;
    let asset_node = self.asset_node_id(asset_id)?;
    let bundle_node = self.bundle_node_id(bundle_id)?;
    self.add_typed_edge(dependency_node, asset_node, BundleGraphEdgeType::References);
    self.add_typed_edge(dependency_node, bundle_node, BundleGraphEdgeType::References);
    Ok(())
  }

  /// Converts a dependency that currently points at a separate bundle group
  /// into a direct in-bundle reference, used when the bundler inlines what
  /// was previously a split chunk.
  ///
  /// The dependency's resolved asset must already be contained in `bundle`.
  pub fn internalize_async_dependency(
    &mut self,
    bundle_id: &str,
    dependency_id: &str,
  ) -> Result<(), BundleGraphError> {
    let bundle_node = self.bundle_node_id(bundle_id)?;
    let dependency_node = self.dependency_node_id(dependency_id)?;

    let resolved_asset_id = self
      .typed_outgoing(dependency_node, BundleGraphEdgeType::Null)
      .into_iter()
      .find_map(|id| match self.get_node(id) {
        Some(BundleGraphNode::Asset(asset)) => Some(asset.id.clone()),
        _ => None,
      })
      .ok_or_else(|| BundleGraphError::GroupWithoutResolvedAsset {
        dependency_id: dependency_id.to_string(),
      })?;

    let asset_node = self.asset_node_id(&resolved_asset_id)?;
    if !self.has_typed_edge(bundle_node, asset_node, BundleGraphEdgeType::Contains) {
      return Err(BundleGraphError::InternalizeUncontainedAsset {
        bundle_id: bundle_id.to_string(),
        dependency_id: dependency_id.to_string(),
        asset_id: resolved_asset_id,
      });
    }

    self.add_typed_edge(bundle_node, dependency_node, BundleGraphEdgeType::InternalAsync);
    Ok(())
  }

  /// Removes the group and prunes, transitively, any bundle left with no
  /// remaining parent reference.
  pub fn remove_bundle_group(&mut self, group_id: &str) -> Result<(), BundleGraphError> {
    let mut queue = vec![self.group_node_id(group_id)?];

    while let Some(group_node) = queue.pop() {
      if !self.is_live(group_node) {
        continue;
      }

      let member_bundles = self.typed_outgoing(group_node, BundleGraphEdgeType::Bundle);
      self.remove_node(group_node);

      for bundle_node in member_bundles {
        let still_grouped = self
          .typed_incoming(bundle_node, BundleGraphEdgeType::Bundle)
          .into_iter()
          .any(|id| matches!(self.get_node(id), Some(BundleGraphNode::BundleGroup(_))));
        let referenced = !self
          .typed_incoming(bundle_node, BundleGraphEdgeType::References)
          .is_empty();
        if still_grouped || referenced {
          continue;
        }

        // Child groups reachable from this bundle may lose their last
        // parent once the bundle goes away.
        let child_groups: Vec<NodeId> = self
          .typed_outgoing(bundle_node, BundleGraphEdgeType::Contains)
          .into_iter()
          .filter(|id| matches!(self.get_node(*id), Some(BundleGraphNode::Dependency(_))))
          .flat_map(|dependency_node| {
            self.typed_outgoing(dependency_node, BundleGraphEdgeType::Bundle)
          })
          .filter(|id| matches!(self.get_node(*id), Some(BundleGraphNode::BundleGroup(_))))
          .collect();

        self.remove_node(bundle_node);

        for child_group in child_groups {
          if !self.is_live(child_group) {
            continue;
          }
          // Entry groups hang off the root and are never orphaned.
          if self.has_typed_edge(self.root_node_id, child_group, BundleGraphEdgeType::Bundle) {
            continue;
          }
          let has_parent_bundle = self
            .typed_incoming(child_group, BundleGraphEdgeType::Bundle)
            .into_iter()
            .filter(|id| matches!(self.get_node(*id), Some(BundleGraphNode::Dependency(_))))
            .any(|dependency_node| {
              self
                .typed_incoming(dependency_node, BundleGraphEdgeType::Contains)
                .into_iter()
                .any(|id| matches!(self.get_node(id), Some(BundleGraphNode::Bundle(_))))
            });
          if !has_parent_bundle {
            queue.push(child_group);
          }
        }
      }
    }

    Ok(())
  }

  // --- Query surface (read-only, available on frozen graphs too) ----------

  pub fn get_bundles(&self) -> Vec<&Bundle> {
    self
      .graph
      .node_weights()
      .filter_map(|id| match self.nodes.get(*id) {
        Some(BundleGraphNode::Bundle(bundle)) => Some(bundle),
        _ => None,
      })
      .collect()
  }

  pub fn get_bundle(&self, bundle_id: &str) -> Option<&Bundle> {
    let node_id = self.get_node_id_by_content_key(bundle_id)?;
    match self.get_node(node_id)? {
      BundleGraphNode::Bundle(bundle) => Some(bundle),
      _ => None,
    }
  }

  pub fn get_bundle_groups(&self) -> Vec<&BundleGroup> {
    self
      .graph
      .node_weights()
      .filter_map(|id| match self.nodes.get(*id) {
        Some(BundleGraphNode::BundleGroup(group)) => Some(group),
        _ => None,
      })
      .collect()
  }

  pub fn get_bundle_group(&self, group_id: &str) -> Option<&BundleGroup> {
    let node_id = self.get_node_id_by_content_key(group_id)?;
    match self.get_node(node_id)? {
      BundleGraphNode::BundleGroup(group) => Some(group),
      _ => None,
    }
  }

  pub fn get_public_asset_id(&self, asset_id: &str) -> Option<&str> {
    self.public_id_by_asset_id.get(asset_id).map(|s| s.as_str())
  }

  /// The entry dependencies the build was rooted with.
  pub fn get_entry_dependencies(&self) -> Vec<&Dependency> {
    self
      .graph
      .node_weights()
      .filter_map(|id| match self.nodes.get(*id) {
        Some(BundleGraphNode::Dependency(dependency)) if dependency.is_entry => {
          Some(dependency.as_ref())
        }
        _ => None,
      })
      .collect()
  }

  /// The dependencies contained in a bundle, in insertion order. Bundlers
  /// walk these to find the async boundaries a bundle still needs loaders
  /// for.
  pub fn get_bundle_dependencies(&self, bundle: &Bundle) -> Vec<&Dependency> {
    let Some(bundle_node) = self.get_node_id_by_content_key(&bundle.id) else {
      return Vec::new();
    };
    self
      .typed_outgoing(bundle_node, BundleGraphEdgeType::Contains)
      .into_iter()
      .filter_map(|id| match self.get_node(id) {
        Some(BundleGraphNode::Dependency(dependency)) => Some(dependency.as_ref()),
        _ => None,
      })
      .collect()
  }

  /// The bundle group anchored at a dependency, if one was created.
  pub fn get_bundle_group_for_dependency(&self, dependency: &Dependency) -> Option<&BundleGroup> {
    let dependency_node = self.get_node_id_by_content_key(&dependency.id())?;
    self
      .typed_outgoing(dependency_node, BundleGraphEdgeType::Bundle)
      .into_iter()
      .find_map(|id| match self.get_node(id) {
        Some(BundleGraphNode::BundleGroup(group)) => Some(group),
        _ => None,
      })
  }

  pub fn is_dependency_internalized(&self, bundle: &Bundle, dependency: &Dependency) -> bool {
    let (Some(bundle_node), Some(dependency_node)) = (
      self.get_node_id_by_content_key(&bundle.id),
      self.get_node_id_by_content_key(&dependency.id()),
    ) else {
      return false;
    };
    self.has_typed_edge(bundle_node, dependency_node, BundleGraphEdgeType::InternalAsync)
  }

  /// Member bundles of a group, in the order they were added.
  pub fn get_bundles_in_bundle_group(&self, group: &BundleGroup) -> Vec<&Bundle> {
    let Some(group_node) = self.get_node_id_by_content_key(&group.id) else {
      return Vec::new();
    };
    self
      .typed_outgoing(group_node, BundleGraphEdgeType::Bundle)
      .into_iter()
      .filter_map(|id| match self.get_node(id) {
        Some(BundleGraphNode::Bundle(bundle)) => Some(bundle),
        _ => None,
      })
      .collect()
  }

  pub fn get_bundle_groups_containing_bundle(&self, bundle: &Bundle) -> Vec<&BundleGroup> {
    let Some(bundle_node) = self.get_node_id_by_content_key(&bundle.id) else {
      return Vec::new();
    };
    self
      .typed_incoming(bundle_node, BundleGraphEdgeType::Bundle)
      .into_iter()
      .filter_map(|id| match self.get_node(id) {
        Some(BundleGraphNode::BundleGroup(group)) => Some(group),
        _ => None,
      })
      .collect()
  }

  /// Bundles sharing a bundle group with `bundle`.
  pub fn get_sibling_bundles(&self, bundle: &Bundle) -> Vec<&Bundle> {
    let mut seen = HashSet::new();
    let mut siblings = Vec::new();
    for group in self.get_bundle_groups_containing_bundle(bundle) {
      for sibling in self.get_bundles_in_bundle_group(group) {
        if sibling.id != bundle.id && seen.insert(sibling.id.clone()) {
          siblings.push(sibling);
        }
      }
    }
    siblings
  }

  /// Bundles that load `bundle`: for every group containing it, the bundles
  /// that own the group's anchoring dependency.
  pub fn get_parent_bundles(&self, bundle: &Bundle) -> Vec<&Bundle> {
    let Some(bundle_node) = self.get_node_id_by_content_key(&bundle.id) else {
      return Vec::new();
    };
    let mut seen = HashSet::new();
    let mut parents = Vec::new();

    for group_node in self.typed_incoming(bundle_node, BundleGraphEdgeType::Bundle) {
      if !matches!(self.get_node(group_node), Some(BundleGraphNode::BundleGroup(_))) {
        continue;
      }
      for dependency_node in self.typed_incoming(group_node, BundleGraphEdgeType::Bundle) {
        if !matches!(
          self.get_node(dependency_node),
          Some(BundleGraphNode::Dependency(_))
        ) {
          continue;
        }
        for container in self.typed_incoming(dependency_node, BundleGraphEdgeType::Contains) {
          if let Some(BundleGraphNode::Bundle(parent)) = self.get_node(container) {
            if parent.id != bundle.id && seen.insert(parent.id.clone()) {
              parents.push(parent);
            }
          }
        }
      }
    }

    parents
  }

  /// Bundles loadable from `bundle`: the members of every group anchored by
  /// a non-internalized dependency contained in the bundle.
  pub fn get_child_bundles(&self, bundle: &Bundle) -> Vec<&Bundle> {
    let Some(bundle_node) = self.get_node_id_by_content_key(&bundle.id) else {
      return Vec::new();
    };
    let mut seen = HashSet::new();
    let mut children = Vec::new();

    for dependency_node in self.typed_outgoing(bundle_node, BundleGraphEdgeType::Contains) {
      if !matches!(
        self.get_node(dependency_node),
        Some(BundleGraphNode::Dependency(_))
      ) {
        continue;
      }
      if self.has_typed_edge(bundle_node, dependency_node, BundleGraphEdgeType::InternalAsync) {
        continue;
      }
      for group_node in self.typed_outgoing(dependency_node, BundleGraphEdgeType::Bundle) {
        if !matches!(self.get_node(group_node), Some(BundleGraphNode::BundleGroup(_))) {
          continue;
        }
        for child in self.typed_outgoing(group_node, BundleGraphEdgeType::Bundle) {
          if let Some(BundleGraphNode::Bundle(child_bundle)) = self.get_node(child) {
            if child_bundle.id != bundle.id && seen.insert(child_bundle.id.clone()) {
              children.push(child_bundle);
            }
          }
        }
      }
    }

    children
  }

  /// Bundles reached through explicit `References` edges, either from the
  /// bundle itself or from dependencies it contains.
  pub fn get_referenced_bundles(&self, bundle: &Bundle) -> Vec<&Bundle> {
    let Some(bundle_node) = self.get_node_id_by_content_key(&bundle.id) else {
      return Vec::new();
    };
    let mut seen = HashSet::new();
    let mut referenced = Vec::new();

    let direct = self.typed_outgoing(bundle_node, BundleGraphEdgeType::References);
    let via_dependencies = self
      .typed_outgoing(bundle_node, BundleGraphEdgeType::Contains)
      .into_iter()
      .filter(|id| matches!(self.get_node(*id), Some(BundleGraphNode::Dependency(_))))
      .flat_map(|dependency_node| {
        self.typed_outgoing(dependency_node, BundleGraphEdgeType::References)
      });

    for id in direct.into_iter().chain(via_dependencies) {
      if let Some(BundleGraphNode::Bundle(target)) = self.get_node(id) {
        if target.id != bundle.id && seen.insert(target.id.clone()) {
          referenced.push(target);
        }
      }
    }

    referenced
  }

  /// The dependencies of an asset that participate in code inclusion;
  /// deferred and excluded edges are filtered out.
  pub fn get_dependencies(&self, asset: &Asset) -> Vec<&Dependency> {
    let Some(asset_node) = self.get_node_id_by_content_key(&asset.id) else {
      return Vec::new();
    };
    self
      .typed_outgoing(asset_node, BundleGraphEdgeType::Null)
      .into_iter()
      .filter(|id| self.is_dependency_node_live(*id))
      .filter_map(|id| match self.get_node(id) {
        Some(BundleGraphNode::Dependency(dependency)) => Some(dependency.as_ref()),
        _ => None,
      })
      .collect()
  }

  /// Every dependency pointing at an asset, deferred and excluded ones
  /// included, so diagnostics can name all importers.
  pub fn get_incoming_dependencies(&self, asset: &Asset) -> Vec<&Dependency> {
    let Some(asset_node) = self.get_node_id_by_content_key(&asset.id) else {
      return Vec::new();
    };
    self
      .typed_incoming(asset_node, BundleGraphEdgeType::Null)
      .into_iter()
      .filter_map(|id| match self.get_node(id) {
        Some(BundleGraphNode::Dependency(dependency)) => Some(dependency.as_ref()),
        _ => None,
      })
      .collect()
  }

  pub fn get_resolved_asset(&self, dependency: &Dependency) -> Option<&Asset> {
    let dependency_node = self.get_node_id_by_content_key(&dependency.id())?;
    self
      .typed_outgoing(dependency_node, BundleGraphEdgeType::Null)
      .into_iter()
      .find_map(|id| match self.get_node(id) {
        Some(BundleGraphNode::Asset(asset)) => Some(asset.as_ref()),
        _ => None,
      })
  }

  pub fn get_asset_by_id(&self, asset_id: &str) -> Option<&Asset> {
    let node_id = self.get_node_id_by_content_key(asset_id)?;
    match self.get_node(node_id)? {
      BundleGraphNode::Asset(asset) => Some(asset.as_ref()),
      _ => None,
    }
  }

  pub fn is_dependency_deferred(&self, dependency: &Dependency) -> bool {
    self
      .get_node_id_by_content_key(&dependency.id())
      .is_some_and(|id| self.dependency_state(id) == DependencyState::Deferred)
  }

  pub fn find_bundles_with_asset(&self, asset: &Asset) -> Vec<&Bundle> {
    let Some(asset_node) = self.get_node_id_by_content_key(&asset.id) else {
      return Vec::new();
    };
    self
      .typed_incoming(asset_node, BundleGraphEdgeType::Contains)
      .into_iter()
      .filter_map(|id| match self.get_node(id) {
        Some(BundleGraphNode::Bundle(bundle)) => Some(bundle),
        _ => None,
      })
      .collect()
  }

  pub fn find_bundles_with_dependency(&self, dependency: &Dependency) -> Vec<&Bundle> {
    let Some(dependency_node) = self.get_node_id_by_content_key(&dependency.id()) else {
      return Vec::new();
    };
    self
      .typed_incoming(dependency_node, BundleGraphEdgeType::Contains)
      .into_iter()
      .filter_map(|id| match self.get_node(id) {
        Some(BundleGraphNode::Bundle(bundle)) => Some(bundle),
        _ => None,
      })
      .collect()
  }

  pub fn bundle_has_asset(&self, bundle: &Bundle, asset: &Asset) -> bool {
    let (Some(bundle_node), Some(asset_node)) = (
      self.get_node_id_by_content_key(&bundle.id),
      self.get_node_id_by_content_key(&asset.id),
    ) else {
      return false;
    };
    self.has_typed_edge(bundle_node, asset_node, BundleGraphEdgeType::Contains)
  }

  pub fn bundle_has_dependency(&self, bundle: &Bundle, dependency: &Dependency) -> bool {
    let (Some(bundle_node), Some(dependency_node)) = (
      self.get_node_id_by_content_key(&bundle.id),
      self.get_node_id_by_content_key(&dependency.id()),
    ) else {
      return false;
    };
    self.has_typed_edge(bundle_node, dependency_node, BundleGraphEdgeType::Contains)
  }

  pub fn has_parent_bundle_of_type(&self, bundle: &Bundle, bundle_type: &FileType) -> bool {
    self
      .get_parent_bundles(bundle)
      .iter()
      .any(|parent| parent.bundle_type == *bundle_type)
  }

  /// True when the asset is already present in an ancestor bundle on every
  /// path that loads `bundle`, so a duplicate include can be skipped.
  ///
  /// Interpretation (see DESIGN.md): for each bundle group containing
  /// `bundle`, some transitive parent bundle of the same type must contain
  /// the asset.
  pub fn is_asset_reachable_from_bundle(&self, asset: &Asset, bundle: &Bundle) -> bool {
    let groups = self.get_bundle_groups_containing_bundle(bundle);
    if groups.is_empty() {
      return false;
    }

    groups.iter().all(|_group| {
      let mut visited = HashSet::new();
      let mut stack: Vec<&Bundle> = self.get_parent_bundles(bundle);
      while let Some(parent) = stack.pop() {
        if !visited.insert(parent.id.clone()) {
          continue;
        }
        if parent.bundle_type == bundle.bundle_type && self.bundle_has_asset(parent, asset) {
          return true;
        }
        stack.extend(self.get_parent_bundles(parent));
      }
      false
    })
  }

  /// The single query higher phases use to decide whether an import becomes
  /// an inline reference or a loader call.
  pub fn resolve_external_dependency(
    &self,
    dependency: &Dependency,
    bundle: &Bundle,
  ) -> Option<ExternalDependencyResolution<'_>> {
    let dependency_node = self.get_node_id_by_content_key(&dependency.id())?;

    if !self.is_dependency_node_live(dependency_node) {
      return None;
    }

    let internalized = self
      .get_node_id_by_content_key(&bundle.id)
      .is_some_and(|bundle_node| {
        self.has_typed_edge(bundle_node, dependency_node, BundleGraphEdgeType::InternalAsync)
      });

    if !internalized {
      if let Some(group) = self
        .typed_outgoing(dependency_node, BundleGraphEdgeType::Bundle)
        .into_iter()
        .find_map(|id| match self.get_node(id) {
          Some(BundleGraphNode::BundleGroup(group)) => Some(group),
          _ => None,
        })
      {
        return Some(ExternalDependencyResolution::BundleGroup(group));
      }
    }

    self
      .get_resolved_asset(dependency)
      .map(ExternalDependencyResolution::Asset)
  }

  /// Walks the assets of a bundle from its entries, following sync and
  /// async dependencies alike but never leaving the bundle's contains set.
  pub fn traverse_assets<V, C>(&self, bundle: &Bundle, visitor: &mut V)
  where
    V: GraphVisitor<AssetId, C>,
  {
    let Some(bundle_node) = self.get_node_id_by_content_key(&bundle.id) else {
      return;
    };
    let view = BundleAssetsView {
      bundle_graph: self,
      bundle_node,
    };
    let roots: Vec<AssetId> = bundle.entry_asset_ids.clone();
    traverse(&view, roots, visitor);
  }
}

/// Scopes traversal to the assets contained in one bundle.
struct BundleAssetsView<'a> {
  bundle_graph: &'a BundleGraph,
  bundle_node: NodeId,
}

impl TraversalGraph for BundleAssetsView<'_> {
  type NodeId = AssetId;

  fn children(&self, asset_id: AssetId) -> Vec<AssetId> {
    let Some(asset_node) = self.bundle_graph.get_node_id_by_content_key(&asset_id) else {
      return Vec::new();
    };
    let mut children = Vec::new();
    for dependency_node in self
      .bundle_graph
      .typed_outgoing(asset_node, BundleGraphEdgeType::Null)
    {
      if !self.bundle_graph.is_dependency_node_live(dependency_node) {
        continue;
      }
      for resolved in self
        .bundle_graph
        .typed_outgoing(dependency_node, BundleGraphEdgeType::Null)
      {
        let Some(BundleGraphNode::Asset(asset)) = self.bundle_graph.get_node(resolved) else {
          continue;
        };
        if self.bundle_graph.has_typed_edge(
          self.bundle_node,
          resolved,
          BundleGraphEdgeType::Contains,
        ) {
          children.push(asset.id.clone());
        }
      }
    }
    children
  }
}

const BASE62_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

fn base62_encode(bytes: &[u8]) -> String {
  if bytes.is_empty() {
    return String::new();
  }

  let mut num = bytes.iter().fold(0u128, |acc, &b| acc * 256 + b as u128);
  if num == 0 {
    return "0".to_string();
  }

  let mut result = Vec::new();
  while num > 0 {
    let remainder = (num % 62) as usize;
    result.push(BASE62_ALPHABET[remainder]);
    num /= 62;
  }

  result.reverse();
  String::from_utf8(result).unwrap_or_default()
}

/// Shortens a 16-hex-char id down to the shortest unique base62 prefix of at
/// least five characters.
pub fn generate_public_id<F>(id: &str, already_exists: F) -> String
where
  F: Fn(&str) -> bool,
{
  let mut bytes = Vec::with_capacity(id.len() / 2);
  let mut i = 0;
  while i + 1 < id.len() {
    if let Ok(b) = u8::from_str_radix(&id[i..i + 2], 16) {
      bytes.push(b);
    }
    i += 2;
  }

  let encoded = base62_encode(&bytes);

  for end in 5..=encoded.len() {
    let candidate = &encoded[..end];
    if !already_exists(candidate) {
      return candidate.to_string();
    }
  }

  panic!("Original id was not unique: {}", id);
}

#[cfg(test)]
mod tests {
  use std::path::PathBuf;

  use pretty_assertions::assert_eq;

  use crate::asset_graph::DependencyResolution;
  use crate::traversal::TraversalActions;
  use crate::types::Symbol;

  use super::*;

  fn asset_id_for(file_path: &str) -> String {
    crate::hash::hash_string(file_path.to_string())
  }

  fn make_asset(file_path: &str, side_effects: bool) -> Arc<Asset> {
    Arc::new(Asset {
      id: asset_id_for(file_path),
      file_path: PathBuf::from(file_path),
      symbols: Some(vec![]),
      side_effects,
      is_bundle_splittable: true,
      ..Asset::default()
    })
  }

  fn weak_symbol(name: &str) -> Symbol {
    Symbol {
      local: name.into(),
      exported: name.into(),
      is_weak: true,
      ..Symbol::default()
    }
  }

  /// Builds the shared fixture:
  ///
  ///   entry dep ──> index.js ──sync──> a.js
  ///       index.js ──lazy──> async.js ──sync──> shared.js
  ///       index.js ──weak──> unused.js   (side-effect free, deferred)
  struct Fixture {
    bundle_graph: BundleGraph,
    entry_dependency: Arc<Dependency>,
    lazy_dependency: Arc<Dependency>,
  }

  fn build_fixture() -> Fixture {
    let mut asset_graph = AssetGraph::new();

    let entry_dependency = Dependency::entry("index.js".into(), Target::default());
    let entry_dep_node = asset_graph.add_entry_dependency(entry_dependency.clone());

    let index = asset_graph.add_asset(make_asset("index.js", true));
    asset_graph
      .resolve_dependency(entry_dep_node, DependencyResolution::Asset(index))
      .unwrap();

    let a_dep = asset_graph.add_dependency(
      index,
      Dependency::new("./a.js".into(), Arc::new(Default::default())),
    );
    let a = asset_graph.add_asset(make_asset("a.js", true));
    asset_graph
      .resolve_dependency(a_dep, DependencyResolution::Asset(a))
      .unwrap();

    let lazy_dependency = Dependency {
      priority: Priority::Lazy,
      ..Dependency::new("./async.js".into(), Arc::new(Default::default()))
    };
    let lazy_dep_node = asset_graph.add_dependency(index, lazy_dependency.clone());
    let async_asset = asset_graph.add_asset(make_asset("async.js", true));
    asset_graph
      .resolve_dependency(lazy_dep_node, DependencyResolution::Asset(async_asset))
      .unwrap();

    let shared_dep = asset_graph.add_dependency(
      async_asset,
      Dependency::new("./shared.js".into(), Arc::new(Default::default())),
    );
    let shared = asset_graph.add_asset(make_asset("shared.js", true));
    asset_graph
      .resolve_dependency(shared_dep, DependencyResolution::Asset(shared))
      .unwrap();

    // A side-effect-free target whose requested symbols never materialize.
    let unused_dep = asset_graph.add_dependency(
      index,
      Dependency {
        symbols: Some(vec![weak_symbol("unused")]),
        ..Dependency::new("./unused.js".into(), Arc::new(Default::default()))
      },
    );
    let unused = asset_graph.add_asset(make_asset("unused.js", false));
    let state = asset_graph
      .resolve_dependency(unused_dep, DependencyResolution::Asset(unused))
      .unwrap();
    assert_eq!(state, DependencyState::Deferred);

    Fixture {
      bundle_graph: BundleGraph::from_asset_graph(&asset_graph),
      entry_dependency: Arc::new(entry_dependency),
      lazy_dependency: Arc::new(lazy_dependency),
    }
  }

  fn asset<'a>(graph: &'a BundleGraph, file_path: &str) -> &'a Asset {
    graph
      .get_asset_by_id(&asset_id_for(file_path))
      .expect("fixture asset should exist")
  }

  fn entry_bundle(fixture: &mut Fixture) -> Bundle {
    let bundle = fixture
      .bundle_graph
      .create_bundle(CreateBundleOptions {
        entry_asset_id: Some(asset_id_for("index.js")),
        target: Target::default(),
        is_entry: true,
        ..CreateBundleOptions::default()
      })
      .unwrap();
    fixture
      .bundle_graph
      .add_asset_graph_to_bundle(&asset_id_for("index.js"), &bundle.id, false)
      .unwrap();
    bundle
  }

  fn async_bundle(fixture: &mut Fixture) -> Bundle {
    let bundle = fixture
      .bundle_graph
      .create_bundle(CreateBundleOptions {
        entry_asset_id: Some(asset_id_for("async.js")),
        target: Target::default(),
        ..CreateBundleOptions::default()
      })
      .unwrap();
    fixture
      .bundle_graph
      .add_asset_graph_to_bundle(&asset_id_for("async.js"), &bundle.id, false)
      .unwrap();
    bundle
  }

  #[test]
  fn create_bundle_infers_type_and_env_from_the_entry_asset() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let mut fixture = build_fixture();
    let bundle = fixture
      .bundle_graph
      .create_bundle(CreateBundleOptions {
        entry_asset_id: Some(asset_id_for("index.js")),
        target: Target::default(),
        is_entry: true,
        ..CreateBundleOptions::default()
      })
      .unwrap();

    assert_eq!(bundle.bundle_type, FileType::Js);
    assert_eq!(bundle.entry_asset_ids, vec![asset_id_for("index.js")]);
    assert_eq!(bundle.main_entry_id(), Some(&asset_id_for("index.js")));
    assert!(bundle.is_splittable);
    assert!(bundle.hash_reference.contains(&bundle.id));
    assert!(bundle.public_id.is_some());
  }

  #[test]
  fn create_bundle_without_entry_or_unique_key_is_a_usage_error() {
    let mut fixture = build_fixture();
    let result = fixture.bundle_graph.create_bundle(CreateBundleOptions {
      target: Target::default(),
      ..CreateBundleOptions::default()
    });

    assert_eq!(result.unwrap_err(), BundleGraphError::InvalidBundleOptions);
  }

  #[test]
  fn create_bundle_accepts_a_unique_key_triple() {
    let mut fixture = build_fixture();
    let bundle = fixture
      .bundle_graph
      .create_bundle(CreateBundleOptions {
        unique_key: Some("shared-chunk".into()),
        bundle_type: Some(FileType::Js),
        env: Some(Arc::new(Environment::default())),
        target: Target::default(),
        ..CreateBundleOptions::default()
      })
      .unwrap();

    assert!(bundle.entry_asset_ids.is_empty());
    assert!(!bundle.is_splittable);
  }

  #[test]
  fn add_asset_graph_to_bundle_collects_the_sync_closure_only() {
    let mut fixture = build_fixture();
    let bundle = entry_bundle(&mut fixture);
    let graph = &fixture.bundle_graph;

    assert!(graph.bundle_has_asset(&bundle, asset(graph, "index.js")));
    assert!(graph.bundle_has_asset(&bundle, asset(graph, "a.js")));
    // The async boundary and the deferred target stay out.
    assert!(!graph.bundle_has_asset(&bundle, asset(graph, "async.js")));
    assert!(!graph.bundle_has_asset(&bundle, asset(graph, "unused.js")));
    // The lazy dependency itself is contained so bundle-level queries see
    // the async edge.
    assert!(graph.bundle_has_dependency(&bundle, &fixture.lazy_dependency));
  }

  #[test]
  fn remove_asset_graph_from_bundle_is_the_exact_inverse() {
    let mut fixture = build_fixture();
    let bundle = entry_bundle(&mut fixture);

    let contained_before: Vec<String> = ["index.js", "a.js", "async.js", "shared.js", "unused.js"]
      .iter()
      .filter(|path| {
        let graph = &fixture.bundle_graph;
        graph.bundle_has_asset(&bundle, asset(graph, path))
      })
      .map(|path| path.to_string())
      .collect();
    assert_eq!(contained_before, vec!["index.js", "a.js"]);

    fixture
      .bundle_graph
      .remove_asset_graph_from_bundle(&asset_id_for("index.js"), &bundle.id, false)
      .unwrap();

    let graph = &fixture.bundle_graph;
    for path in ["index.js", "a.js", "async.js", "shared.js", "unused.js"] {
      assert!(!graph.bundle_has_asset(&bundle, asset(graph, path)));
    }
    assert!(!graph.bundle_has_dependency(&bundle, &fixture.lazy_dependency));
  }

  #[test]
  fn add_asset_graph_to_bundle_stops_at_foreign_bundle_boundaries() {
    let mut fixture = build_fixture();
    // a.js becomes the entry of its own bundle first.
    let a_bundle = fixture
      .bundle_graph
      .create_bundle(CreateBundleOptions {
        entry_asset_id: Some(asset_id_for("a.js")),
        target: Target::default(),
        ..CreateBundleOptions::default()
      })
      .unwrap();
    fixture
      .bundle_graph
      .add_asset_graph_to_bundle(&asset_id_for("a.js"), &a_bundle.id, false)
      .unwrap();

    let bundle = entry_bundle(&mut fixture);
    let graph = &fixture.bundle_graph;

    assert!(graph.bundle_has_asset(&bundle, asset(graph, "index.js")));
    assert!(!graph.bundle_has_asset(&bundle, asset(graph, "a.js")));

    // Forcing overrides the boundary.
    fixture
      .bundle_graph
      .add_asset_graph_to_bundle(&asset_id_for("index.js"), &bundle.id, true)
      .unwrap();
    let graph = &fixture.bundle_graph;
    assert!(graph.bundle_has_asset(&bundle, asset(graph, "a.js")));
  }

  #[test]
  fn create_bundle_group_requires_a_resolved_asset() {
    let mut fixture = build_fixture();

    // A dangling dependency that never resolved.
    let mut asset_graph = AssetGraph::new();
    let index = asset_graph.add_asset(make_asset("index.js", true));
    let dangling = Dependency::new("./missing.js".into(), Arc::new(Default::default()));
    asset_graph.add_dependency(index, dangling.clone());
    fixture.bundle_graph = BundleGraph::from_asset_graph(&asset_graph);

    let result = fixture
      .bundle_graph
      .create_bundle_group(&dangling.id(), Target::default());

    assert_eq!(
      result.unwrap_err(),
      BundleGraphError::GroupWithoutResolvedAsset {
        dependency_id: dangling.id(),
      }
    );
  }

  #[test]
  fn create_bundle_group_is_idempotent_per_dependency() {
    let mut fixture = build_fixture();
    let dependency_id = fixture.lazy_dependency.id();

    let first = fixture
      .bundle_graph
      .create_bundle_group(&dependency_id, Target::default())
      .unwrap();
    // The first target wins; a second call never re-targets the group.
    let second = fixture
      .bundle_graph
      .create_bundle_group(&dependency_id, Target::default())
      .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.entry_asset_id, asset_id_for("async.js"));
    assert_eq!(fixture.bundle_graph.get_bundle_groups().len(), 1);
  }

  #[test]
  fn resolve_external_dependency_returns_the_bundle_group_with_its_members() {
    let mut fixture = build_fixture();
    let parent = entry_bundle(&mut fixture);
    let child = async_bundle(&mut fixture);

    let group = fixture
      .bundle_graph
      .create_bundle_group(&fixture.lazy_dependency.id(), Target::default())
      .unwrap();
    fixture
      .bundle_graph
      .add_bundle_to_bundle_group(&child.id, &group.id)
      .unwrap();

    // Two more bundles in the same load group, e.g. split-out CSS.
    let css_bundle = fixture
      .bundle_graph
      .create_bundle(CreateBundleOptions {
        unique_key: Some("async-css".into()),
        bundle_type: Some(FileType::Css),
        env: Some(Arc::new(Environment::default())),
        target: Target::default(),
        ..CreateBundleOptions::default()
      })
      .unwrap();
    let shared_bundle = fixture
      .bundle_graph
      .create_bundle(CreateBundleOptions {
        unique_key: Some("async-shared".into()),
        bundle_type: Some(FileType::Js),
        env: Some(Arc::new(Environment::default())),
        target: Target::default(),
        ..CreateBundleOptions::default()
      })
      .unwrap();
    fixture
      .bundle_graph
      .add_bundle_to_bundle_group(&css_bundle.id, &group.id)
      .unwrap();
    fixture
      .bundle_graph
      .add_bundle_to_bundle_group(&shared_bundle.id, &group.id)
      .unwrap();

    let graph = &fixture.bundle_graph;
    let resolution = graph
      .resolve_external_dependency(&fixture.lazy_dependency, &parent)
      .expect("lazy dependency should resolve");

    let ExternalDependencyResolution::BundleGroup(resolved_group) = resolution else {
      panic!("expected a bundle group resolution");
    };
    assert_eq!(resolved_group.id, group.id);

    let member_ids: Vec<&str> = graph
      .get_bundles_in_bundle_group(resolved_group)
      .iter()
      .map(|bundle| bundle.id.as_str())
      .collect();
    assert_eq!(
      member_ids,
      vec![
        child.id.as_str(),
        css_bundle.id.as_str(),
        shared_bundle.id.as_str()
      ]
    );
  }

  #[test]
  fn resolve_external_dependency_falls_back_to_a_plain_asset() {
    let mut fixture = build_fixture();
    let parent = entry_bundle(&mut fixture);
    let graph = &fixture.bundle_graph;

    // No bundle group exists for the lazy dependency yet.
    let resolution = graph
      .resolve_external_dependency(&fixture.lazy_dependency, &parent)
      .expect("should fall back to the resolved asset");

    assert_eq!(
      resolution,
      ExternalDependencyResolution::Asset(asset(graph, "async.js"))
    );
  }

  #[test]
  fn resolve_external_dependency_skips_deferred_dependencies() {
    let mut fixture = build_fixture();
    let parent = entry_bundle(&mut fixture);
    let graph = &fixture.bundle_graph;

    let deferred = graph
      .get_incoming_dependencies(asset(graph, "unused.js"))
      .first()
      .cloned()
      .cloned()
      .expect("deferred dependency should be retrievable");

    assert!(graph.is_dependency_deferred(&deferred));
    assert!(graph.resolve_external_dependency(&deferred, &parent).is_none());
  }

  #[test]
  fn deferred_dependencies_are_hidden_from_code_inclusion_queries() {
    let fixture = build_fixture();
    let graph = &fixture.bundle_graph;

    let index = asset(graph, "index.js");
    let specifiers: Vec<&str> = graph
      .get_dependencies(index)
      .iter()
      .map(|dep| dep.specifier.as_str())
      .collect();
    assert_eq!(specifiers, vec!["./a.js", "./async.js"]);

    // Still present for diagnostics.
    let incoming = graph.get_incoming_dependencies(asset(graph, "unused.js"));
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].specifier, "./unused.js");
  }

  #[test]
  fn internalize_async_dependency_requires_the_contained_asset() {
    let mut fixture = build_fixture();
    let parent = entry_bundle(&mut fixture);

    let result = fixture
      .bundle_graph
      .internalize_async_dependency(&parent.id, &fixture.lazy_dependency.id());

    assert_eq!(
      result.unwrap_err(),
      BundleGraphError::InternalizeUncontainedAsset {
        bundle_id: parent.id.clone(),
        dependency_id: fixture.lazy_dependency.id(),
        asset_id: asset_id_for("async.js"),
      }
    );
  }

  #[test]
  fn internalizing_flips_resolution_from_group_to_asset() {
    let mut fixture = build_fixture();
    let parent = entry_bundle(&mut fixture);
    let child = async_bundle(&mut fixture);

    let group = fixture
      .bundle_graph
      .create_bundle_group(&fixture.lazy_dependency.id(), Target::default())
      .unwrap();
    fixture
      .bundle_graph
      .add_bundle_to_bundle_group(&child.id, &group.id)
      .unwrap();

    // The bundler decides to inline the split chunk: pull the subtree in,
    // then internalize the dependency.
    fixture
      .bundle_graph
      .add_asset_graph_to_bundle(&asset_id_for("async.js"), &parent.id, true)
      .unwrap();
    fixture
      .bundle_graph
      .internalize_async_dependency(&parent.id, &fixture.lazy_dependency.id())
      .unwrap();

    let graph = &fixture.bundle_graph;
    let resolution = graph
      .resolve_external_dependency(&fixture.lazy_dependency, &parent)
      .expect("internalized dependency still resolves");
    assert_eq!(
      resolution,
      ExternalDependencyResolution::Asset(asset(graph, "async.js"))
    );

    // The internalized edge no longer counts as a child bundle load.
    assert!(graph.get_child_bundles(&parent).is_empty());
  }

  #[test]
  fn parent_child_and_sibling_queries_follow_the_group_structure() {
    let mut fixture = build_fixture();
    let parent = entry_bundle(&mut fixture);
    let child = async_bundle(&mut fixture);

    let entry_group = fixture
      .bundle_graph
      .create_bundle_group(&fixture.entry_dependency.id(), Target::default())
      .unwrap();
    fixture
      .bundle_graph
      .add_bundle_to_bundle_group(&parent.id, &entry_group.id)
      .unwrap();

    let async_group = fixture
      .bundle_graph
      .create_bundle_group(&fixture.lazy_dependency.id(), Target::default())
      .unwrap();
    fixture
      .bundle_graph
      .add_bundle_to_bundle_group(&child.id, &async_group.id)
      .unwrap();

    let sibling = fixture
      .bundle_graph
      .create_bundle(CreateBundleOptions {
        unique_key: Some("async-css".into()),
        bundle_type: Some(FileType::Css),
        env: Some(Arc::new(Environment::default())),
        target: Target::default(),
        ..CreateBundleOptions::default()
      })
      .unwrap();
    fixture
      .bundle_graph
      .add_bundle_to_bundle_group(&sibling.id, &async_group.id)
      .unwrap();

    let graph = &fixture.bundle_graph;

    let children: Vec<&str> = graph
      .get_child_bundles(&parent)
      .iter()
      .map(|b| b.id.as_str())
      .collect();
    assert_eq!(children, vec![child.id.as_str(), sibling.id.as_str()]);

    let parents: Vec<&str> = graph
      .get_parent_bundles(&child)
      .iter()
      .map(|b| b.id.as_str())
      .collect();
    assert_eq!(parents, vec![parent.id.as_str()]);

    let siblings: Vec<&str> = graph
      .get_sibling_bundles(&child)
      .iter()
      .map(|b| b.id.as_str())
      .collect();
    assert_eq!(siblings, vec![sibling.id.as_str()]);

    assert!(graph.has_parent_bundle_of_type(&child, &FileType::Js));
    assert!(!graph.has_parent_bundle_of_type(&child, &FileType::Css));

    let with_asset: Vec<&str> = graph
      .find_bundles_with_asset(asset(graph, "index.js"))
      .iter()
      .map(|b| b.id.as_str())
      .collect();
    assert_eq!(with_asset, vec![parent.id.as_str()]);

    let with_dependency: Vec<&str> = graph
      .find_bundles_with_dependency(&fixture.lazy_dependency)
      .iter()
      .map(|b| b.id.as_str())
      .collect();
    assert_eq!(with_dependency, vec![parent.id.as_str()]);
  }

  #[test]
  fn bundle_references_are_explicit_edges() {
    let mut fixture = build_fixture();
    let parent = entry_bundle(&mut fixture);
    let child = async_bundle(&mut fixture);

    fixture
      .bundle_graph
      .create_bundle_reference(&parent.id, &child.id)
      .unwrap();

    let graph = &fixture.bundle_graph;
    let referenced: Vec<&str> = graph
      .get_referenced_bundles(&parent)
      .iter()
      .map(|b| b.id.as_str())
      .collect();
    assert_eq!(referenced, vec![child.id.as_str()]);
    assert!(graph.get_referenced_bundles(&child).is_empty());
  }

  #[test]
  fn remove_bundle_group_prunes_orphan_bundles_transitively() {
    let mut fixture = build_fixture();
    let parent = entry_bundle(&mut fixture);
    let child = async_bundle(&mut fixture);

    let entry_group = fixture
      .bundle_graph
      .create_bundle_group(&fixture.entry_dependency.id(), Target::default())
      .unwrap();
    fixture
      .bundle_graph
      .add_bundle_to_bundle_group(&parent.id, &entry_group.id)
      .unwrap();

    let async_group = fixture
      .bundle_graph
      .create_bundle_group(&fixture.lazy_dependency.id(), Target::default())
      .unwrap();
    fixture
      .bundle_graph
      .add_bundle_to_bundle_group(&child.id, &async_group.id)
      .unwrap();

    // Removing the entry group orphans the parent bundle, which in turn
    // orphans the async group and its bundle.
    fixture
      .bundle_graph
      .remove_bundle_group(&entry_group.id)
      .unwrap();

    let graph = &fixture.bundle_graph;
    assert!(graph.get_bundles().is_empty());
    assert!(graph.get_bundle_groups().is_empty());
  }

  #[test]
  fn remove_bundle_group_keeps_bundles_with_other_parents() {
    let mut fixture = build_fixture();
    let child = async_bundle(&mut fixture);

    let async_group = fixture
      .bundle_graph
      .create_bundle_group(&fixture.lazy_dependency.id(), Target::default())
      .unwrap();
    fixture
      .bundle_graph
      .add_bundle_to_bundle_group(&child.id, &async_group.id)
      .unwrap();

    // The same bundle also belongs to a second group.
    let other_group = fixture
      .bundle_graph
      .create_bundle_group(&fixture.entry_dependency.id(), Target::default())
      .unwrap();
    fixture
      .bundle_graph
      .add_bundle_to_bundle_group(&child.id, &other_group.id)
      .unwrap();

    fixture
      .bundle_graph
      .remove_bundle_group(&async_group.id)
      .unwrap();

    let graph = &fixture.bundle_graph;
    assert!(graph.get_bundle(&child.id).is_some());
    assert_eq!(graph.get_bundle_groups().len(), 1);
  }

  #[test]
  fn traverse_assets_reaches_every_contained_asset_from_the_entries() {
    let mut fixture = build_fixture();
    let bundle = entry_bundle(&mut fixture);
    let graph = &fixture.bundle_graph;

    let mut traversed = Vec::new();
    graph.traverse_assets(
      &bundle,
      &mut |asset_id: AssetId, _: Option<&()>, _: &mut TraversalActions| {
        traversed.push(asset_id);
      },
    );

    for path in ["index.js", "a.js", "async.js", "shared.js", "unused.js"] {
      let contained = graph.bundle_has_asset(&bundle, asset(graph, path));
      assert_eq!(
        contained,
        traversed.contains(&asset_id_for(path)),
        "containment and traversal disagree for {path}"
      );
    }
  }

  #[test]
  fn is_asset_reachable_from_bundle_sees_same_type_ancestors() {
    let mut fixture = build_fixture();
    let parent = entry_bundle(&mut fixture);
    let child = async_bundle(&mut fixture);

    let entry_group = fixture
      .bundle_graph
      .create_bundle_group(&fixture.entry_dependency.id(), Target::default())
      .unwrap();
    fixture
      .bundle_graph
      .add_bundle_to_bundle_group(&parent.id, &entry_group.id)
      .unwrap();

    let async_group = fixture
      .bundle_graph
      .create_bundle_group(&fixture.lazy_dependency.id(), Target::default())
      .unwrap();
    fixture
      .bundle_graph
      .add_bundle_to_bundle_group(&child.id, &async_group.id)
      .unwrap();

    let graph = &fixture.bundle_graph;
    // a.js ships in the parent bundle, so the child need not duplicate it.
    assert!(graph.is_asset_reachable_from_bundle(asset(graph, "a.js"), &child));
    // shared.js only exists in the child itself.
    assert!(!graph.is_asset_reachable_from_bundle(asset(graph, "shared.js"), &child));
    // The entry bundle has no parents at all.
    assert!(!graph.is_asset_reachable_from_bundle(asset(graph, "a.js"), &parent));
  }
}
