//! The default bundling algorithm: one bundle per entry, one bundle per
//! async boundary, grouped so that everything an entry or dynamic import
//! needs loads together.

use anyhow::Context;
use async_trait::async_trait;
use tracing::debug;

use bindery_core::bundle_graph::{BundleGraph, CreateBundleOptions};
use bindery_core::plugin::BundlerPlugin;
use bindery_core::types::{Bundle, Dependency};

/// Walks the asset graph from its entries, cutting a new bundle at every
/// parallel/lazy dependency and wiring the resulting load groups.
///
/// `optimize` internalizes async dependencies whose target already ships in
/// the requesting bundle and drops the load groups that become unreachable.
#[derive(Debug, Default)]
pub struct DefaultBundler {}

#[async_trait]
impl BundlerPlugin for DefaultBundler {
  async fn bundle(&self, bundle_graph: &mut BundleGraph) -> Result<(), anyhow::Error> {
    create_entry_bundles(bundle_graph)
  }

  async fn optimize(&self, bundle_graph: &mut BundleGraph) -> Result<(), anyhow::Error> {
    internalize_contained_async_dependencies(bundle_graph)
  }
}

fn create_entry_bundles(bundle_graph: &mut BundleGraph) -> anyhow::Result<()> {
  let entries: Vec<Dependency> = bundle_graph
    .get_entry_dependencies()
    .into_iter()
    .cloned()
    .collect();

  let mut queue: Vec<Bundle> = Vec::new();

  for entry_dependency in entries {
    let target = entry_dependency
      .target
      .as_deref()
      .cloned()
      .unwrap_or_default();

    let entry_asset_id = bundle_graph
      .get_resolved_asset(&entry_dependency)
      .map(|asset| asset.id.clone())
      .with_context(|| {
        format!(
          "Entry dependency {} did not resolve to an asset",
          entry_dependency.specifier
        )
      })?;

    let group = bundle_graph.create_bundle_group(&entry_dependency.id(), target.clone())?;
    let bundle = bundle_graph.create_bundle(CreateBundleOptions {
      entry_asset_id: Some(entry_asset_id.clone()),
      target,
      is_entry: true,
      needs_stable_name: entry_dependency.needs_stable_name,
      ..CreateBundleOptions::default()
    })?;
    bundle_graph.add_bundle_to_bundle_group(&bundle.id, &group.id)?;
    bundle_graph.add_asset_graph_to_bundle(&entry_asset_id, &bundle.id, false)?;

    debug!(bundle_id = %bundle.id, entry = %entry_dependency.specifier, "created entry bundle");
    queue.push(bundle);
  }

  // Walk outward from the entry bundles, cutting one bundle per async
  // boundary. Groups are idempotent per dependency, so shared boundaries
  // are not duplicated.
  while let Some(bundle) = queue.pop() {
    let boundaries: Vec<Dependency> = bundle_graph
      .get_bundle_dependencies(&bundle)
      .into_iter()
      .filter(|dependency| dependency.priority.is_bundle_boundary())
      .cloned()
      .collect();

    for dependency in boundaries {
      let Some(resolved_asset_id) = bundle_graph
        .get_resolved_asset(&dependency)
        .map(|asset| asset.id.clone())
      else {
        continue;
      };

      let group = bundle_graph.create_bundle_group(&dependency.id(), bundle.target.clone())?;

      let already_bundled = bundle_graph
        .get_bundles_in_bundle_group(&group)
        .iter()
        .any(|member| member.main_entry_id() == Some(&resolved_asset_id));
      if already_bundled {
        continue;
      }

      let child = bundle_graph.create_bundle(CreateBundleOptions {
        entry_asset_id: Some(resolved_asset_id.clone()),
        target: bundle.target.clone(),
        needs_stable_name: dependency.needs_stable_name,
        ..CreateBundleOptions::default()
      })?;
      bundle_graph.add_bundle_to_bundle_group(&child.id, &group.id)?;
      bundle_graph.add_asset_graph_to_bundle(&resolved_asset_id, &child.id, false)?;

      debug!(
        bundle_id = %child.id,
        boundary = %dependency.specifier,
        "created async bundle"
      );
      queue.push(child);
    }
  }

  Ok(())
}

fn internalize_contained_async_dependencies(bundle_graph: &mut BundleGraph) -> anyhow::Result<()> {
  let bundles: Vec<Bundle> = bundle_graph.get_bundles().into_iter().cloned().collect();

  for bundle in &bundles {
    let candidates: Vec<Dependency> = bundle_graph
      .get_bundle_dependencies(bundle)
      .into_iter()
      .filter(|dependency| dependency.priority.is_bundle_boundary())
      .cloned()
      .collect();

    for dependency in candidates {
      let target_contained = bundle_graph
        .get_resolved_asset(&dependency)
        .is_some_and(|asset| bundle_graph.bundle_has_asset(bundle, asset));
      if !target_contained {
        continue;
      }

      bundle_graph.internalize_async_dependency(&bundle.id, &dependency.id())?;
      debug!(
        bundle_id = %bundle.id,
        dependency = %dependency.specifier,
        "internalized async dependency"
      );

      // The group becomes unreachable once every bundle that owns the
      // dependency has internalized it.
      let unreachable_group = bundle_graph
        .get_bundle_group_for_dependency(&dependency)
        .map(|group| group.id.clone())
        .filter(|_| {
          bundle_graph
            .find_bundles_with_dependency(&dependency)
            .iter()
            .all(|owner| bundle_graph.is_dependency_internalized(owner, &dependency))
        });

      if let Some(group_id) = unreachable_group {
        bundle_graph.remove_bundle_group(&group_id)?;
        debug!(group_id = %group_id, "removed internalized bundle group");
      }
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use std::path::PathBuf;
  use std::sync::Arc;

  use pretty_assertions::assert_eq;

  use bindery_core::asset_graph::{AssetGraph, DependencyResolution, NodeId};
  use bindery_core::bundle_graph::ExternalDependencyResolution;
  use bindery_core::types::{Asset, Dependency, Priority, Symbol, Target};

  use super::*;

  fn asset_id_for(file_path: &str) -> String {
    bindery_core::hash::hash_string(file_path.to_string())
  }

  fn add_asset(graph: &mut AssetGraph, file_path: &str, side_effects: bool) -> NodeId {
    graph.add_asset(Arc::new(Asset {
      id: asset_id_for(file_path),
      file_path: PathBuf::from(file_path),
      symbols: Some(vec![]),
      side_effects,
      ..Asset::default()
    }))
  }

  fn add_resolved_dependency(
    graph: &mut AssetGraph,
    from: NodeId,
    to: NodeId,
    specifier: &str,
    priority: Priority,
  ) -> Dependency {
    let source_asset_id = graph.get_asset_node(from).unwrap().asset.id.clone();
    let dependency = Dependency {
      priority,
      source_asset_id: Some(source_asset_id),
      ..Dependency::new(specifier.into(), Arc::new(Default::default()))
    };
    let dependency_node = graph.add_dependency(from, dependency.clone());
    graph
      .resolve_dependency(dependency_node, DependencyResolution::Asset(to))
      .unwrap();
    dependency
  }

  /// Fixture:
  ///
  ///   index.js ──sync──> a.js
  ///   index.js ──lazy──> async.js ──sync──> shared.js
  ///   index.js ──weak──> unused.js   (side-effect free, deferred)
  fn build_bundle_graph() -> (BundleGraph, Dependency) {
    let mut asset_graph = AssetGraph::new();

    let entry_dep_node =
      asset_graph.add_entry_dependency(Dependency::entry("index.js".into(), Target::default()));
    let index = add_asset(&mut asset_graph, "index.js", true);
    asset_graph
      .resolve_dependency(entry_dep_node, DependencyResolution::Asset(index))
      .unwrap();

    let a = add_asset(&mut asset_graph, "a.js", true);
    add_resolved_dependency(&mut asset_graph, index, a, "./a.js", Priority::Sync);

    let async_asset = add_asset(&mut asset_graph, "async.js", true);
    let lazy_dependency = add_resolved_dependency(
      &mut asset_graph,
      index,
      async_asset,
      "./async.js",
      Priority::Lazy,
    );

    let shared = add_asset(&mut asset_graph, "shared.js", true);
    add_resolved_dependency(
      &mut asset_graph,
      async_asset,
      shared,
      "./shared.js",
      Priority::Sync,
    );

    // A side-effect-free re-export target nobody uses: deferred, and so
    // invisible to bundling.
    let unused = add_asset(&mut asset_graph, "unused.js", false);
    let unused_dep_node = asset_graph.add_dependency(
      index,
      Dependency {
        symbols: Some(vec![Symbol {
          local: "unused".into(),
          exported: "unused".into(),
          is_weak: true,
          ..Symbol::default()
        }]),
        ..Dependency::new("./unused.js".into(), Arc::new(Default::default()))
      },
    );
    asset_graph
      .resolve_dependency(unused_dep_node, DependencyResolution::Asset(unused))
      .unwrap();

    (BundleGraph::from_asset_graph(&asset_graph), lazy_dependency)
  }

  fn find_bundle_with_entry<'a>(bundle_graph: &'a BundleGraph, file_path: &str) -> &'a Bundle {
    let entry_id = asset_id_for(file_path);
    bundle_graph
      .get_bundles()
      .into_iter()
      .find(|bundle| bundle.main_entry_id() == Some(&entry_id))
      .unwrap_or_else(|| panic!("no bundle with entry {file_path}"))
  }

  #[tokio::test]
  async fn bundles_entries_and_async_boundaries_separately() {
    let (mut bundle_graph, lazy_dependency) = build_bundle_graph();

    DefaultBundler::default()
      .bundle(&mut bundle_graph)
      .await
      .unwrap();

    // One bundle per entry, one per async boundary.
    assert_eq!(bundle_graph.get_bundles().len(), 2);
    assert_eq!(bundle_graph.get_bundle_groups().len(), 2);

    let entry_bundle = find_bundle_with_entry(&bundle_graph, "index.js");
    let async_bundle = find_bundle_with_entry(&bundle_graph, "async.js");

    assert!(entry_bundle.is_entry);
    assert!(!async_bundle.is_entry);

    let index = bundle_graph.get_asset_by_id(&asset_id_for("index.js")).unwrap();
    let a = bundle_graph.get_asset_by_id(&asset_id_for("a.js")).unwrap();
    let shared = bundle_graph
      .get_asset_by_id(&asset_id_for("shared.js"))
      .unwrap();
    let unused = bundle_graph
      .get_asset_by_id(&asset_id_for("unused.js"))
      .unwrap();

    assert!(bundle_graph.bundle_has_asset(entry_bundle, index));
    assert!(bundle_graph.bundle_has_asset(entry_bundle, a));
    assert!(bundle_graph.bundle_has_asset(async_bundle, shared));
    // The deferred target ships nowhere.
    assert!(!bundle_graph.bundle_has_asset(entry_bundle, unused));
    assert!(!bundle_graph.bundle_has_asset(async_bundle, unused));

    // The async boundary resolves to its load group from the parent bundle.
    let resolution = bundle_graph
      .resolve_external_dependency(&lazy_dependency, entry_bundle)
      .expect("lazy dependency should resolve");
    let ExternalDependencyResolution::BundleGroup(group) = resolution else {
      panic!("expected a bundle group resolution");
    };
    let members: Vec<&str> = bundle_graph
      .get_bundles_in_bundle_group(group)
      .iter()
      .map(|member| member.id.as_str())
      .collect();
    assert_eq!(members, vec![async_bundle.id.as_str()]);

    let children: Vec<&str> = bundle_graph
      .get_child_bundles(entry_bundle)
      .iter()
      .map(|child| child.id.as_str())
      .collect();
    assert_eq!(children, vec![async_bundle.id.as_str()]);
  }

  #[tokio::test]
  async fn optimize_internalizes_async_targets_that_already_ship() {
    let mut asset_graph = AssetGraph::new();

    // index.js both statically and dynamically imports widget.js: the
    // dynamic import can be served from the entry bundle itself.
    //
    //   index.js ──sync──> widget.js
    //   index.js ──lazy──> widget.js
    let entry_dep_node =
      asset_graph.add_entry_dependency(Dependency::entry("index.js".into(), Target::default()));
    let index = add_asset(&mut asset_graph, "index.js", true);
    asset_graph
      .resolve_dependency(entry_dep_node, DependencyResolution::Asset(index))
      .unwrap();

    let widget = add_asset(&mut asset_graph, "widget.js", true);
    add_resolved_dependency(&mut asset_graph, index, widget, "./widget.js", Priority::Sync);
    let lazy_dependency = add_resolved_dependency(
      &mut asset_graph,
      index,
      widget,
      "./widget.js",
      Priority::Lazy,
    );

    let mut bundle_graph = BundleGraph::from_asset_graph(&asset_graph);
    let bundler = DefaultBundler::default();
    bundler.bundle(&mut bundle_graph).await.unwrap();

    // Bundling alone still cuts a group at the boundary.
    assert_eq!(bundle_graph.get_bundle_groups().len(), 2);

    bundler.optimize(&mut bundle_graph).await.unwrap();

    let entry_bundle = find_bundle_with_entry(&bundle_graph, "index.js");
    assert!(bundle_graph.is_dependency_internalized(entry_bundle, &lazy_dependency));

    // The widget group is unreachable now and was pruned along with its
    // orphaned bundle.
    assert_eq!(bundle_graph.get_bundle_groups().len(), 1);
    assert_eq!(bundle_graph.get_bundles().len(), 1);

    let widget = bundle_graph
      .get_asset_by_id(&asset_id_for("widget.js"))
      .unwrap();
    let resolution = bundle_graph
      .resolve_external_dependency(&lazy_dependency, entry_bundle)
      .expect("internalized dependency resolves in place");
    assert_eq!(resolution, ExternalDependencyResolution::Asset(widget));
  }

  #[tokio::test]
  async fn shared_async_boundaries_reuse_one_group() {
    let mut asset_graph = AssetGraph::new();

    //   one.js ──lazy──> common.js <──lazy── two.js
    let entry_one =
      asset_graph.add_entry_dependency(Dependency::entry("one.js".into(), Target::default()));
    let one = add_asset(&mut asset_graph, "one.js", true);
    asset_graph
      .resolve_dependency(entry_one, DependencyResolution::Asset(one))
      .unwrap();

    let entry_two =
      asset_graph.add_entry_dependency(Dependency::entry("two.js".into(), Target::default()));
    let two = add_asset(&mut asset_graph, "two.js", true);
    asset_graph
      .resolve_dependency(entry_two, DependencyResolution::Asset(two))
      .unwrap();

    let common = add_asset(&mut asset_graph, "common.js", true);
    add_resolved_dependency(&mut asset_graph, one, common, "./common.js", Priority::Lazy);
    add_resolved_dependency(&mut asset_graph, two, common, "./common.js", Priority::Lazy);

    let mut bundle_graph = BundleGraph::from_asset_graph(&asset_graph);
    DefaultBundler::default()
      .bundle(&mut bundle_graph)
      .await
      .unwrap();

    // Two entry bundles plus a single shared async bundle.
    assert_eq!(bundle_graph.get_bundles().len(), 3);

    let common_bundle = find_bundle_with_entry(&bundle_graph, "common.js");
    let parents: Vec<&str> = bundle_graph
      .get_parent_bundles(common_bundle)
      .iter()
      .map(|parent| parent.id.as_str())
      .collect();
    assert_eq!(parents.len(), 2);
  }
}
