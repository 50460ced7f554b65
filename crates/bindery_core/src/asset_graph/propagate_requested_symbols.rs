use std::collections::HashSet;
use std::sync::Arc;

use crate::types::Asset;
use crate::types::Dependency;
use crate::types::Symbol;

use super::asset_graph::AssetGraph;
use super::asset_graph::DependencyState;
use super::asset_graph::NodeId;

const CHAR_STAR: &str = "*";

/// Propagates the requested symbols from an incoming dependency to an asset,
/// and forwards those symbols through re-exported dependencies if needed.
///
/// `on_undeferred` fires for dependencies that now carry requested symbols
/// but have no live target in this build: unresolved ones awaiting a
/// transform, and deferred ones whose usage was just discovered. Acting on
/// it (transforming, rebuilding) belongs to the incremental-build
/// collaborator; the states in this graph stay monotone.
pub fn propagate_requested_symbols<F>(
  asset_graph: &mut AssetGraph,
  initial_asset_node: NodeId,
  initial_dependency_node: NodeId,
  on_undeferred: &mut F,
) where
  F: FnMut(NodeId, Arc<Dependency>),
{
  let mut next = vec![(initial_asset_node, initial_dependency_node)];

  while let Some((asset_node_id, dependency_node_id)) = next.pop() {
    let mut re_exported_locals = HashSet::<String>::default();
    let mut unmatched_wildcards = HashSet::<String>::default();
    let mut newly_requested = HashSet::<String>::default();

    let dependency_node = asset_graph
      .get_dependency_node(dependency_node_id)
      .expect("propagation walks dependency nodes");
    let asset_node = asset_graph
      .get_asset_node(asset_node_id)
      .expect("propagation walks asset nodes");

    if dependency_node.requested_symbols.contains(CHAR_STAR) {
      // The `*` namespace was requested, so every exported symbol of the
      // asset is in use.
      if let Some(symbols) = &asset_node.asset.symbols {
        for sym in symbols {
          if asset_node.requested_symbols.contains(&sym.exported) {
            continue;
          }
          newly_requested.insert(sym.exported.clone());
          if !sym.is_weak {
            continue;
          }
          re_exported_locals.insert(sym.local.clone());
        }
      }

      // Forward the full namespace through every `export *` dependency.
      unmatched_wildcards.insert(CHAR_STAR.to_string());
    } else {
      for sym in dependency_node.requested_symbols.iter() {
        if asset_node.requested_symbols.contains(sym) {
          continue;
        }
        newly_requested.insert(sym.clone());

        let Some(asset_symbol) = get_symbol_by_exported_name(&asset_node.asset, sym) else {
          // The symbol is not in the export table, so it can only come from
          // one of the `export *` wildcards. We don't know which one, so it
          // is forwarded to all of them.
          unmatched_wildcards.insert(sym.clone());
          continue;
        };

        if !asset_symbol.is_weak {
          continue;
        }

        re_exported_locals.insert(asset_symbol.local.clone());
      }
    }

    asset_graph
      .get_asset_node_mut(asset_node_id)
      .expect("checked above")
      .requested_symbols
      .extend(newly_requested);

    for nested_dependency_id in asset_graph.get_outgoing_dependencies(asset_node_id) {
      let mut updated = false;

      {
        let nested = asset_graph
          .get_dependency_node_mut(nested_dependency_id)
          .expect("outgoing dependencies are dependency nodes");
        let requested_symbols = &mut nested.requested_symbols;

        if let Some(symbols) = &nested.dependency.symbols {
          for sym in symbols {
            if sym.is_weak {
              // A re-export. Wildcards receive every unmatched symbol,
              // named re-exports match on the local placeholder.
              if sym.local == CHAR_STAR {
                for wildcard in &unmatched_wildcards {
                  if requested_symbols.insert(wildcard.clone()) {
                    updated = true;
                  }
                }
              } else if re_exported_locals.contains(&sym.local)
                && requested_symbols.insert(sym.exported.clone())
              {
                updated = true;
              }
            } else if requested_symbols.insert(sym.exported.clone()) {
              // A normal import site.
              updated = true;
            }
          }
        }
      }

      let nested = asset_graph
        .get_dependency_node(nested_dependency_id)
        .expect("checked above");
      let state = nested.state.clone();
      let dependency = Arc::clone(&nested.dependency);

      if !updated && state != DependencyState::New {
        continue;
      }

      match asset_graph.get_resolved_asset(nested_dependency_id) {
        None => {
          on_undeferred(nested_dependency_id, dependency);
        }
        Some(_) if state == DependencyState::Deferred => {
          // Usage appeared after the deferral decision. The decision stays
          // (it is stable for this build); the rebuild picks the edge up.
          if updated {
            on_undeferred(nested_dependency_id, dependency);
          }
        }
        Some(resolved_asset_id) => {
          if resolved_asset_id != asset_node_id {
            next.push((resolved_asset_id, nested_dependency_id));
          }
        }
      }
    }
  }
}

fn get_symbol_by_exported_name<'a>(asset: &'a Asset, sym: &str) -> Option<&'a Symbol> {
  asset
    .symbols
    .as_ref()
    .and_then(|symbols| symbols.iter().find(|s| s.exported == *sym))
}
