use std::collections::HashSet;

use serde::Deserialize;
use serde::Serialize;

use crate::types::{Asset, AssetId, Bundle, Dependency};

use super::bundle_graph::BundleGraph;

const CHAR_STAR: &str = "*";

/// The binding a symbol resolves to.
///
/// A tri-state on purpose: "found but statically unknowable" (bailout) and
/// "name does not exist" (not found) are different outcomes that callers
/// branch on, and neither is an error.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolvedSymbol {
  /// Statically bound to this local name in the resolved asset
  Local(String),
  /// The resolved asset's export table bailed out; the caller must emit a
  /// runtime property lookup instead of a static binding
  Bailout,
  /// The name does not exist, the resolution crossed the bundle boundary,
  /// or a re-export cycle made it indeterminate
  NotFound,
}

/// The outcome of [`BundleGraph::resolve_symbol`]: the asset that ultimately
/// produces the value, the export name it was reached by, and the binding.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolResolution {
  pub asset_id: AssetId,
  pub export_symbol: String,
  pub symbol: ResolvedSymbol,
}

/// An entry of [`BundleGraph::get_exported_symbols`]: the external-facing
/// export name (which may differ from the source's internal name when
/// re-exported under an alias) and where it resolves to.
#[derive(Clone, Debug, PartialEq)]
pub struct ExportedSymbol {
  pub exported: String,
  pub resolution: SymbolResolution,
}

impl BundleGraph {
  /// Resolves an exported name to the asset and binding that ultimately
  /// produce the value, transitively following re-exports and import
  /// placeholders.
  ///
  /// Resolution stops early when it would leave `boundary`: the returned
  /// asset is then the bundle-crossing reference point and the binding is
  /// [`ResolvedSymbol::NotFound`], telling the caller to go through that
  /// bundle's runtime export surface instead. Re-export cycles terminate
  /// with the same outcome.
  pub fn resolve_symbol(
    &self,
    asset: &Asset,
    symbol: &str,
    boundary: Option<&Bundle>,
  ) -> SymbolResolution {
    let mut visited = HashSet::new();
    self.resolve_symbol_inner(asset, symbol, boundary, &mut visited)
  }

  fn resolve_symbol_inner(
    &self,
    asset: &Asset,
    symbol: &str,
    boundary: Option<&Bundle>,
    visited: &mut HashSet<(AssetId, String)>,
  ) -> SymbolResolution {
    let mut asset: &Asset = asset;
    let mut symbol: String = symbol.to_string();

    loop {
      if !visited.insert((asset.id.clone(), symbol.clone())) {
        // Re-export cycle: indeterminate, never an infinite loop.
        return not_found(asset, symbol);
      }

      // The namespace object only exists at runtime.
      if symbol == CHAR_STAR {
        return SymbolResolution {
          asset_id: asset.id.clone(),
          export_symbol: symbol,
          symbol: ResolvedSymbol::Bailout,
        };
      }

      let Some(symbols) = &asset.symbols else {
        // Export table bailout: any export may alias any local.
        return SymbolResolution {
          asset_id: asset.id.clone(),
          export_symbol: symbol,
          symbol: ResolvedSymbol::Bailout,
        };
      };

      let entry = symbols.iter().find(|s| s.exported == symbol);

      if let Some(entry) = entry {
        if !entry.is_weak {
          // A value defined inside the asset itself; resolution terminates.
          return SymbolResolution {
            asset_id: asset.id.clone(),
            export_symbol: symbol,
            symbol: ResolvedSymbol::Local(entry.local.clone()),
          };
        }
      }

      // Either a weak export or a bare placeholder: the local name should
      // match the placeholder of one of the asset's own dependencies.
      let placeholder = entry.map_or_else(|| symbol.clone(), |e| e.local.clone());

      let owner = self.get_dependencies(asset).into_iter().find_map(|dep| {
        dep.symbols.as_ref().and_then(|dep_symbols| {
          dep_symbols
            .iter()
            .find(|s| s.local == placeholder)
            .map(|s| (dep, s.exported.clone()))
        })
      });

      match owner {
        Some((dependency, next_symbol)) => {
          let Some(target) = self.get_resolved_asset(dependency) else {
            // Deferred or excluded target: nothing to bind to.
            return not_found(asset, symbol);
          };
          if let Some(bundle) = boundary {
            if !self.bundle_has_asset(bundle, target) {
              // Bundle-crossing point: the caller must reference this asset
              // through the other bundle's export surface at runtime.
              return not_found(asset, symbol);
            }
          }
          asset = target;
          symbol = next_symbol;
        }
        None if entry.is_some() => {
          // Weak export whose owning dependency is gone.
          return not_found(asset, symbol);
        }
        None => {
          // Not in the export table: the name may come in through an
          // `export *` wildcard.
          return self.resolve_through_wildcards(asset, symbol, boundary, visited);
        }
      }
    }
  }

  /// Searches `export *` dependencies for a name that is not in the export
  /// table. The first match in dependency order wins.
  fn resolve_through_wildcards(
    &self,
    asset: &Asset,
    symbol: String,
    boundary: Option<&Bundle>,
    visited: &mut HashSet<(AssetId, String)>,
  ) -> SymbolResolution {
    // `export *` never forwards the default export.
    if symbol != "default" {
      for dependency in self.wildcard_reexport_dependencies(asset) {
        let Some(target) = self.get_resolved_asset(dependency) else {
          continue;
        };
        if let Some(bundle) = boundary {
          if !self.bundle_has_asset(bundle, target) {
            continue;
          }
        }
        let result = self.resolve_symbol_inner(target, &symbol, boundary, visited);
        if result.symbol != ResolvedSymbol::NotFound {
          return result;
        }
      }
    }

    not_found(asset, symbol)
  }

  fn wildcard_reexport_dependencies(&self, asset: &Asset) -> Vec<&Dependency> {
    self
      .get_dependencies(asset)
      .into_iter()
      .filter(|dep| {
        dep.symbols.as_ref().is_some_and(|symbols| {
          symbols
            .iter()
            .any(|s| s.is_weak && s.local == CHAR_STAR && s.exported == CHAR_STAR)
        })
      })
      .collect()
  }

  /// Resolves every name an asset exports, including names flowing in
  /// through `export *` wildcards, each annotated with the external-facing
  /// export name.
  ///
  /// An asset whose export table bailed out contributes nothing: its
  /// surface cannot be enumerated statically and consumers must use the
  /// namespace object.
  pub fn get_exported_symbols(
    &self,
    asset: &Asset,
    boundary: Option<&Bundle>,
  ) -> Vec<ExportedSymbol> {
    let mut seen_assets = HashSet::new();
    let mut seen_names = HashSet::new();
    let mut exported = Vec::new();
    self.collect_exported_symbols(
      asset,
      boundary,
      true,
      &mut seen_assets,
      &mut seen_names,
      &mut exported,
    );
    exported
  }

  fn collect_exported_symbols<'a>(
    &'a self,
    asset: &'a Asset,
    boundary: Option<&Bundle>,
    include_default: bool,
    seen_assets: &mut HashSet<AssetId>,
    seen_names: &mut HashSet<String>,
    exported: &mut Vec<ExportedSymbol>,
  ) {
    if !seen_assets.insert(asset.id.clone()) {
      return;
    }
    let Some(symbols) = &asset.symbols else {
      return;
    };

    for symbol in symbols {
      if symbol.exported == CHAR_STAR {
        continue;
      }
      if !include_default && symbol.exported == "default" {
        continue;
      }
      if !seen_names.insert(symbol.exported.clone()) {
        continue;
      }
      exported.push(ExportedSymbol {
        exported: symbol.exported.clone(),
        resolution: self.resolve_symbol(asset, &symbol.exported, boundary),
      });
    }

    for dependency in self.wildcard_reexport_dependencies(asset) {
      let Some(target) = self.get_resolved_asset(dependency) else {
        continue;
      };
      if let Some(bundle) = boundary {
        if !self.bundle_has_asset(bundle, target) {
          continue;
        }
      }
      self.collect_exported_symbols(target, boundary, false, seen_assets, seen_names, exported);
    }
  }
}

fn not_found(asset: &Asset, symbol: String) -> SymbolResolution {
  SymbolResolution {
    asset_id: asset.id.clone(),
    export_symbol: symbol,
    symbol: ResolvedSymbol::NotFound,
  }
}
