use std::hash::Hash;
use std::hash::Hasher;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use serde_repr::Deserialize_repr;
use serde_repr::Serialize_repr;

use crate::hash::IdentifierHasher;
use crate::types::AssetId;

use super::environment::Environment;
use super::json::JSONObject;
use super::source::SourceLocation;
use super::symbol::Symbol;
use super::target::Target;

pub fn create_dependency_id(
  source_asset_id: Option<&AssetId>,
  specifier: &str,
  environment_id: &str,
  target: Option<&Target>,
  pipeline: Option<&str>,
  specifier_type: &SpecifierType,
  priority: &Priority,
) -> String {
  let mut hasher = IdentifierHasher::new();

  source_asset_id.hash(&mut hasher);
  specifier.hash(&mut hasher);
  environment_id.hash(&mut hasher);
  target.hash(&mut hasher);
  pipeline.hash(&mut hasher);
  specifier_type.hash(&mut hasher);
  priority.hash(&mut hasher);

  format!("{:016x}", hasher.finish())
}

/// A dependency denotes a connection between two assets
#[derive(PartialEq, Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
  /// The environment of the dependency, merged with the importer's
  pub env: Arc<Environment>,

  /// The location within the source file where the dependency was found
  #[serde(default)]
  pub loc: Option<SourceLocation>,

  /// Plugin-specific metadata for the dependency
  #[serde(default)]
  pub meta: JSONObject,

  /// The named pipeline the resolved file should be compiled with
  #[serde(default)]
  pub pipeline: Option<String>,

  /// Determines when the dependency should be loaded
  pub priority: Priority,

  /// The id of the asset with this dependency
  pub source_asset_id: Option<AssetId>,

  /// The file path of the asset with this dependency
  pub source_path: Option<PathBuf>,

  /// The import or export specifier that connects two assets together
  pub specifier: String,

  /// How the specifier should be interpreted
  pub specifier_type: SpecifierType,

  /// The symbols the importer requests from the target
  ///
  /// `exported` is the name expected from the target, `local` the
  /// importer-side placeholder. `None` means the import sites could not be
  /// statically enumerated.
  #[serde(default)]
  pub symbols: Option<Vec<Symbol>>,

  /// The target associated with an entry, if any
  #[serde(default)]
  pub target: Option<Box<Target>>,

  /// Whether the dependency is an entry
  pub is_entry: bool,

  /// Whether the dependency is optional
  ///
  /// If an optional dependency cannot be resolved, it will not fail the
  /// build; the missing edge is silently omitted and the importer fails at
  /// runtime instead.
  pub is_optional: bool,

  /// Indicates that the name should be stable over time, even when the
  /// content of the bundle changes
  pub needs_stable_name: bool,

  /// Whether this dependency object corresponds to an ESM import/export
  /// statement or to a dynamic import expression
  pub is_esm: bool,
}

impl Dependency {
  pub fn id(&self) -> String {
    create_dependency_id(
      self.source_asset_id.as_ref(),
      &self.specifier,
      &self.env.id(),
      self.target.as_deref(),
      self.pipeline.as_deref(),
      &self.specifier_type,
      &self.priority,
    )
  }

  pub fn entry(entry: String, target: Target) -> Dependency {
    let is_library = target.env.is_library;
    let mut symbols = None;

    if is_library {
      symbols = Some(vec![Symbol {
        exported: "*".into(),
        is_esm_export: false,
        is_weak: true,
        loc: None,
        local: "*".into(),
        self_referenced: false,
      }]);
    }

    Dependency {
      env: target.env.clone(),
      is_entry: true,
      needs_stable_name: true,
      specifier: entry,
      specifier_type: SpecifierType::Url,
      symbols,
      target: Some(Box::new(target)),
      ..Dependency::default()
    }
  }

  pub fn new(specifier: String, env: Arc<Environment>) -> Dependency {
    Dependency {
      env,
      meta: JSONObject::new(),
      specifier,
      ..Dependency::default()
    }
  }
}

/// Determines when a dependency should load
#[derive(Clone, Copy, Debug, Deserialize_repr, Eq, Hash, PartialEq, Serialize_repr)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
#[derive(Default)]
pub enum Priority {
  /// Resolves the dependency synchronously, placing the resolved asset in
  /// the same bundle as the parent or another bundle that is already on the
  /// page
  #[default]
  Sync = 0,
  /// Places the dependency in a separate bundle loaded in parallel with the
  /// current bundle
  Parallel = 1,
  /// The dependency should be placed in a separate bundle that is loaded
  /// later
  Lazy = 2,
}

impl Priority {
  /// Parallel and lazy dependencies cross a bundle boundary; they anchor a
  /// bundle group rather than pulling the target into the current bundle.
  pub fn is_bundle_boundary(&self) -> bool {
    !matches!(self, Priority::Sync)
  }
}

/// The type of the import specifier
#[derive(Clone, Copy, Debug, Deserialize_repr, Eq, Hash, PartialEq, Serialize_repr)]
#[repr(u8)]
#[derive(Default)]
pub enum SpecifierType {
  /// An ES Module specifier
  #[default]
  Esm = 0,

  /// A CommonJS specifier
  CommonJS = 1,

  /// A URL that works as in a browser
  Url = 2,

  /// A custom specifier that must be handled by a custom resolver plugin
  Custom = 3,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn id_is_stable_for_identical_dependencies() {
    let env = Arc::new(Environment::default());
    let a = Dependency::new("./a.js".into(), env.clone());
    let b = Dependency::new("./a.js".into(), env.clone());
    assert_eq!(a.id(), b.id());
  }

  #[test]
  fn id_differs_by_specifier_environment_and_pipeline() {
    let env = Arc::new(Environment::default());
    let base = Dependency::new("./a.js".into(), env.clone());

    let other_specifier = Dependency::new("./b.js".into(), env.clone());
    assert_ne!(base.id(), other_specifier.id());

    let other_pipeline = Dependency {
      pipeline: Some("inline".into()),
      ..base.clone()
    };
    assert_ne!(base.id(), other_pipeline.id());

    let other_env = Dependency::new(
      "./a.js".into(),
      Arc::new(Environment {
        context: crate::types::EnvironmentContext::Node,
        ..Environment::default()
      }),
    );
    assert_ne!(base.id(), other_env.id());
  }

  #[test]
  fn library_entries_request_the_star_namespace() {
    let mut target = Target::default();
    target.env = Arc::new(Environment {
      is_library: true,
      ..Environment::default()
    });

    let dep = Dependency::entry("index.js".into(), target);
    let symbols = dep.symbols.expect("library entry should have symbols");
    assert_eq!(symbols.len(), 1);
    assert_eq!(symbols[0].exported, "*");
    assert!(symbols[0].is_weak);
  }
}
