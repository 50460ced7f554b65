use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use crate::hash::IdentifierHasher;

use super::source::SourceLocation;

pub type EnvironmentRef = Arc<Environment>;

/// The environment the built code will run in
///
/// This influences how code is compiled, which assets may be grouped into a
/// bundle together, and how dependency ids are keyed.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
  /// The environment the output should run in
  pub context: EnvironmentContext,

  /// The engines supported by the environment
  pub engines: Engines,

  /// Whether this is a library build
  ///
  /// Treats the target as a library that would be published and consumed by
  /// another tool rather than used directly in a browser or other target
  /// environment. Library entries request the full `*` export namespace.
  pub is_library: bool,

  pub loc: Option<SourceLocation>,

  /// Determines what type of module to output
  pub output_format: OutputFormat,

  /// Determines whether scope hoisting should be enabled
  pub should_scope_hoist: bool,

  /// Determines whether the output should be optimised
  pub should_optimize: bool,

  pub source_type: SourceType,
}

pub fn create_environment_id(
  context: &EnvironmentContext,
  engines: &Engines,
  output_format: &OutputFormat,
  source_type: &SourceType,
  is_library: &bool,
  should_optimize: &bool,
  should_scope_hoist: &bool,
) -> String {
  let mut hasher = IdentifierHasher::new();
  context.hash(&mut hasher);
  engines.hash(&mut hasher);
  output_format.hash(&mut hasher);
  source_type.hash(&mut hasher);
  is_library.hash(&mut hasher);
  should_optimize.hash(&mut hasher);
  should_scope_hoist.hash(&mut hasher);
  format!("{:016x}", hasher.finish())
}

impl Environment {
  pub fn id(&self) -> String {
    create_environment_id(
      &self.context,
      &self.engines,
      &self.output_format,
      &self.source_type,
      &self.is_library,
      &self.should_optimize,
      &self.should_scope_hoist,
    )
  }

  /// Produces the environment of a dependency by layering overrides onto the
  /// importer's environment.
  ///
  /// Merging no overrides yields an environment with the same id, so
  /// dependency ids stay stable when a transformer passes the importer's
  /// environment straight through.
  pub fn merge(&self, overrides: EnvironmentOverrides) -> Environment {
    Environment {
      context: overrides.context.unwrap_or(self.context),
      engines: overrides.engines.unwrap_or_else(|| self.engines.clone()),
      output_format: overrides.output_format.unwrap_or(self.output_format),
      source_type: overrides.source_type.unwrap_or(self.source_type),
      loc: overrides.loc.or_else(|| self.loc.clone()),
      ..self.clone()
    }
  }
}

/// Partial environment supplied by a transformer for a single dependency
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentOverrides {
  pub context: Option<EnvironmentContext>,
  pub engines: Option<Engines>,
  pub output_format: Option<OutputFormat>,
  pub source_type: Option<SourceType>,
  pub loc: Option<SourceLocation>,
}

/// The environment the output should run in
///
/// This informs the core what environment-specific APIs are available.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnvironmentContext {
  #[default]
  Browser,
  Node,
  ServiceWorker,
  WebWorker,
  Worklet,
}

impl EnvironmentContext {
  pub fn is_node(&self) -> bool {
    matches!(self, EnvironmentContext::Node)
  }

  pub fn is_browser(&self) -> bool {
    use EnvironmentContext::*;
    matches!(self, Browser | WebWorker | ServiceWorker | Worklet)
  }

  pub fn is_worker(&self) -> bool {
    use EnvironmentContext::*;
    matches!(self, WebWorker | ServiceWorker)
  }
}

/// Engine version requirements, kept as opaque range strings
///
/// Parsing and matching them against real browser data belongs to the
/// resolver/transformer subsystem, not to this core.
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Engines {
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub browsers: Vec<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub node: Option<String>,
}

/// Determines what type of module to output
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
  #[default]
  EsModule,
  CommonJS,
  Global,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum SourceType {
  #[default]
  #[serde(rename = "module")]
  Module,
  #[serde(rename = "script")]
  Script,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn environment_ids_are_stable_for_equal_environments() {
    let a = Environment::default();
    let b = Environment::default();
    assert_eq!(a.id(), b.id());

    let c = Environment {
      context: EnvironmentContext::Node,
      output_format: OutputFormat::CommonJS,
      ..Environment::default()
    };
    assert_ne!(a.id(), c.id());
  }

  #[test]
  fn merging_no_overrides_preserves_the_id() {
    let env = Environment {
      context: EnvironmentContext::ServiceWorker,
      should_scope_hoist: true,
      ..Environment::default()
    };

    let merged = env.merge(EnvironmentOverrides::default());
    assert_eq!(env.id(), merged.id());
  }

  #[test]
  fn merging_overrides_changes_the_id() {
    let env = Environment::default();
    let merged = env.merge(EnvironmentOverrides {
      context: Some(EnvironmentContext::WebWorker),
      ..EnvironmentOverrides::default()
    });

    assert_eq!(merged.context, EnvironmentContext::WebWorker);
    assert_ne!(env.id(), merged.id());
  }
}
