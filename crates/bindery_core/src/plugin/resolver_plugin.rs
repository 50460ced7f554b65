use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::types::Dependency;
use crate::types::JSONObject;
use crate::types::Priority;

pub struct ResolveContext {
  pub dependency: Arc<Dependency>,
  pub pipeline: Option<String>,
  pub specifier: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedResolution {
  /// The code of the resolved asset
  ///
  /// If provided, this is used rather than reading the file from disk.
  pub code: Option<String>,

  /// An absolute path to the resolved file
  pub file_path: PathBuf,

  /// Is spread (shallowly merged) onto the request's dependency.meta
  pub meta: Option<JSONObject>,

  /// An optional named pipeline to compile the resolved file
  pub pipeline: Option<String>,

  /// Overrides the priority set on the dependency
  pub priority: Option<Priority>,

  /// Query parameters to be used by transformers when compiling the
  /// resolved file
  pub query: Option<String>,

  /// Corresponds to the asset side effects
  pub side_effects: bool,
}

#[derive(Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Resolution {
  /// Indicates the dependency was not resolved
  ///
  /// Fatal for the build unless the dependency is optional, in which case
  /// the missing edge is silently omitted.
  Unresolved,

  /// The resolved file should be excluded from the build
  Excluded,

  Resolved(ResolvedResolution),
}

/// Converts a dependency specifier into a file path that will be processed
/// by transformers
///
/// Resolvers run in a pipeline until one of them returns a result.
#[async_trait]
pub trait ResolverPlugin: Debug + Send + Sync {
  /// Determines what the dependency specifier resolves to
  async fn resolve(&self, ctx: ResolveContext) -> Result<Resolution, anyhow::Error>;
}
