use async_trait::async_trait;
use std::fmt::Debug;
use std::path::PathBuf;

use crate::bundle_graph::BundleGraph;
use crate::types::{Bundle, Code, Dependency};

/// A synthetic asset injected into a bundle by a runtime plugin, e.g. a
/// loader stub for an async bundle group.
#[derive(Debug)]
pub struct RuntimeAsset {
  pub file_path: PathBuf,
  pub code: Code,
  /// The dependency this runtime code satisfies, if any
  pub dependency: Option<Dependency>,
  pub is_entry: bool,
}

/// Injects runtime code into bundles after bundling has finished
///
/// Runtimes read the frozen bundle graph (typically through
/// `resolve_external_dependency`) to decide which loader calls a bundle
/// needs; the returned assets are merged in by the orchestrator.
#[async_trait]
pub trait RuntimePlugin: Debug + Send + Sync {
  async fn apply(
    &self,
    bundle: &Bundle,
    bundle_graph: &BundleGraph,
  ) -> Result<Vec<RuntimeAsset>, anyhow::Error>;
}
