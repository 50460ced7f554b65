use async_trait::async_trait;
use std::fmt::Debug;
use std::path::PathBuf;

use crate::bundle_graph::BundleGraph;
use crate::types::Bundle;

/// Determines the output filename for a bundle
///
/// Namers run in a pipeline until one returns a result.
#[async_trait]
pub trait NamerPlugin: Debug + Send + Sync {
  /// Names the given bundle
  ///
  /// The returned file path should be relative to the target dist directory.
  /// Naming can be forwarded onto the next plugin by returning None.
  async fn name(
    &self,
    bundle: &Bundle,
    bundle_graph: &BundleGraph,
  ) -> Result<Option<PathBuf>, anyhow::Error>;
}
