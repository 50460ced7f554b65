use async_trait::async_trait;
use std::fmt::Debug;

use crate::bundle_graph::BundleGraph;
use crate::types::{Bundle, Code};

pub struct OptimizeContext<'a> {
  pub bundle: &'a Bundle,
  pub bundle_graph: &'a BundleGraph,
  pub contents: &'a Code,
}

pub struct OptimizedBundle {
  pub contents: Code,
}

/// Optimises the packaged contents of a bundle
///
/// Commonly minification and dead code elimination, but any whole-bundle
/// transformation fits, such as prepending license headers. Multiple
/// optimizer plugins run in series, each receiving the previous result.
#[async_trait]
pub trait OptimizerPlugin: Debug + Send + Sync {
  /// Transforms the contents of a bundle
  async fn optimize<'a>(&self, ctx: OptimizeContext<'a>) -> Result<OptimizedBundle, anyhow::Error>;
}
