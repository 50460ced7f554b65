use async_trait::async_trait;
use std::fmt::Debug;

use crate::bundle_graph::BundleGraph;
use crate::types::{Bundle, Code};

pub struct PackageContext<'a> {
  pub bundle: &'a Bundle,
  pub bundle_graph: &'a BundleGraph,
}

pub struct PackagedBundle {
  pub contents: Code,
}

/// Combines all the assets in a bundle together into an output file
///
/// Packagers are also responsible for resolving URL references and bundle
/// inlining. They see the bundle graph strictly read-only.
#[async_trait]
pub trait PackagerPlugin: Debug + Send + Sync {
  /// Combines assets in a bundle
  async fn package<'a>(&self, ctx: PackageContext<'a>) -> Result<PackagedBundle, anyhow::Error>;
}
