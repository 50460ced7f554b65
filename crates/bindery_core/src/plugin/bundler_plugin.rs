use async_trait::async_trait;
use std::fmt::Debug;

use crate::bundle_graph::BundleGraph;

/// Groups the assets of a finalized asset graph into bundles
///
/// Bundlers receive the bundle graph seeded from the asset graph and call
/// its mutation operations to add bundle and bundle group nodes. `optimize`
/// runs after `bundle` with the same mutation rights, e.g. for bundle
/// merging or splitting. Both run under a single-writer discipline: the
/// `&mut` receiver is the whole locking story.
#[async_trait]
pub trait BundlerPlugin: Debug + Send + Sync {
  async fn bundle(&self, bundle_graph: &mut BundleGraph) -> Result<(), anyhow::Error>;

  async fn optimize(&self, bundle_graph: &mut BundleGraph) -> Result<(), anyhow::Error>;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug)]
  struct NoopBundlerPlugin {}

  #[async_trait]
  impl BundlerPlugin for NoopBundlerPlugin {
    async fn bundle(&self, _bundle_graph: &mut BundleGraph) -> Result<(), anyhow::Error> {
      Ok(())
    }

    async fn optimize(&self, _bundle_graph: &mut BundleGraph) -> Result<(), anyhow::Error> {
      Ok(())
    }
  }

  #[test]
  fn can_be_dyn() {
    let _bundler: Box<dyn BundlerPlugin> = Box::new(NoopBundlerPlugin {});
  }
}
