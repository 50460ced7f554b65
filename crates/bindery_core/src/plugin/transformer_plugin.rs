use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::types::{Asset, Dependency};

#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct TransformResult {
  pub asset: Asset,
  pub dependencies: Vec<Dependency>,
}

/// Compiles a single asset, discovering its dependencies along the way
///
/// Many transformers are wrappers around other tools such as compilers and
/// preprocessors. Their results are merged into the asset graph by the
/// build orchestrator.
pub trait TransformerPlugin: Debug + Send + Sync {
  /// Transform the asset and/or add new assets
  fn transform(&mut self, input: Asset) -> Result<TransformResult, anyhow::Error>;
}
