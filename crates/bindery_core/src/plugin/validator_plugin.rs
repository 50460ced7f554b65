use async_trait::async_trait;
use std::fmt::Debug;

use crate::diagnostic::Diagnostic;
use crate::types::Asset;

/// Analyzes assets after transformation and reports problems without
/// failing the build pipeline itself, e.g. type checking
#[async_trait]
pub trait ValidatorPlugin: Debug + Send + Sync {
  async fn validate(&self, asset: &Asset) -> Result<Vec<Diagnostic>, anyhow::Error>;
}
