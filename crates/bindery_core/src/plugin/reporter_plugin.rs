use async_trait::async_trait;
use std::fmt::Debug;

use crate::diagnostic::Diagnostic;

/// Build lifecycle events delivered to reporters
#[derive(Clone, Debug, PartialEq)]
pub enum ReporterEvent {
  BuildStarted,
  BundlingFinished { bundle_count: usize },
  BuildSucceeded,
  BuildFailed { diagnostics: Vec<Diagnostic> },
}

/// Receives build events, e.g. for progress output or metrics
///
/// Reporters only ever observe; they cannot influence the build.
#[async_trait]
pub trait ReporterPlugin: Debug + Send + Sync {
  async fn report(&self, event: &ReporterEvent) -> Result<(), anyhow::Error>;
}
