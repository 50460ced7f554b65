use std::fmt::Display;
use std::fmt::Formatter;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::types::JSONObject;

use super::CodeFrame;

/// A user-facing failure value.
///
/// The core only builds these; rendering them is the job of the external
/// diagnostics collaborator. Usually but not always a diagnostic is linked to
/// a source-code location.
#[derive(Error, Debug, Deserialize, PartialEq, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
  /// A summary user-facing message
  pub message: String,

  /// Indicates where this diagnostic was emitted from
  pub origin: Option<String>,

  /// A list of files with source-code highlights
  pub code_frames: Option<Vec<CodeFrame>>,

  /// Hints for the user
  pub hints: Option<Vec<String>>,

  /// Diagnostic specific metadata (optional)
  pub meta: Option<JSONObject>,
}

impl Display for Diagnostic {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.message)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn displays_the_message() {
    let diagnostic = Diagnostic {
      message: String::from("Failed to resolve './missing'"),
      ..Diagnostic::default()
    };

    assert_eq!(format!("{diagnostic}"), "Failed to resolve './missing'");
  }
}
