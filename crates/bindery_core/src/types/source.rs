use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

/// A 1-based position within a source file
#[derive(PartialEq, Eq, Hash, Clone, Debug, Default, Deserialize, Serialize)]
pub struct Location {
  pub line: usize,
  pub column: usize,
}

/// A range within a source file, used to point diagnostics and symbols back
/// at the code that produced them
#[derive(PartialEq, Eq, Hash, Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
  pub file_path: PathBuf,
  pub start: Location,
  pub end: Location,
}

/// An in-memory representation of a file with its contents
#[derive(PartialEq, Clone, Debug, Default, Deserialize, Serialize)]
pub struct File {
  pub contents: String,
  pub path: PathBuf,
}
