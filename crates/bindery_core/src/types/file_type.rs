use std::hash::Hash;

use serde::Deserialize;
use serde::Serialize;

/// Represents a file type by its extension
///
/// Defaults to `FileType::Js` for convenience.
#[derive(Default, Debug, Clone, Eq, PartialEq, Hash)]
pub enum FileType {
  Css,
  Html,
  #[default]
  Js,
  Json,
  Jsx,
  Svg,
  Ts,
  Tsx,
  Other(String),
}

impl Serialize for FileType {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    self.extension().serialize(serializer)
  }
}

impl<'de> Deserialize<'de> for FileType {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: serde::Deserializer<'de>,
  {
    let ext: String = Deserialize::deserialize(deserializer)?;
    Ok(Self::from_extension(&ext))
  }
}

impl FileType {
  pub fn extension(&self) -> &str {
    match self {
      FileType::Css => "css",
      FileType::Html => "html",
      FileType::Js => "js",
      FileType::Json => "json",
      FileType::Jsx => "jsx",
      FileType::Svg => "svg",
      FileType::Ts => "ts",
      FileType::Tsx => "tsx",
      FileType::Other(s) => s.as_str(),
    }
  }

  pub fn from_extension(ext: &str) -> Self {
    match ext {
      "css" => FileType::Css,
      "html" | "htm" => FileType::Html,
      "js" | "mjs" | "cjs" => FileType::Js,
      "json" => FileType::Json,
      "jsx" => FileType::Jsx,
      "svg" => FileType::Svg,
      "ts" | "mts" | "cts" => FileType::Ts,
      "tsx" => FileType::Tsx,
      ext => FileType::Other(ext.to_string()),
    }
  }
}
