use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::str;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use super::bundle::MaybeBundleBehavior;
use super::environment::Environment;
use super::file_type::FileType;
use super::json::JSONObject;
use super::symbol::Symbol;

pub type AssetId = String;

/// The transformed contents of an asset
#[derive(PartialEq, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", transparent)]
pub struct Code {
  inner: Vec<u8>,
}

impl Code {
  pub fn new(bytes: Vec<u8>) -> Self {
    Self { inner: bytes }
  }

  pub fn bytes(&self) -> &[u8] {
    &self.inner
  }

  pub fn as_str(&self) -> anyhow::Result<&str> {
    str::from_utf8(&self.inner)
      .map_err(|e| anyhow::Error::new(e).context("Failed to convert code to UTF8 str"))
  }

  pub fn size(&self) -> u32 {
    self.inner.len() as u32
  }
}

impl Display for Code {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{:?}", self.inner)
  }
}

impl Debug for Code {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self.as_str() {
      Ok(code) => write!(f, "{:?}", code),
      Err(_) => write!(f, "{:?}", self.inner),
    }
  }
}

impl From<String> for Code {
  fn from(value: String) -> Self {
    Self {
      inner: value.into_bytes(),
    }
  }
}

impl From<&str> for Code {
  fn from(value: &str) -> Self {
    Self {
      inner: value.to_owned().into_bytes(),
    }
  }
}

#[derive(Debug)]
pub struct CreateAssetIdParams<'a> {
  pub environment_id: &'a str,
  /// All paths should be normalized to a project relative string to generate
  /// a consistent hash.
  pub file_path: &'a str,
  pub file_type: &'a FileType,
  pub pipeline: Option<&'a str>,
  pub query: Option<&'a str>,
  pub unique_key: Option<&'a str>,
}

pub fn create_asset_id(params: CreateAssetIdParams) -> String {
  let CreateAssetIdParams {
    environment_id,
    file_path,
    file_type,
    pipeline,
    query,
    unique_key,
  } = params;

  let mut hasher = crate::hash::IdentifierHasher::default();

  environment_id.hash(&mut hasher);
  file_path.hash(&mut hasher);
  file_type.hash(&mut hasher);
  pipeline.hash(&mut hasher);
  query.hash(&mut hasher);
  unique_key.hash(&mut hasher);

  format!("{:016x}", hasher.finish())
}

/// An asset is a file, or part of a file, that has been processed by the
/// transformer collaborators and now participates in the module graph.
///
/// Assets are immutable once inserted into the graph for a build; a rebuild
/// replaces the whole value.
#[derive(Default, PartialEq, Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
  /// The main identity hash for the asset. It is consistent for the entire
  /// build and between builds.
  pub id: AssetId,

  /// Controls which bundle the asset is placed into
  pub bundle_behavior: MaybeBundleBehavior,

  /// The environment of the asset
  pub env: Arc<Environment>,

  /// The file path to the asset
  pub file_path: PathBuf,

  /// The file type of the asset, which may change during transformation
  #[serde(rename = "type")]
  pub file_type: FileType,

  /// The transformed output of this asset
  pub code: Arc<Code>,

  /// Plugin specific metadata for the asset
  pub meta: JSONObject,

  /// The named pipeline the asset was processed with
  pub pipeline: Option<String>,

  /// The transformer options for the asset from the dependency query string
  pub query: Option<String>,

  /// The export table of the asset
  ///
  /// `None` is the bailout state: static analysis could not enumerate the
  /// exports (e.g. dynamic `exports[key] =` patterns), so any export may
  /// alias any local name and consumers must fall back to runtime lookups.
  pub symbols: Option<Vec<Symbol>>,

  /// A unique key that identifies an asset when a transformer returns
  /// several assets from one input
  #[serde(skip_serializing_if = "Option::is_none")]
  pub unique_key: Option<String>,

  /// Whether this asset can be omitted if none of its exports are being used
  ///
  /// This is initially set by the resolver, but can be overridden by
  /// transformers.
  pub side_effects: bool,

  /// Indicates if the asset is used as a bundle entry
  ///
  /// This controls whether a bundle can be split into multiple, or whether
  /// all of the dependencies must be placed in a single bundle.
  pub is_bundle_splittable: bool,

  /// Whether this asset is part of the project, and not an external
  /// dependency
  pub is_source: bool,
}

impl Asset {
  /// Builds an asset from already-transformed data.
  ///
  /// Reading sources from disk and running transformers happens in the
  /// external collaborators; by the time a value reaches this core its code
  /// and symbols are final for the build.
  #[allow(clippy::too_many_arguments)]
  pub fn new_in_memory(
    env: Arc<Environment>,
    file_path: PathBuf,
    code: Code,
    pipeline: Option<String>,
    project_root: &Path,
    side_effects: bool,
    query: Option<String>,
  ) -> Self {
    let file_type =
      FileType::from_extension(file_path.extension().and_then(|s| s.to_str()).unwrap_or(""));

    let id = create_asset_id(CreateAssetIdParams {
      environment_id: &env.id(),
      file_path: &project_path(project_root, &file_path).to_string_lossy(),
      file_type: &file_type,
      pipeline: pipeline.as_deref(),
      query: query.as_deref(),
      unique_key: None,
    });

    Self {
      code: Arc::new(code),
      env,
      file_path,
      file_type,
      id,
      is_bundle_splittable: true,
      is_source: true,
      pipeline,
      query,
      side_effects,
      ..Asset::default()
    }
  }
}

fn project_path(project_root: &Path, file_path: &Path) -> PathBuf {
  file_path
    .strip_prefix(project_root)
    .unwrap_or(file_path)
    .to_path_buf()
}
