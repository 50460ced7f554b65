use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use serde_repr::Deserialize_repr;
use serde_repr::Serialize_repr;

use crate::hash::IdentifierHasher;

use super::asset::AssetId;
use super::environment::Environment;
use super::file_type::FileType;
use super::target::Target;

pub type BundleId = String;

/// Controls the behavior of the bundle the resolved asset is placed into
#[derive(Clone, Copy, Debug, Deserialize_repr, Eq, Hash, PartialEq, Serialize_repr)]
#[repr(u8)]
pub enum BundleBehavior {
  /// The asset will be placed into a new inline bundle, emitted inside a
  /// parent bundle rather than as its own file
  Inline = 0,
  /// The asset will be isolated from its parents in a separate bundle and
  /// shared assets will be duplicated
  Isolated = 1,
}

pub type MaybeBundleBehavior = Option<BundleBehavior>;

pub fn create_bundle_id(
  primary_key: &str,
  target_name: &str,
  bundle_type: &FileType,
  environment_id: &str,
) -> String {
  let mut hasher = IdentifierHasher::new();
  primary_key.hash(&mut hasher);
  target_name.hash(&mut hasher);
  bundle_type.hash(&mut hasher);
  environment_id.hash(&mut hasher);
  format!("{:016x}", hasher.finish())
}

/// A named collection of assets intended to ship together as one output file
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
  pub id: BundleId,

  /// A short id, unique within the bundle graph, used wherever the full hash
  /// would be unwieldy (e.g. runtime module registries)
  pub public_id: Option<String>,

  /// Placeholder substring embedded in output names until final content
  /// hashing replaces it
  pub hash_reference: String,

  #[serde(rename = "type")]
  pub bundle_type: FileType,

  pub env: Arc<Environment>,

  pub target: Target,

  /// The asset ids this bundle executes on load, in order. The last entry is
  /// the main entry.
  pub entry_asset_ids: Vec<AssetId>,

  /// The output name, assigned by the namer collaborator after bundling
  pub name: Option<String>,

  /// Whether the bundle was created for an entry dependency
  pub is_entry: bool,

  /// Inline bundles are emitted inside their parent instead of as files
  pub is_inline: bool,

  /// Whether the bundler is allowed to split this bundle further
  pub is_splittable: bool,

  /// The name must be stable over time, even when contents change
  pub needs_stable_name: bool,
}

impl Bundle {
  /// The main entry is the last entry asset; a bundle created from
  /// `unique_key` options has none.
  pub fn main_entry_id(&self) -> Option<&AssetId> {
    self.entry_asset_ids.last()
  }
}

pub fn create_bundle_group_id(target_name: &str, entry_asset_id: &str) -> String {
  let mut hasher = IdentifierHasher::new();
  target_name.hash(&mut hasher);
  entry_asset_id.hash(&mut hasher);
  format!("{:016x}", hasher.finish())
}

/// A set of bundles that must load together to satisfy one entry or async
/// dependency
///
/// Membership is kept as ordered edges in the bundle graph; the value only
/// carries the anchoring data.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleGroup {
  pub id: String,
  pub target: Target,
  pub entry_asset_id: AssetId,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bundle_ids_differ_by_type_and_target() {
    let env_id = Environment::default().id();
    let a = create_bundle_id("asset-1", "default", &FileType::Js, &env_id);
    let b = create_bundle_id("asset-1", "default", &FileType::Css, &env_id);
    let c = create_bundle_id("asset-1", "modern", &FileType::Js, &env_id);

    assert_ne!(a, b);
    assert_ne!(a, c);
    assert_eq!(
      a,
      create_bundle_id("asset-1", "default", &FileType::Js, &env_id)
    );
  }
}
