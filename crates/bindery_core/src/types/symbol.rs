use serde::Deserialize;
use serde::Serialize;

use super::source::SourceLocation;

/// An entry in an asset's export table, or in a dependency's requested-symbol
/// table.
///
/// On an asset, `exported` is the outward-facing name and `local` the binding
/// that produces the value. On a dependency, `exported` is the name expected
/// from the target asset and `local` is the placeholder the importer binds it
/// to.
#[derive(PartialEq, Eq, Hash, Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Symbol {
  /// The name of the binding within the file it was defined
  pub local: String,

  /// The name this binding is visible as to other files
  pub exported: String,

  #[serde(default)]
  pub loc: Option<SourceLocation>,

  /// A weak symbol is a re-export: its value is produced by one of the
  /// owning asset's own dependencies rather than by the asset itself.
  #[serde(default)]
  pub is_weak: bool,

  /// Whether the symbol comes from an ESM export statement
  #[serde(default)]
  pub is_esm_export: bool,

  /// The asset both imports and exports this symbol (`export {x} from 'x'`
  /// where `x` is also used locally)
  #[serde(default)]
  pub self_referenced: bool,
}
