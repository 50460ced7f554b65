#[allow(clippy::module_inception)]
mod asset_graph;
mod propagate_requested_symbols;

pub use self::asset_graph::*;
pub use self::propagate_requested_symbols::*;
