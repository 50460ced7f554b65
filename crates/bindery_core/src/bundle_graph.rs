#[allow(clippy::module_inception)]
mod bundle_graph;
mod symbol_resolution;

pub use self::bundle_graph::*;
pub use self::symbol_resolution::*;
