pub use bundler_plugin::*;
pub use namer_plugin::*;
pub use optimizer_plugin::*;
pub use packager_plugin::*;
pub use reporter_plugin::*;
pub use resolver_plugin::*;
pub use runtime_plugin::*;
pub use transformer_plugin::*;
pub use validator_plugin::*;

mod bundler_plugin;
mod namer_plugin;
mod optimizer_plugin;
mod packager_plugin;
mod reporter_plugin;
mod resolver_plugin;
mod runtime_plugin;
mod transformer_plugin;
mod validator_plugin;
