pub use self::code_frame::*;
pub use self::code_highlight::*;
pub use self::diagnostic::*;

mod code_frame;
mod code_highlight;
#[allow(clippy::module_inception)]
mod diagnostic;
