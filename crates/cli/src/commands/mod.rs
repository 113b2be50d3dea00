pub mod import;
pub mod logging;
pub mod pipeline;
pub mod project;
pub mod runs;
pub mod tags;
pub mod util;

pub use import::*;
pub use logging::*;
pub use pipeline::*;
pub use project::*;
pub use runs::*;
pub use tags::*;
pub use util::*;
