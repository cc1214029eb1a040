//! CLI command handling

pub mod actions;
pub mod context;
pub mod output;
pub mod query;
pub mod watch;

pub use actions::*;
pub use context::*;
pub use output::*;
pub use query::*;
pub use watch::*;
