// ytgrab-cli/src/lib.rs
//
// Library portion of the ytgrab CLI application.
// Contains argument definitions, command logic and console rendering.

pub mod cli;
pub mod commands;
pub mod output;

// Re-export items needed by the binary or integration tests
pub use cli::{Cli, Commands, DownloadArgs, ResolveArgs};
pub use commands::download::run_download;
pub use commands::resolve::run_resolve;
