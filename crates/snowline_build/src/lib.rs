//! Build engine for snowline.
//!
//! Crawls the import graph of the mounted sources and writes every file it
//! reaches into the output tree:
//! - Pass 1 discovers local files and the bare package specifiers they use
//! - Packages are installed and an import map is produced
//! - Pass 2 rewrites every file against that import map
//!
//! Watch mode keeps the session alive and recrawls only what changed.

pub mod config;
pub mod controller;
pub mod crawler;
pub mod error;
pub mod installer;
pub mod loader;
pub mod mount;
pub mod pipeline;
pub mod resolver;
pub mod session;
pub mod traits;
pub mod watch;

#[cfg(test)]
mod test_utils;

// Re-export public API
pub use config::{BuildConfig, Config, Mount};
pub use controller::{BuildOutcome, Phase, Services, run_build, start_watch};
pub use crawler::{FlushStats, LoadMode, flush};
pub use error::BuildError;
pub use installer::NodeModulesInstaller;
pub use loader::PassthroughLoader;
pub use mount::{MountUrlMapper, collect_mount_files};
pub use pipeline::run_post_build;
pub use session::{BuildSession, ImportMap};
pub use traits::{
    ChangeEvent, LoadOptions, LoadResult, Loader, NoopPipeline, PackageInstaller, Pipeline,
    UrlMapper,
};
pub use watch::{ChangeHook, ChangeSubscription, recrawl, watch_loop};
