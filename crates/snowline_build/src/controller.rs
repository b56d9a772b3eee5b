use log::{debug, info};
use std::{fmt, fs, path::PathBuf};

use crate::{
    config::BuildConfig,
    crawler::{FlushStats, LoadMode, flush},
    error::BuildError,
    mount::collect_mount_files,
    pipeline::run_post_build,
    session::{BuildSession, ImportMap},
    traits::{Loader, PackageInstaller, Pipeline, UrlMapper},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    MountScan,
    Pass1Discover,
    PackageOptimize,
    Pass2Rewrite,
    WatchLoop,
    PostBuild,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::MountScan => "mount scan",
            Phase::Pass1Discover => "pass 1 (discover)",
            Phase::PackageOptimize => "package optimize",
            Phase::Pass2Rewrite => "pass 2 (rewrite)",
            Phase::WatchLoop => "watch",
            Phase::PostBuild => "post-build",
        };
        f.write_str(name)
    }
}

/// The collaborators a build talks to.
pub struct Services {
    pub loader: Box<dyn Loader>,
    pub mapper: Box<dyn UrlMapper>,
    pub installer: Box<dyn PackageInstaller>,
    pub pipeline: Box<dyn Pipeline>,
}

#[derive(Debug)]
pub struct BuildOutcome {
    pub session: BuildSession,
    pub pass1: FlushStats,
    pub pass2: FlushStats,
}

impl BuildOutcome {
    pub fn packages(&self) -> usize {
        self.session.import_map().map_or(0, ImportMap::len)
    }
}

/// Seeds the session with the URLs of every mounted file. Returns how many
/// URLs were new.
pub fn seed_mounts(session: &mut BuildSession, mapper: &dyn UrlMapper, files: &[PathBuf]) -> usize {
    info!("Phase: {}", Phase::MountScan);
    let seeded = files
        .iter()
        .flat_map(|file| mapper.file_to_urls(file))
        .filter(|url| session.discover(url))
        .count();
    debug!("Seeded {} URLs from {} mount files", seeded, files.len());
    seeded
}

/// Crawls from the seeded URLs without resolving specifiers, collecting the
/// bare specifiers in use.
pub fn discover_pass(
    session: &mut BuildSession,
    loader: &mut dyn Loader,
    config: &BuildConfig,
) -> Result<FlushStats, BuildError> {
    info!("Phase: {}", Phase::Pass1Discover);
    let mode = LoadMode { is_hmr: config.watch, ..Default::default() };
    flush(session, loader, config, false, mode)
}

/// Installs the collected bare specifiers and stores the import map.
pub fn optimize_packages(
    session: &mut BuildSession,
    installer: &mut dyn PackageInstaller,
    config: &BuildConfig,
) -> Result<(), BuildError> {
    info!("Phase: {}", Phase::PackageOptimize);
    if session.bare_specifiers().is_empty() {
        debug!("No bare specifiers found, skipping install");
        session.set_import_map(ImportMap::default());
        return Ok(());
    }
    let import_map = installer
        .install(session.bare_specifiers(), &config.package_dir(), config)
        .map_err(BuildError::Install)?;
    info!("Installed {} packages", import_map.len());
    session.set_import_map(import_map);
    Ok(())
}

/// Reprocesses every discovered URL with specifiers resolved against the
/// session's import map.
pub fn rewrite_pass(
    session: &mut BuildSession,
    loader: &mut dyn Loader,
    config: &BuildConfig,
) -> Result<FlushStats, BuildError> {
    info!("Phase: {}", Phase::Pass2Rewrite);
    session.requeue_discovered();
    let mode = LoadMode { is_hmr: config.watch, is_resolve: true, ..Default::default() };
    flush(session, loader, config, !config.watch, mode)
}

fn prepare_out_dir(config: &BuildConfig) -> Result<(), BuildError> {
    if config.clean && config.out_dir.exists() {
        info!("Cleaning {}", config.out_dir.display());
        fs::remove_dir_all(&config.out_dir)
            .map_err(|e| BuildError::fs("clean", &config.out_dir, e))?;
    }
    fs::create_dir_all(&config.out_dir).map_err(|e| BuildError::fs("create", &config.out_dir, e))
}

/// One-shot build: both passes with a package install between them, then
/// the post-build steps.
pub fn run_build(config: &BuildConfig, services: &mut Services) -> Result<BuildOutcome, BuildError> {
    prepare_out_dir(config)?;
    let mut session = BuildSession::new();

    let files = collect_mount_files(config)?;
    seed_mounts(&mut session, services.mapper.as_ref(), &files);
    let pass1 = discover_pass(&mut session, services.loader.as_mut(), config)?;
    optimize_packages(&mut session, services.installer.as_mut(), config)?;
    let pass2 = rewrite_pass(&mut session, services.loader.as_mut(), config)?;

    info!("Phase: {}", Phase::PostBuild);
    run_post_build(config, services.pipeline.as_mut(), services.loader.as_mut())?;
    Ok(BuildOutcome { session, pass1, pass2 })
}

/// Initial build for watch mode. No packages are installed and the returned
/// session is kept for the watch loop.
pub fn start_watch(config: &BuildConfig, services: &mut Services) -> Result<BuildOutcome, BuildError> {
    prepare_out_dir(config)?;
    let mut session = BuildSession::new();

    let files = collect_mount_files(config)?;
    seed_mounts(&mut session, services.mapper.as_ref(), &files);
    let pass1 = discover_pass(&mut session, services.loader.as_mut(), config)?;
    let pass2 = rewrite_pass(&mut session, services.loader.as_mut(), config)?;
    Ok(BuildOutcome { session, pass1, pass2 })
}
