mod reporter;
mod watcher;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{debug, info};
use snowline_build::{
    ChangeHook, Config, MountUrlMapper, NodeModulesInstaller, NoopPipeline, PassthroughLoader,
    Services, run_build, start_watch, watch_loop,
};
use std::io::{BufWriter, Write};
use std::time::Instant;

use crate::watcher::MountWatcher;

#[derive(Parser)]
#[command(name = "snowline")]
#[command(about = "An unbundled build tool for ES module web projects", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build the mounted directories into the output directory
    Build(Config),
}

fn main() -> Result<()> {
    env_logger::init();

    // stdio is blocked by LineWriter, use a BufWriter to reduce syscalls.
    // See https://github.com/rust-lang/rust/issues/60673
    let mut stdout = BufWriter::new(std::io::stdout());

    let cli = Cli::parse();
    debug!("Parsed CLI arguments: {:?}", cli.command);

    let start = Instant::now();

    match cli.command {
        Commands::Build(cfg) => {
            let config = cfg.initialize()?;
            let mut services = Services {
                loader: Box::new(PassthroughLoader::new(&config)),
                mapper: Box::new(MountUrlMapper::new(config.mounts.clone())),
                installer: Box::new(NodeModulesInstaller::new()),
                pipeline: Box::new(NoopPipeline),
            };

            if !config.watch {
                info!("Building into {}", config.out_dir.display());
                let outcome = run_build(&config, &mut services)?;
                reporter::print_summary(&mut stdout, &outcome, start.elapsed())?;
                return Ok(());
            }

            info!("Starting watch mode");
            let mut outcome = start_watch(&config, &mut services)?;
            reporter::print_summary(&mut stdout, &outcome, start.elapsed())?;

            let (_watcher, events) = MountWatcher::new(&config)?;
            reporter::print_watch_banner(&mut stdout, &config)?;
            stdout.flush()?;

            let hook = ChangeHook::new();
            let root = config.root.clone();
            let _subscription = hook.register(move |event| {
                let mut out = std::io::stdout().lock();
                // A closed stdout must not stop the rebuild loop
                let _ = reporter::print_rebuilt(&mut out, &root, &event.file_path);
            });

            watch_loop(&mut outcome.session, &mut services, &config, &hook, events)?;
            Ok(())
        }
    }
}
