use colored::Colorize;
use snowline_build::{BuildConfig, BuildOutcome};
use std::{
    io::{self, Write},
    path::Path,
    time::Duration,
};

pub fn print_summary<W: Write>(
    out: &mut W,
    outcome: &BuildOutcome,
    elapsed: Duration,
) -> io::Result<()> {
    writeln!(
        out,
        "\n{} Finished in {}ms: {} files, {} packages",
        "●".bright_blue(),
        elapsed.as_millis().to_string().cyan(),
        outcome.pass2.written.to_string().cyan(),
        outcome.packages().to_string().cyan()
    )?;
    out.flush()
}

pub fn print_watch_banner<W: Write>(out: &mut W, config: &BuildConfig) -> io::Result<()> {
    writeln!(out, "{} Watching for changes...", "●".bright_green())?;
    for mount in &config.mounts {
        writeln!(out, "  {} {}", mount.url.bold(), display_path(&config.root, &mount.dir).dimmed())?;
    }
    out.flush()
}

pub fn print_rebuilt<W: Write>(out: &mut W, root: &Path, path: &Path) -> io::Result<()> {
    writeln!(out, "{} Rebuilt {}", "↻".bright_blue(), display_path(root, path).cyan())?;
    out.flush()
}

/// `path` relative to `root` when it lies inside it.
fn display_path(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => rel.display().to_string(),
        Err(_) => path.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_path() {
        let root = Path::new("/project");
        assert_eq!(display_path(root, Path::new("/project/src/a.js")), "src/a.js");
        assert_eq!(display_path(root, Path::new("/project")), ".");
        assert_eq!(display_path(root, Path::new("/elsewhere/a.js")), "/elsewhere/a.js");
    }

    #[test]
    fn test_print_rebuilt() {
        colored::control::set_override(false);
        let mut out = Vec::new();
        print_rebuilt(&mut out, Path::new("/project"), Path::new("/project/src/a.js")).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "↻ Rebuilt src/a.js\n");
    }
}
