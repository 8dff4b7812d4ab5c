//! # Launch Commands
//!
//! Activate the shim for other processes.
//!
//! - `nameguard run -- CMD...` - spawn `CMD` with the shim preloaded
//! - `nameguard env` - print shell exports for `eval "$(nameguard env)"`
//! - `nameguard env --off` - print shell code that deactivates it again

use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use anyhow::{Context, Result};
use console::{style, Emoji};
use nameguard_config::{log_launch_debug, log_launch_info, Config, ENV_ACTIVE};
use tracing::field::display;

static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");

/// Locate the shim using `--lib`, then config, then the usual install spots.
pub fn find_shim_library(explicit: Option<&Path>) -> Result<PathBuf> {
    let configured = nameguard_config::config().shim.library.clone();
    let exe = env::current_exe().ok();
    let cwd = env::current_dir().context("get current directory")?;

    let lib = nameguard_config::path::resolve_library(
        explicit,
        configured.as_deref(),
        exe.as_deref(),
        &cwd,
    )?;
    log_launch_debug!("Shim library resolved", path = display(lib.display()));
    Ok(lib)
}

/// Environment for a child that should run under the shim.
pub fn child_env(lib: &Path) -> Vec<(String, String)> {
    let inherited = env::var("LD_PRELOAD").ok();
    Config::preload_env(lib, inherited.as_deref())
}

/// Spawn `command` with the shim preloaded and return its exit code.
pub fn cmd_run(lib: Option<&Path>, command: &[String]) -> Result<i32> {
    let (program, args) = command
        .split_first()
        .context("no command given; usage: nameguard run -- CMD [ARGS...]")?;

    let lib = find_shim_library(lib)?;
    log_launch_info!("Spawning child", program = program.as_str(), shim = display(lib.display()));

    let status = Command::new(program)
        .args(args)
        .envs(child_env(&lib))
        .status()
        .with_context(|| format!("failed to spawn {}", program))?;

    log_launch_debug!("Child exited", status = display(status));
    Ok(exit_code(status))
}

/// Shell exit code for a finished child; signal deaths map to `128 + signo`.
pub fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(sig)) => 128 + sig,
        (None, None) => 1,
    }
}

/// Generate shell script for `eval "$(nameguard env)"`
pub fn cmd_env(lib: Option<&Path>) -> Result<()> {
    if env::var_os(ENV_ACTIVE).is_some() {
        eprintln!(
            "{} {}",
            WARN,
            style("nameguard is already active in this shell.").yellow()
        );
        return Ok(());
    }

    let lib = find_shim_library(lib)?;
    println!("# nameguard: suppress prctl(PR_SET_NAME)");
    for (key, value) in child_env(&lib) {
        println!("export {}={}", key, shell_quote(&value));
    }
    Ok(())
}

/// Generate shell script that removes the shim from `LD_PRELOAD`.
pub fn cmd_env_off() -> Result<()> {
    if env::var_os(ENV_ACTIVE).is_none() {
        eprintln!(
            "{} {}",
            WARN,
            style("nameguard is not active in this shell.").yellow()
        );
        return Ok(());
    }

    let remaining = env::var("LD_PRELOAD")
        .map(|v| without_shim(&v))
        .unwrap_or_default();

    println!("# nameguard: restore prctl(PR_SET_NAME)");
    if remaining.is_empty() {
        println!("unset LD_PRELOAD");
    } else {
        println!("export LD_PRELOAD={}", shell_quote(&remaining));
    }
    println!("unset {}", ENV_ACTIVE);
    Ok(())
}

/// `LD_PRELOAD` value with every nameguard shim entry removed.
fn without_shim(preload: &str) -> String {
    preload
        .split([':', ' '])
        .filter(|e| !e.is_empty())
        .filter(|e| {
            Path::new(e).file_name() != Some(OsStr::new(nameguard_config::LIBRARY_FILE_NAME))
        })
        .collect::<Vec<_>>()
        .join(":")
}

/// Single-quote `s` for POSIX shells.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    #[test]
    fn test_exit_code_passthrough() {
        assert_eq!(exit_code(ExitStatus::from_raw(0)), 0);
        assert_eq!(exit_code(ExitStatus::from_raw(3 << 8)), 3);
    }

    #[test]
    fn test_exit_code_signal() {
        assert_eq!(exit_code(ExitStatus::from_raw(libc::SIGKILL)), 128 + 9);
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/opt/lib/a.so"), "'/opt/lib/a.so'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_without_shim() {
        assert_eq!(
            without_shim("/a/libnameguard_shim.so:/b/libother.so /c/libnameguard_shim.so"),
            "/b/libother.so"
        );
        assert_eq!(without_shim("/a/libnameguard_shim.so"), "");
    }

    #[test]
    fn test_run_requires_command() {
        let err = cmd_run(None, &[]).unwrap_err();
        assert!(err.to_string().contains("no command given"));
    }
}
