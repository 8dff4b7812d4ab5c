//! # nameguard doctor
//!
//! Diagnostic checks for a nameguard deployment.
//! Validates config loading, shim presence, the exported `prctl` symbol,
//! and end-to-end suppression in a preloaded child process.

use anyhow::{Context, Result};
use console::{style, Emoji};
use nameguard_config::log_doctor_debug;
use std::path::Path;
use std::process::Command;
use tracing::field::display;

use crate::launch;
use crate::probe::{symbol_object, ProbeReport, PROBE_NAME};

static CHECK: Emoji<'_, '_> = Emoji("✔ ", "[ok] ");
static CROSS: Emoji<'_, '_> = Emoji("✘ ", "[!!] ");
static WARN_ICON: Emoji<'_, '_> = Emoji("⚠ ", "[??] ");
static DOT: Emoji<'_, '_> = Emoji("● ", "[-] ");

struct DiagResult {
    passed: u32,
    warned: u32,
    failed: u32,
}

impl DiagResult {
    fn new() -> Self {
        Self {
            passed: 0,
            warned: 0,
            failed: 0,
        }
    }

    fn pass(&mut self, msg: &str) {
        self.passed += 1;
        eprintln!("  {} {}", CHECK, style(msg).green());
    }

    fn warn(&mut self, msg: &str) {
        self.warned += 1;
        eprintln!("  {} {}", WARN_ICON, style(msg).yellow());
    }

    fn fail(&mut self, msg: &str) {
        self.failed += 1;
        eprintln!("  {} {}", CROSS, style(msg).red());
    }

    fn info(&self, msg: &str) {
        eprintln!("  {} {}", DOT, style(msg).dim());
    }
}

/// Run all checks. Returns the process exit code (non-zero on any failure).
pub fn cmd_doctor(lib: Option<&Path>) -> Result<i32> {
    eprintln!();
    eprintln!("{}", style("nameguard doctor").bold().cyan());
    eprintln!("{}", style("─".repeat(40)).dim());

    let mut d = DiagResult::new();

    // 1. Config loading
    eprintln!();
    eprintln!("{}", style("Config").bold());
    check_config(&mut d);

    // 2. Shim library
    eprintln!();
    eprintln!("{}", style("Shim").bold());
    let Some(lib) = check_library(lib, &mut d) else {
        return Ok(summary(&d));
    };
    check_exports(&lib, &mut d);

    // 3. Preloaded child
    eprintln!();
    eprintln!("{}", style("Probe").bold());
    check_probe(&lib, &mut d);

    Ok(summary(&d))
}

fn summary(d: &DiagResult) -> i32 {
    eprintln!();
    eprintln!("{}", style("─".repeat(40)).dim());
    eprintln!(
        "  {} passed, {} warnings, {} errors",
        style(d.passed).green().bold(),
        style(d.warned).yellow().bold(),
        style(d.failed).red().bold(),
    );

    if d.failed > 0 {
        eprintln!();
        eprintln!(
            "{}",
            style("Build the shim with 'cargo build -p nameguard-shim' or pass --lib.").dim()
        );
        eprintln!();
        return 1;
    } else if d.warned > 0 {
        eprintln!(
            "{}",
            style("Some warnings detected. The shim should still work.").dim()
        );
    } else {
        eprintln!("{}", style("All checks passed.").dim());
    }

    eprintln!();
    0
}

fn check_config(d: &mut DiagResult) {
    match nameguard_config::Config::global_config_path() {
        Some(path) if path.exists() => d.pass(&format!("Global config: {}", path.display())),
        Some(path) => d.info(&format!("No global config at {}", path.display())),
        None => d.warn("Cannot determine home directory"),
    }

    match nameguard_config::Config::load() {
        Ok(cfg) => {
            d.pass("Config loads successfully");
            if let Some(lib) = &cfg.shim.library {
                d.info(&format!("Configured library: {}", lib.display()));
            }
        }
        Err(e) => d.fail(&format!("Config load failed: {}", e)),
    }

    if std::env::var_os(nameguard_config::ENV_ACTIVE).is_some() {
        d.warn("This shell already runs under nameguard");
    }
}

fn check_library(lib: Option<&Path>, d: &mut DiagResult) -> Option<std::path::PathBuf> {
    match launch::find_shim_library(lib) {
        Ok(path) => {
            let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            d.pass(&format!("{} ({})", path.display(), format_bytes(size)));
            Some(path)
        }
        Err(e) => {
            d.fail(&format!("{:#}", e));
            None
        }
    }
}

/// The library must load and define `prctl` itself (not just pull in libc's).
fn check_exports(lib: &Path, d: &mut DiagResult) {
    match exported_prctl_object(lib) {
        Ok(Some(object)) if same_file(Path::new(&object), lib) => {
            d.pass("Exports prctl");
        }
        Ok(Some(object)) => {
            d.fail(&format!("prctl resolves to {} instead of the shim", object));
        }
        Ok(None) => d.fail("Library does not export prctl"),
        Err(e) => d.fail(&format!("{:#}", e)),
    }
}

/// Object that defines `prctl` as seen from a private `dlopen` of `lib`.
fn exported_prctl_object(lib: &Path) -> Result<Option<String>> {
    use std::os::unix::ffi::OsStrExt;

    let c_path = std::ffi::CString::new(lib.as_os_str().as_bytes())
        .context("library path contains a NUL byte")?;

    unsafe {
        // RTLD_LOCAL keeps the shim out of this process's global scope.
        let handle = libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL);
        if handle.is_null() {
            let err = libc::dlerror();
            let msg = if err.is_null() {
                "unknown error".to_string()
            } else {
                std::ffi::CStr::from_ptr(err).to_string_lossy().into_owned()
            };
            anyhow::bail!("dlopen failed: {}", msg);
        }

        let sym = libc::dlsym(handle, c"prctl".as_ptr());
        let object = if sym.is_null() {
            None
        } else {
            symbol_object(sym)
        };
        libc::dlclose(handle);
        Ok(object)
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    nameguard_config::path::normalize_or_original(a)
        == nameguard_config::path::normalize_or_original(b)
}

fn check_probe(lib: &Path, d: &mut DiagResult) {
    let report = match run_preloaded_probe(lib) {
        Ok(r) => r,
        Err(e) => {
            d.fail(&format!("Probe failed: {:#}", e));
            return;
        }
    };
    log_doctor_debug!("Probe report", report = display(format!("{:?}", report)));

    match &report.provider {
        Some(p) if same_file(Path::new(p), lib) => d.pass("prctl binds to the shim"),
        Some(p) => d.fail(&format!("prctl binds to {}", p)),
        None => d.warn("Could not tell which object provides prctl"),
    }

    if report.suppressed() {
        d.pass(&format!(
            "PR_SET_NAME suppressed (name stayed '{}')",
            report.after
        ));
    } else if report.after == PROBE_NAME {
        d.fail("PR_SET_NAME renamed the thread");
    } else {
        d.fail(&format!(
            "PR_SET_NAME returned {} (name '{}' -> '{}')",
            report.set_result, report.before, report.after
        ));
    }

    if report.passthrough_ok {
        d.pass("Other options pass through unchanged");
    } else {
        d.fail("PR_GET_DUMPABLE differs from the raw syscall");
    }
}

/// Re-run this binary as `nameguard probe` under the shim.
fn run_preloaded_probe(lib: &Path) -> Result<ProbeReport> {
    let exe = std::env::current_exe().context("locate nameguard executable")?;
    let output = Command::new(exe)
        .arg("probe")
        .envs(launch::child_env(lib))
        .output()
        .context("spawn probe")?;

    if !output.status.success() {
        anyhow::bail!(
            "probe exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    serde_json::from_slice(&output.stdout).context("parse probe report")
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{}B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1}K", bytes as f64 / 1024.0)
    } else {
        format!("{:.1}M", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(2048), "2.0K");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0M");
    }

    #[test]
    fn test_exports_rejects_non_library() {
        let temp = tempfile::tempdir().unwrap();
        let bogus = temp.path().join("libnameguard_shim.so");
        std::fs::write(&bogus, b"not an elf").unwrap();

        let err = exported_prctl_object(&bogus).unwrap_err();
        assert!(err.to_string().contains("dlopen failed"));
    }

    #[test]
    fn test_summary_exit_codes() {
        let mut d = DiagResult::new();
        d.pass("ok");
        d.warn("meh");
        assert_eq!(summary(&d), 0);
        d.fail("bad");
        assert_eq!(summary(&d), 1);
    }
}
