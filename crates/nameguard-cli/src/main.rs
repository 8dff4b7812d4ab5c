//! # nameguard CLI
//!
//! Launcher and diagnostics for the `prctl(PR_SET_NAME)` suppression shim.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use nameguard_config::{log_cli_debug, log_cli_info, Config, LogLevel};

mod doctor;
mod launch;
mod probe;

/// nameguard - keep thread names stable by ignoring prctl(PR_SET_NAME)
#[derive(Parser)]
#[command(name = "nameguard")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to libnameguard_shim.so (overrides config and discovery)
    #[arg(long = "lib", global = true, value_name = "PATH")]
    lib: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a command with the shim preloaded
    Run {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,
    },

    /// Print shell exports that activate the shim (eval "$(nameguard env)")
    Env {
        /// Print shell code that deactivates it instead
        #[arg(long)]
        off: bool,
    },

    /// Check that the shim can be found, loaded and actually suppresses renames
    Doctor,

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Report this process's prctl behavior as JSON (used by doctor)
    #[command(hide = true)]
    Probe,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
    /// Print config file locations
    Path,
}

fn main() -> Result<()> {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }

    let cli = Cli::parse();

    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        nameguard_config::config().log.level
    };
    nameguard_config::logging::init_logging(level);
    log_cli_debug!("Starting", level = level.as_str());

    let lib = cli.lib.as_deref();
    let code = match cli.command {
        Commands::Run { command } => launch::cmd_run(lib, &command)?,
        Commands::Env { off: false } => {
            launch::cmd_env(lib)?;
            0
        }
        Commands::Env { off: true } => {
            launch::cmd_env_off()?;
            0
        }
        Commands::Doctor => doctor::cmd_doctor(lib)?,
        Commands::Config { command } => {
            cmd_config(command)?;
            0
        }
        Commands::Probe => {
            probe::cmd_probe()?;
            0
        }
    };

    if code != 0 {
        log_cli_info!("Exiting with failure", code = code);
        std::process::exit(code);
    }
    Ok(())
}

fn cmd_config(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            let config = nameguard_config::config().clone();
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigCommands::Path => {
            match Config::global_config_path() {
                Some(p) => println!("Global:  {}", p.display()),
                None => println!("Global:  (no home directory)"),
            }
            println!("Project: .nameguard/config.toml");
        }
    }
    Ok(())
}
