//! # nameguard probe
//!
//! Self-test run inside a process that may have the shim preloaded.
//! `doctor` spawns this binary with `LD_PRELOAD` set and reads the JSON
//! report from stdout.

use std::ffi::CStr;

use anyhow::{Context, Result};
use libc::{c_int, c_long, c_ulong};
use serde::{Deserialize, Serialize};

const TASK_COMM_LEN: usize = 16;

/// Name the probe tries to give itself.
pub const PROBE_NAME: &str = "nameguard-probe";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReport {
    /// Thread name before the rename attempt
    pub before: String,
    /// Thread name after the rename attempt
    pub after: String,
    /// Return value of `prctl(PR_SET_NAME, PROBE_NAME)`
    pub set_result: c_int,
    /// Object that `prctl` resolves to in this process
    pub provider: Option<String>,
    /// `PR_GET_DUMPABLE` through `prctl` equals the raw syscall
    pub passthrough_ok: bool,
}

impl ProbeReport {
    /// Rename attempt reported success but the name did not change.
    pub fn suppressed(&self) -> bool {
        self.set_result == 0 && self.before == self.after && self.after != PROBE_NAME
    }
}

pub fn cmd_probe() -> Result<()> {
    let report = run_probe()?;
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

/// Run the probe on a scratch thread so the main thread's name is untouched
/// even when no shim is loaded.
pub fn run_probe() -> Result<ProbeReport> {
    std::thread::Builder::new()
        .spawn(probe_current_thread)
        .context("spawn probe thread")?
        .join()
        .map_err(|_| anyhow::anyhow!("probe thread panicked"))?
}

fn probe_current_thread() -> Result<ProbeReport> {
    let before = thread_name()?;

    let name = format!("{}\0", PROBE_NAME);
    let set_result = unsafe { libc::prctl(libc::PR_SET_NAME, name.as_ptr() as c_ulong) };

    let after = thread_name()?;

    let ours = unsafe { libc::prctl(libc::PR_GET_DUMPABLE) } as c_long;
    let raw = unsafe {
        libc::syscall(
            libc::SYS_prctl,
            libc::PR_GET_DUMPABLE as c_long,
            0 as c_ulong,
            0 as c_ulong,
            0 as c_ulong,
            0 as c_ulong,
        )
    };

    Ok(ProbeReport {
        before,
        after,
        set_result,
        provider: prctl_provider(),
        passthrough_ok: ours == raw,
    })
}

fn thread_name() -> Result<String> {
    let mut buf = [0u8; TASK_COMM_LEN];
    let rc = unsafe { libc::prctl(libc::PR_GET_NAME, buf.as_mut_ptr() as c_ulong) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error()).context("prctl(PR_GET_NAME)");
    }
    let name = CStr::from_bytes_until_nul(&buf).context("thread name not terminated")?;
    Ok(name.to_string_lossy().into_owned())
}

/// Path of the loaded object whose `prctl` wins global symbol resolution.
pub fn prctl_provider() -> Option<String> {
    unsafe {
        let sym = libc::dlsym(libc::RTLD_DEFAULT, c"prctl".as_ptr());
        if sym.is_null() {
            return None;
        }
        symbol_object(sym)
    }
}

/// Path of the object that contains `addr`.
///
/// # Safety
/// `addr` must be an address obtained from the dynamic linker.
pub unsafe fn symbol_object(addr: *const libc::c_void) -> Option<String> {
    let mut info: libc::Dl_info = std::mem::zeroed();
    if libc::dladdr(addr, &mut info) == 0 || info.dli_fname.is_null() {
        return None;
    }
    Some(CStr::from_ptr(info.dli_fname).to_string_lossy().into_owned())
}
