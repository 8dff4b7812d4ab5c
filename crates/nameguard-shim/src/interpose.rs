//! The interposed `prctl` entry point.
//!
//! Safety: this is the only symbol the shared object exports. It runs on the
//! caller's thread with whatever reentrancy the real `prctl` allows; it keeps
//! no state besides the memoized real address in [`crate::reals`].

use libc::{c_int, c_ulong};

use crate::reals::real_prctl;

/// `prctl` option that sets the calling thread's name.
pub const PR_SET_NAME: c_int = 15;

const _: () = assert!(PR_SET_NAME == libc::PR_SET_NAME);

/// What the shim does with a given `prctl` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Report success without touching the kernel.
    Suppress,
    /// Hand the call to the real `prctl`.
    Forward,
}

impl Disposition {
    #[inline(always)]
    pub const fn for_option(option: c_int) -> Self {
        if option == PR_SET_NAME {
            Self::Suppress
        } else {
            Self::Forward
        }
    }
}

/// Replacement for libc `prctl`.
///
/// `PR_SET_NAME` returns `0` and leaves the thread name alone. Every other
/// option reaches the real `prctl` with the same five arguments, and its
/// return value and `errno` come back unchanged.
///
/// # Safety
/// Same contract as `prctl(2)` for the forwarded options. Aborts if no real
/// `prctl` is loaded after the shim.
#[no_mangle]
pub unsafe extern "C" fn prctl(
    option: c_int,
    arg2: c_ulong,
    arg3: c_ulong,
    arg4: c_ulong,
    arg5: c_ulong,
) -> c_int {
    match Disposition::for_option(option) {
        Disposition::Suppress => 0,
        Disposition::Forward => real_prctl()(option, arg2, arg3, arg4, arg5),
    }
}
