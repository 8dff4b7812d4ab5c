//! # nameguard-shim
//!
//! LD_PRELOAD shim for `prctl(2)`.
//!
//! The shared object exports a single symbol, `prctl`. Because the dynamic
//! linker places preloaded objects ahead of libc in the global search order,
//! every `prctl` call in the host process (and in any library it loads) binds
//! here first:
//!
//! - `PR_SET_NAME` (15) returns `0` and the thread keeps its current name.
//! - Any other option is forwarded to the next `prctl` binding, found with
//!   `dlsym(RTLD_NEXT, "prctl")`, and its result is returned untouched.
//!
//! ```bash
//! LD_PRELOAD=target/release/libnameguard_shim.so ./app
//! ```
//!
//! ## Deployment precondition
//!
//! A real `prctl` must be loaded after this object (normally libc). If
//! `RTLD_NEXT` lookup fails the shim prints a diagnostic on stderr and aborts
//! the process instead of pretending the call succeeded.
//!
//! ## Constraints on the call path
//!
//! `prctl` can be reached very early (before `main`, from inside libc or a
//! thread runtime), so nothing here allocates, panics or takes a lock:
//! - formatting goes through [`macros::StackWriter`] on a stack buffer;
//! - output goes through `libc::write(2, ...)`;
//! - unrecoverable states end in `libc::abort()`.

// Macros must be defined before modules that use them
#[macro_use]
pub mod macros;

pub mod interpose;
pub mod reals;

pub use interpose::{prctl, Disposition, PR_SET_NAME};
