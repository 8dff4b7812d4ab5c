//! Real Symbol Storage
//!
//! Resolves the next binding of an interposed name with `dlsym(RTLD_NEXT)`.
//! The search starts in the module loaded after ours, so the result is the
//! implementation the caller would have reached without the preload.
//!
//! The resolved address is memoized in an `AtomicPtr`. Two threads that race
//! on the first lookup both store the same address, so no further
//! synchronization is needed.

use libc::{c_int, c_ulong, c_void};
use std::ffi::CStr;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicPtr, Ordering};

/// Signature of the libc `prctl` wrapper as the shim calls it.
pub type PrctlFn = unsafe extern "C" fn(c_int, c_ulong, c_ulong, c_ulong, c_ulong) -> c_int;

/// Lazily resolved address of the next definition of `name`.
pub struct RealSymbol {
    ptr: AtomicPtr<c_void>,
    name: &'static CStr,
}

impl RealSymbol {
    pub const fn new(name: &'static CStr) -> Self {
        Self {
            ptr: AtomicPtr::new(std::ptr::null_mut()),
            name,
        }
    }

    #[cfg(test)]
    fn name(&self) -> &'static CStr {
        self.name
    }

    /// Look up the next binding, memoizing a hit.
    ///
    /// Returns `None` when no module after ours defines the symbol. A miss is
    /// not cached, so a library loaded later with `dlopen(RTLD_GLOBAL)` can
    /// still satisfy a subsequent lookup.
    ///
    /// # Safety
    /// Calls into the dynamic linker.
    pub unsafe fn lookup(&self) -> Option<NonNull<c_void>> {
        let p = self.ptr.load(Ordering::Acquire);
        if let Some(p) = NonNull::new(p) {
            return Some(p);
        }
        let f = NonNull::new(libc::dlsym(libc::RTLD_NEXT, self.name.as_ptr()))?;
        self.ptr.store(f.as_ptr(), Ordering::Release);
        Some(f)
    }

    /// Like [`lookup`](Self::lookup), but a miss is fatal.
    ///
    /// # Safety
    /// Calls into the dynamic linker. Aborts the process when the symbol is
    /// missing from every module after ours.
    pub unsafe fn get(&self) -> NonNull<c_void> {
        match self.lookup() {
            Some(p) => p,
            None => {
                let name = self.name.to_str().unwrap_or("?");
                let err = dlerror_str().unwrap_or("symbol not found");
                shim_fatal!(
                    "dlsym(RTLD_NEXT, \"{}\") failed: {}; no real {} is loaded after the shim",
                    name,
                    err,
                    name
                )
            }
        }
    }
}

/// Text of the calling thread's pending `dlerror()`, if any. Consumes it.
unsafe fn dlerror_str() -> Option<&'static str> {
    let e = libc::dlerror();
    if e.is_null() {
        return None;
    }
    CStr::from_ptr(e).to_str().ok()
}

pub static REAL_PRCTL: RealSymbol = RealSymbol::new(c"prctl");

/// Resolved libc `prctl`.
///
/// # Safety
/// See [`RealSymbol::get`].
#[inline]
pub unsafe fn real_prctl() -> PrctlFn {
    std::mem::transmute::<*mut c_void, PrctlFn>(REAL_PRCTL.get().as_ptr())
}
