//! Shim library discovery.
//!
//! `LD_PRELOAD` entries are resolved by the dynamic linker in the child's
//! working directory, so every path handed to it goes through
//! [`normalize_library`] first.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::LIBRARY_FILE_NAME;

/// Resolve a library path to an absolute, symlink-free path.
pub fn normalize_library(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    path.canonicalize()
        .with_context(|| format!("Failed to resolve shim library: {}", path.display()))
}

/// Normalize path, falling back to the original if canonicalization fails.
pub fn normalize_or_original(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Places the launcher looks for the shim, in priority order.
///
/// 1. `explicit` (`--lib`), then `configured` (config file / `NAMEGUARD_LIB`)
/// 2. next to the running executable
/// 3. `../lib/` relative to the executable's directory
/// 4. `target/debug` and `target/release` under `cwd` (development checkout)
pub fn library_candidates(
    explicit: Option<&Path>,
    configured: Option<&Path>,
    exe: Option<&Path>,
    cwd: &Path,
) -> Vec<PathBuf> {
    let mut out = Vec::new();
    out.extend(explicit.map(Path::to_path_buf));
    out.extend(configured.map(Path::to_path_buf));

    if let Some(exe_dir) = exe.and_then(Path::parent) {
        out.push(exe_dir.join(LIBRARY_FILE_NAME));
        // cargo puts test and example binaries one level down, in deps/
        if exe_dir.ends_with("deps") {
            if let Some(profile_dir) = exe_dir.parent() {
                out.push(profile_dir.join(LIBRARY_FILE_NAME));
            }
        }
        if let Some(prefix) = exe_dir.parent() {
            out.push(prefix.join("lib").join(LIBRARY_FILE_NAME));
        }
    }

    out.push(cwd.join("target/debug").join(LIBRARY_FILE_NAME));
    out.push(cwd.join("target/release").join(LIBRARY_FILE_NAME));
    out
}

/// Pick the shim library.
///
/// An explicit or configured path must exist; it is never silently replaced
/// by a library found elsewhere.
pub fn resolve_library(
    explicit: Option<&Path>,
    configured: Option<&Path>,
    exe: Option<&Path>,
    cwd: &Path,
) -> Result<PathBuf> {
    if let Some(path) = explicit.or(configured) {
        if !path.is_file() {
            anyhow::bail!("Shim library not found at {}", path.display());
        }
        return normalize_library(path);
    }

    for candidate in library_candidates(None, None, exe, cwd) {
        if candidate.is_file() {
            return normalize_library(&candidate);
        }
    }

    anyhow::bail!(
        "Could not find {}. Build it with 'cargo build -p nameguard-shim' or pass --lib.",
        LIBRARY_FILE_NAME
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_candidate_order() {
        let c = library_candidates(
            Some(Path::new("/explicit.so")),
            Some(Path::new("/configured.so")),
            Some(Path::new("/opt/nameguard/bin/nameguard")),
            Path::new("/work"),
        );
        assert_eq!(
            c,
            vec![
                PathBuf::from("/explicit.so"),
                PathBuf::from("/configured.so"),
                PathBuf::from("/opt/nameguard/bin/libnameguard_shim.so"),
                PathBuf::from("/opt/nameguard/lib/libnameguard_shim.so"),
                PathBuf::from("/work/target/debug/libnameguard_shim.so"),
                PathBuf::from("/work/target/release/libnameguard_shim.so"),
            ]
        );
    }

    #[test]
    fn test_candidates_from_deps_dir() {
        let c = library_candidates(
            None,
            None,
            Some(Path::new("/w/target/debug/deps/cli-1234")),
            Path::new("/w"),
        );
        assert_eq!(c[0], PathBuf::from("/w/target/debug/deps/libnameguard_shim.so"));
        assert_eq!(c[1], PathBuf::from("/w/target/debug/libnameguard_shim.so"));
    }

    #[test]
    fn test_resolve_prefers_sibling() {
        let temp = tempdir().unwrap();
        let bin = temp.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::write(bin.join(LIBRARY_FILE_NAME), b"\x7fELF").unwrap();

        let found =
            resolve_library(None, None, Some(&bin.join("nameguard")), temp.path()).unwrap();
        assert_eq!(found, normalize_or_original(bin.join(LIBRARY_FILE_NAME)));
    }

    #[test]
    fn test_resolve_missing_explicit_fails() {
        let temp = tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("target/debug")).unwrap();
        std::fs::write(temp.path().join("target/debug").join(LIBRARY_FILE_NAME), b"").unwrap();

        let err = resolve_library(
            Some(&temp.path().join("nope.so")),
            None,
            None,
            temp.path(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("nope.so"));
    }

    #[test]
    fn test_resolve_nothing_found() {
        let temp = tempdir().unwrap();
        let err = resolve_library(None, None, None, temp.path()).unwrap_err();
        assert!(err.to_string().contains(LIBRARY_FILE_NAME));
    }

    #[test]
    fn test_normalize_or_original_keeps_missing() {
        let p = Path::new("/definitely/not/here.so");
        assert_eq!(normalize_or_original(p), p);
    }
}
