//! Zero-allocation diagnostics for the interposed call path.

/// Print a one-line diagnostic to stderr and abort the process.
///
/// Used only for deployment errors the shim cannot recover from. The message
/// is formatted into a stack buffer so this is safe to reach from inside an
/// interposed symbol, before the Rust runtime or the allocator is usable.
///
/// # Usage:
/// ```ignore
/// shim_fatal!("cannot resolve {}", "prctl");
/// ```
macro_rules! shim_fatal {
    ($($arg:tt)*) => {{
        use std::fmt::Write;
        let mut buf = [0u8; 512];
        let mut writer = $crate::macros::StackWriter::new(&mut buf);
        let pid = unsafe { libc::getpid() };
        let _ = write!(writer, "[nameguard][{}][FATAL] ", pid);
        let _ = write!(writer, $($arg)*);
        let _ = writeln!(writer);

        let msg = writer.as_str();
        unsafe {
            libc::write(2, msg.as_ptr() as *const libc::c_void, msg.len());
            libc::abort()
        }
    }};
}

/// `fmt::Write` sink over a caller-provided byte buffer.
///
/// Output past the end of the buffer is silently dropped.
pub struct StackWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> StackWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Written bytes as text. A write truncated in the middle of a
    /// multi-byte character is cut back to the last full character.
    pub fn as_str(&self) -> &str {
        let bytes = &self.buf[..self.pos];
        match std::str::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) => std::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or(""),
        }
    }

    #[cfg(test)]
    fn is_truncated(&self) -> bool {
        self.pos == self.buf.len()
    }
}

impl std::fmt::Write for StackWriter<'_> {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        let bytes = s.as_bytes();
        let remaining = self.buf.len() - self.pos;
        let to_copy = std::cmp::min(bytes.len(), remaining);
        self.buf[self.pos..self.pos + to_copy].copy_from_slice(&bytes[..to_copy]);
        self.pos += to_copy;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write;

    #[test]
    fn test_stack_writer_formats_into_buffer() {
        let mut buf = [0u8; 64];
        let mut w = StackWriter::new(&mut buf);
        write!(w, "[nameguard][{}] {}", 42, "prctl").unwrap();
        assert_eq!(w.as_str(), "[nameguard][42] prctl");
        assert!(!w.is_truncated());
    }

    #[test]
    fn test_stack_writer_drops_overflow() {
        let mut buf = [0u8; 8];
        let mut w = StackWriter::new(&mut buf);
        write!(w, "0123456789abcdef").unwrap();
        assert_eq!(w.as_str(), "01234567");
        assert!(w.is_truncated());
    }

    #[test]
    fn test_stack_writer_cuts_partial_utf8() {
        let mut buf = [0u8; 4];
        let mut w = StackWriter::new(&mut buf);
        // '€' is three bytes, only two of them fit
        write!(w, "ab€").unwrap();
        assert_eq!(w.as_str(), "ab");
    }
}
