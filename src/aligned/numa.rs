//! Advisory NUMA page placement
//!
//! Linux only. Everywhere else [`is_available`] is false and [`bind`] reports
//! `Unsupported`, so callers fall back to ordinary allocation without
//! branching on the platform themselves.
//!
//! Bound buffers live in their own anonymous mapping. The policy then dies
//! with the `munmap` and never reaches heap pages shared with other
//! allocations.

use std::io;

/// Whether this host exposes NUMA nodes to userspace
pub fn is_available() -> bool {
    imp::is_available()
}

/// OS page size in bytes
pub fn page_size() -> usize {
    imp::page_size()
}

/// Highest node id the kernel will accept in a node mask
pub fn max_node() -> u32 {
    imp::max_node()
}

/// Map `len` bytes of zeroed, page-aligned anonymous memory
///
/// # Safety
/// `len` must be a non-zero multiple of [`page_size`]. The mapping must be
/// released with [`unmap`].
pub unsafe fn map(len: usize) -> io::Result<*mut u8> {
    imp::map(len)
}

/// Release a mapping created by [`map`]
///
/// # Safety
/// `ptr` and `len` must be exactly a live mapping returned by [`map`].
pub unsafe fn unmap(ptr: *mut u8, len: usize) -> io::Result<()> {
    imp::unmap(ptr, len)
}

/// Bind the pages covering `[ptr, ptr + len)` to `node`, migrating any
/// already-faulted pages
///
/// Nodes above [`max_node`] are rejected with `InvalidInput` before anything
/// is allocated for the node mask.
///
/// # Safety
/// `ptr` must be page aligned and the range must be whole pages of a single
/// live mapping from [`map`].
pub unsafe fn bind(ptr: *mut u8, len: usize, node: u32) -> io::Result<()> {
    imp::bind(ptr, len, node)
}

#[cfg(target_os = "linux")]
mod imp {
    use std::fs;
    use std::io;
    use std::path::Path;
    use std::sync::OnceLock;

    // <linux/mempolicy.h>
    const MPOL_BIND: libc::c_long = 2;
    const MPOL_MF_MOVE: libc::c_ulong = 1 << 1;

    pub fn is_available() -> bool {
        static AVAILABLE: OnceLock<bool> = OnceLock::new();
        *AVAILABLE.get_or_init(|| Path::new("/sys/devices/system/node/node0").exists())
    }

    pub fn page_size() -> usize {
        // SAFETY: sysconf has no memory-safety preconditions
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 {
            size as usize
        } else {
            4096
        }
    }

    pub fn max_node() -> u32 {
        static MAX_NODE: OnceLock<u32> = OnceLock::new();
        *MAX_NODE.get_or_init(|| {
            fs::read_to_string("/sys/devices/system/node/possible")
                .ok()
                .and_then(|possible| parse_max_node(&possible))
                // A node mask can never exceed one page of bits
                .unwrap_or((page_size() * 8 - 1) as u32)
        })
    }

    /// Last id of a sysfs node list such as `0-3` or `0,2-5`
    pub(super) fn parse_max_node(list: &str) -> Option<u32> {
        list.trim()
            .rsplit([',', '-'])
            .next()
            .and_then(|last| last.trim().parse().ok())
    }

    pub unsafe fn map(len: usize) -> io::Result<*mut u8> {
        let ptr = libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        );
        if ptr == libc::MAP_FAILED {
            Err(io::Error::last_os_error())
        } else {
            Ok(ptr.cast())
        }
    }

    pub unsafe fn unmap(ptr: *mut u8, len: usize) -> io::Result<()> {
        if libc::munmap(ptr.cast(), len) == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    pub unsafe fn bind(ptr: *mut u8, len: usize, node: u32) -> io::Result<()> {
        if len == 0 {
            return Ok(());
        }
        if node > max_node() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("NUMA node {} above highest possible node {}", node, max_node()),
            ));
        }

        let ulong_bits = libc::c_ulong::BITS as usize;
        let node = node as usize;
        let mut mask = vec![0 as libc::c_ulong; node / ulong_bits + 1];
        mask[node / ulong_bits] |= 1 << (node % ulong_bits);
        // The kernel ignores the last bit of maxnode, same as libnuma
        let max_node = (mask.len() * ulong_bits + 1) as libc::c_ulong;

        let rc = libc::syscall(
            libc::SYS_mbind,
            ptr as *mut libc::c_void,
            len as libc::c_ulong,
            MPOL_BIND,
            mask.as_ptr(),
            max_node,
            MPOL_MF_MOVE,
        );
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod imp {
    use std::io;

    fn unsupported() -> io::Error {
        io::Error::new(
            io::ErrorKind::Unsupported,
            "NUMA binding is not supported on this platform",
        )
    }

    pub fn is_available() -> bool {
        false
    }

    pub fn page_size() -> usize {
        4096
    }

    pub fn max_node() -> u32 {
        0
    }

    pub unsafe fn map(_len: usize) -> io::Result<*mut u8> {
        Err(unsupported())
    }

    pub unsafe fn unmap(_ptr: *mut u8, _len: usize) -> io::Result<()> {
        Err(unsupported())
    }

    pub unsafe fn bind(_ptr: *mut u8, _len: usize, _node: u32) -> io::Result<()> {
        Err(unsupported())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_power_of_two() {
        assert!(page_size().is_power_of_two());
        assert!(page_size() >= 4096);
    }

    #[test]
    fn zero_length_bind_is_noop_where_available() {
        if !is_available() {
            return;
        }
        let result = unsafe { bind(std::ptr::null_mut(), 0, 0) };
        assert!(result.is_ok());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn node_lists_parse_to_last_id() {
        assert_eq!(imp::parse_max_node("0\n"), Some(0));
        assert_eq!(imp::parse_max_node("0-3\n"), Some(3));
        assert_eq!(imp::parse_max_node("0,2-5"), Some(5));
        assert_eq!(imp::parse_max_node("0-1,4"), Some(4));
        assert_eq!(imp::parse_max_node(""), None);
    }

    #[test]
    fn node_above_limit_is_rejected() {
        if !is_available() {
            return;
        }
        let page = page_size();
        unsafe {
            let ptr = map(page).unwrap();
            let err = bind(ptr, page, u32::MAX).unwrap_err();
            assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
            unmap(ptr, page).unwrap();
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn mapping_is_zeroed_and_page_aligned() {
        let page = page_size();
        unsafe {
            let ptr = map(2 * page).unwrap();
            assert_eq!(ptr as usize % page, 0);
            let bytes = std::slice::from_raw_parts(ptr, 2 * page);
            assert!(bytes.iter().all(|&b| b == 0));
            unmap(ptr, 2 * page).unwrap();
        }
    }
}
