//! Unique names for per-pipeline host resources.
//!
//! The audio server and the filesystem are shared by every pipeline in the
//! process (and by other processes), so sink names and control endpoint paths
//! all come from one allocator. Uniqueness within the process is guaranteed by
//! a monotonic counter; the pid and a random salt keep separate processes and
//! restarts apart.

use rand::Rng;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Returns an identifier never handed out before by this process.
pub fn unique_id() -> String {
    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let salt: u32 = rand::rng().random();
    format!("{}-{seq}-{salt:08x}", std::process::id())
}

/// Names of the host resources owned by one pipeline instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceNames {
    pub sink_name: String,
    pub endpoint_path: PathBuf,
}

impl ResourceNames {
    /// Allocates a fresh sink name and control endpoint path sharing one id.
    pub fn allocate(sink_prefix: &str, socket_dir: &Path) -> Self {
        let id = unique_id();

        ResourceNames {
            sink_name: format!("{sink_prefix}-{id}"),
            endpoint_path: socket_dir.join(format!("dpy_mpv_{id}.sock")),
        }
    }
}
