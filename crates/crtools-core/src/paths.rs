//! Paths and helpers for running within a Chromium checkout.

use crate::error::ToolError;
use crate::Result;
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable that pins the checkout root.
pub const CHROMIUM_SRC_ENV: &str = "CHROMIUM_SRC";

/// Chromium source tree paths. Relative members are joined onto `root`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChromiumPaths {
    /// The chromium/src checkout root, as an absolute path.
    pub root: PathBuf,
}

impl ChromiumPaths {
    /// Locate the checkout from `CHROMIUM_SRC` or the current directory.
    pub fn discover() -> Result<ChromiumPaths> {
        if let Ok(root) = env::var(CHROMIUM_SRC_ENV) {
            return Ok(ChromiumPaths {
                root: PathBuf::from(root),
            });
        }
        Self::find_from(&env::current_dir()?)
    }

    /// Walk up from `start` until a directory looks like chromium/src.
    pub fn find_from(start: &Path) -> Result<ChromiumPaths> {
        start
            .ancestors()
            .find(|dir| is_checkout_root(dir))
            .map(|dir| ChromiumPaths {
                root: dir.to_path_buf(),
            })
            .ok_or_else(|| ToolError::CheckoutNotFound(start.to_path_buf()))
    }

    pub fn join(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root.join(rel)
    }

    /// tools/perf, home of pinpoint_cli and the pinboard cache.
    pub fn tools_perf(&self) -> PathBuf {
        self.join(TOOLS_PERF_DIR)
    }

    /// The Go swarming client shipped with the checkout.
    pub fn swarming_go(&self) -> PathBuf {
        self.join(LUCI_GO_DIR)
            .join(format!("swarming{}", env::consts::EXE_SUFFIX))
    }

    /// The checked-in JDK used to run D8.
    pub fn java_home(&self) -> PathBuf {
        self.join(JDK_DIR)
    }
}

fn is_checkout_root(dir: &Path) -> bool {
    dir.join(".gn").is_file() && dir.join("build").is_dir() && dir.join("testing").is_dir()
}

static TOOLS_PERF_DIR: &str = "tools/perf";
static LUCI_GO_DIR: &str = "tools/luci-go";
static JDK_DIR: &str = "third_party/jdk/current";
