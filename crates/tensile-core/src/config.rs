use std::sync::OnceLock;

use crate::error::{Error, Result};

/// Execution settings for the array kernels.
///
/// Kernels consult [`ExecConfig::current`]; call [`ExecConfig::install`]
/// once at start-up to override the defaults. Without an explicit install the
/// config is read from the environment on first use:
///
/// - `TENSILE_PARALLEL=0` disables the rayon paths
/// - `TENSILE_PARALLEL_THRESHOLD=<n>` sets the minimum element count for them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecConfig {
    /// Whether kernels may split work across the rayon thread pool.
    pub parallel: bool,
    /// Minimum number of output elements before a kernel goes parallel.
    pub parallel_threshold: usize,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            parallel_threshold: 1 << 15,
        }
    }
}

static CURRENT: OnceLock<ExecConfig> = OnceLock::new();

impl ExecConfig {
    pub fn parallel(mut self, p: bool) -> Self {
        self.parallel = p;
        self
    }

    pub fn parallel_threshold(mut self, n: usize) -> Self {
        self.parallel_threshold = n;
        self
    }

    /// Defaults overridden by `TENSILE_PARALLEL` / `TENSILE_PARALLEL_THRESHOLD`.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = std::env::var("TENSILE_PARALLEL") {
            cfg.parallel = !matches!(v.trim(), "0" | "false" | "off");
        }
        if let Some(n) = std::env::var("TENSILE_PARALLEL_THRESHOLD")
            .ok()
            .and_then(|v| v.trim().parse().ok())
        {
            cfg.parallel_threshold = n;
        }
        cfg
    }

    /// The process-wide config.
    pub fn current() -> &'static ExecConfig {
        CURRENT.get_or_init(Self::from_env)
    }

    /// Set the process-wide config. Fails once any kernel has already read it.
    pub fn install(self) -> Result<()> {
        CURRENT
            .set(self)
            .map_err(|_| Error::msg("execution config already initialised"))
    }

    /// Whether a kernel producing `elems` outputs should use rayon.
    pub fn go_parallel(&self, elems: usize) -> bool {
        self.parallel && elems >= self.parallel_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let cfg = ExecConfig::default().parallel(false).parallel_threshold(10);
        assert!(!cfg.go_parallel(100));
        let cfg = cfg.parallel(true);
        assert!(cfg.go_parallel(10));
        assert!(!cfg.go_parallel(9));
    }
}
