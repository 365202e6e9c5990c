//! Environment-driven configuration, in the teacher's plain accessor-struct
//! style (cf. `MapLayer::new`-style constructors).

use std::path::PathBuf;

const DEFAULT_BIND: &str = "127.0.0.1:8080";

#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory for rule-family CSV files, codelist, and criteria.
    pub config_dir: PathBuf,
    /// Root directory under which each job gets `<job_id>/{meta.json,errors.ndjson,errors.idx}`.
    pub work_dir: PathBuf,
    /// Bind address for the (external) HTTP surface.
    pub bind_addr: String,
}

impl Config {
    /// Loads from `VALIDATION_CONFIG_DIR`, `VALIDATION_WORK_DIR`, `URLS`,
    /// falling back to `./config`, `./work`, and a loopback bind address.
    pub fn from_env() -> Self {
        Self {
            config_dir: std::env::var("VALIDATION_CONFIG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./config")),
            work_dir: std::env::var("VALIDATION_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./work")),
            bind_addr: std::env::var("URLS").unwrap_or_else(|_| DEFAULT_BIND.to_string()),
        }
    }

    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.work_dir.join(job_id)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_env_absent() {
        // SAFETY: test runs single-threaded within this process's env; no
        // concurrent test mutates these specific keys.
        unsafe {
            std::env::remove_var("VALIDATION_CONFIG_DIR");
            std::env::remove_var("VALIDATION_WORK_DIR");
            std::env::remove_var("URLS");
        }
        let cfg = Config::from_env();
        assert_eq!(cfg.config_dir, PathBuf::from("./config"));
        assert_eq!(cfg.bind_addr, DEFAULT_BIND);
    }

    #[test]
    fn job_dir_nests_under_work_dir() {
        let cfg = Config {
            config_dir: "cfg".into(),
            work_dir: "work".into(),
            bind_addr: DEFAULT_BIND.into(),
        };
        assert_eq!(cfg.job_dir("val_x"), PathBuf::from("work/val_x"));
    }
}
