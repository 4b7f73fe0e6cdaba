use std::path::PathBuf;

/// Environment variable naming the bundled-resources directory.
pub const BUNDLE_DIR_ENV: &str = "CONVERTINO_BUNDLE_DIR";

/// Snapshot of everything executable resolution looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolverEnv {
    pub bundle_dir: Option<PathBuf>,
    pub current_dir: Option<PathBuf>,
    pub search_path: Vec<PathBuf>,
    pub install_roots: Vec<PathBuf>,
}

impl ResolverEnv {
    /// Reads the live process environment.
    ///
    /// `bundle_dir` falls back to `CONVERTINO_BUNDLE_DIR`; `extra_roots` are
    /// searched after the platform's conventional install roots.
    pub fn capture(bundle_dir: Option<PathBuf>, extra_roots: &[PathBuf]) -> Self {
        let bundle_dir =
            bundle_dir.or_else(|| std::env::var_os(BUNDLE_DIR_ENV).map(PathBuf::from));
        let search_path = std::env::var_os("PATH")
            .map(|path| std::env::split_paths(&path).collect())
            .unwrap_or_default();

        let mut install_roots = default_install_roots();
        for root in extra_roots {
            if !install_roots.contains(root) {
                install_roots.push(root.clone());
            }
        }

        Self {
            bundle_dir,
            current_dir: std::env::current_dir().ok(),
            search_path,
            install_roots,
        }
    }
}

#[cfg(windows)]
fn default_install_roots() -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = ["ProgramFiles", "ProgramFiles(x86)"]
        .iter()
        .filter_map(|var| std::env::var_os(var).map(PathBuf::from))
        .collect();
    if let Some(local) = std::env::var_os("LOCALAPPDATA") {
        roots.push(PathBuf::from(local).join("Programs"));
    }
    if let Some(profile) = std::env::var_os("USERPROFILE") {
        roots.push(PathBuf::from(profile));
    }
    for drive in ["C:\\", "D:\\"] {
        let drive = PathBuf::from(drive);
        if !roots.contains(&drive) {
            roots.push(drive);
        }
    }
    roots
}

#[cfg(not(windows))]
fn default_install_roots() -> Vec<PathBuf> {
    let mut roots = vec![
        PathBuf::from("/usr/local"),
        PathBuf::from("/opt/homebrew"),
        PathBuf::from("/opt"),
        PathBuf::from("/usr/lib"),
    ];
    if let Some(home) = std::env::var_os("HOME") {
        let home = PathBuf::from(home);
        roots.push(home.join(".local"));
        roots.push(home);
    }
    roots
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_prefers_explicit_bundle_dir() {
        let env = ResolverEnv::capture(Some(PathBuf::from("/srv/bundle")), &[]);
        assert_eq!(env.bundle_dir, Some(PathBuf::from("/srv/bundle")));
    }

    #[test]
    fn test_capture_appends_extra_roots_once() {
        let extra = PathBuf::from("/srv/tools");
        let env = ResolverEnv::capture(None, &[extra.clone(), extra.clone()]);
        assert_eq!(env.install_roots.iter().filter(|r| **r == extra).count(), 1);
        assert_eq!(env.install_roots.last(), Some(&extra));
    }
}
