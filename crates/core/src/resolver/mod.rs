//! Locating external tools (ffmpeg, ffprobe, soffice) at call time.
//!
//! Resolution never fails: when every candidate location misses, the bare
//! tool name is returned and the operating system gets the final say when
//! the process is spawned.

mod env;
mod tool;

pub use env::{ResolverEnv, BUNDLE_DIR_ENV};
pub use tool::ToolSpec;

use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::converter::ConverterConfig;

/// Where a resolved executable was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionOrigin {
    /// Explicit path from configuration.
    Configured,
    /// The application's bundled-resources directory.
    Bundled,
    /// The current working directory.
    CurrentDir,
    /// A directory on the executable search path.
    SearchPath,
    /// A well-known installation root.
    InstallDir,
    /// A `bin` directory under a search path entry named after the tool.
    SearchPathHeuristic,
    /// Nothing found; the bare name is left to the OS.
    BareName,
}

impl fmt::Display for ResolutionOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResolutionOrigin::Configured => "configured",
            ResolutionOrigin::Bundled => "bundled",
            ResolutionOrigin::CurrentDir => "current_dir",
            ResolutionOrigin::SearchPath => "search_path",
            ResolutionOrigin::InstallDir => "install_dir",
            ResolutionOrigin::SearchPathHeuristic => "search_path_heuristic",
            ResolutionOrigin::BareName => "bare_name",
        };
        f.write_str(s)
    }
}

/// A resolved tool ready to be launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableHandle {
    tool: &'static str,
    path: PathBuf,
    origin: ResolutionOrigin,
}

impl ExecutableHandle {
    pub fn tool(&self) -> &'static str {
        self.tool
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn origin(&self) -> ResolutionOrigin {
        self.origin
    }

    /// Builds a command for this executable with stdin closed.
    ///
    /// The child is killed if the command's future is dropped.
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.path);
        command.stdin(Stdio::null()).kill_on_drop(true);
        command
    }
}

/// Finds executables using a fixed search order:
///
/// 1. configured override
/// 2. bundle directory (tool root, then the tool's subdirectories)
/// 3. current working directory
/// 4. executable search path
/// 5. install roots, under `<root>/<family>/<subdir>`
/// 6. `bin` directories beneath search path entries named after the tool family
/// 7. the bare name
#[derive(Debug, Clone, Default)]
pub struct ExecutableResolver {
    snapshot: Option<ResolverEnv>,
    bundle_dir: Option<PathBuf>,
    extra_install_roots: Vec<PathBuf>,
    overrides: HashMap<&'static str, PathBuf>,
}

impl ExecutableResolver {
    /// Resolver that re-reads the process environment on every lookup.
    pub fn from_config(config: &ConverterConfig) -> Self {
        let mut resolver = Self {
            snapshot: None,
            bundle_dir: config.bundle_dir.clone(),
            extra_install_roots: config.extra_install_roots.clone(),
            overrides: HashMap::new(),
        };
        if let Some(path) = &config.ffmpeg_path {
            resolver = resolver.with_override(ToolSpec::FFMPEG, path.clone());
        }
        if let Some(path) = &config.ffprobe_path {
            resolver = resolver.with_override(ToolSpec::FFPROBE, path.clone());
        }
        if let Some(path) = &config.soffice_path {
            resolver = resolver.with_override(ToolSpec::SOFFICE, path.clone());
        }
        resolver
    }

    /// Resolver pinned to a fixed environment.
    pub fn with_env(env: ResolverEnv) -> Self {
        Self {
            snapshot: Some(env),
            ..Default::default()
        }
    }

    /// Forces `tool` to resolve to `path`.
    pub fn with_override(mut self, tool: ToolSpec, path: PathBuf) -> Self {
        self.overrides.insert(tool.name, path);
        self
    }

    /// The environment a lookup made right now would search.
    pub fn environment(&self) -> ResolverEnv {
        match &self.snapshot {
            Some(env) => env.clone(),
            None => ResolverEnv::capture(self.bundle_dir.clone(), &self.extra_install_roots),
        }
    }

    /// Resolves a single tool against the current environment.
    pub fn resolve(&self, tool: ToolSpec) -> ExecutableHandle {
        self.resolve_in(&self.environment(), tool)
    }

    /// Resolves several tools against one environment snapshot.
    pub fn resolve_all<const N: usize>(&self, tools: [ToolSpec; N]) -> [ExecutableHandle; N] {
        let env = self.environment();
        tools.map(|tool| self.resolve_in(&env, tool))
    }

    fn resolve_in(&self, env: &ResolverEnv, tool: ToolSpec) -> ExecutableHandle {
        let (path, origin) = self.locate(env, tool);
        debug!(tool = tool.name, path = %path.display(), %origin, "Resolved executable");
        ExecutableHandle {
            tool: tool.name,
            path,
            origin,
        }
    }

    fn locate(&self, env: &ResolverEnv, tool: ToolSpec) -> (PathBuf, ResolutionOrigin) {
        if let Some(path) = self.overrides.get(tool.name) {
            return (path.clone(), ResolutionOrigin::Configured);
        }

        let file_name = tool.file_name();

        if let Some(bundle) = &env.bundle_dir {
            if let Some(path) = tool.find_under(bundle, &file_name) {
                return (path, ResolutionOrigin::Bundled);
            }
        }

        if let Some(cwd) = &env.current_dir {
            let candidate = cwd.join(&file_name);
            if is_executable_file(&candidate) {
                return (candidate, ResolutionOrigin::CurrentDir);
            }
        }

        if let Some(path) = search_path_lookup(env, tool.name) {
            return (path, ResolutionOrigin::SearchPath);
        }

        for root in &env.install_roots {
            if let Some(path) = tool.find_under(&root.join(tool.install_dir), &file_name) {
                return (path, ResolutionOrigin::InstallDir);
            }
        }

        if let Some(path) = family_bin_lookup(env, tool, &file_name) {
            return (path, ResolutionOrigin::SearchPathHeuristic);
        }

        (PathBuf::from(file_name), ResolutionOrigin::BareName)
    }
}

fn search_path_lookup(env: &ResolverEnv, name: &str) -> Option<PathBuf> {
    if env.search_path.is_empty() {
        return None;
    }
    let joined: OsString = std::env::join_paths(&env.search_path).ok()?;
    let cwd = env
        .current_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    which::which_in(name, Some(joined), cwd).ok()
}

fn family_bin_lookup(env: &ResolverEnv, tool: ToolSpec, file_name: &str) -> Option<PathBuf> {
    let family = tool.family.to_ascii_lowercase();
    for dir in &env.search_path {
        let matches_family = dir
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.to_ascii_lowercase().contains(&family));
        if !matches_family {
            continue;
        }

        let direct = dir.join("bin").join(file_name);
        if is_executable_file(&direct) {
            return Some(direct);
        }

        let Ok(entries) = std::fs::read_dir(dir) else {
            continue;
        };
        let mut children: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        children.sort();
        for child in children {
            let candidate = child.join("bin").join(file_name);
            if is_executable_file(&candidate) {
                return Some(candidate);
            }
        }
    }
    None
}

#[cfg(unix)]
pub(crate) fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub(crate) fn is_executable_file(path: &Path) -> bool {
    path.is_file()
}
