//! Shell-script stand-ins for ffprobe, ffmpeg and soffice.

use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::converter::{ConversionEngine, ConverterConfig};
use crate::resolver::{ExecutableResolver, ResolverEnv, ToolSpec};

/// A temporary directory of fake tools plus a resolver that only sees it.
#[derive(Debug)]
pub struct FakeToolchain {
    dir: TempDir,
}

impl FakeToolchain {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            dir: TempDir::new()?,
        })
    }

    pub fn bin_dir(&self) -> &Path {
        self.dir.path()
    }

    /// Resolver whose only search location is [`Self::bin_dir`].
    pub fn resolver(&self) -> ExecutableResolver {
        ExecutableResolver::with_env(ResolverEnv {
            search_path: vec![self.bin_dir().to_path_buf()],
            ..Default::default()
        })
    }

    /// Engine wired to this toolchain.
    pub fn engine(&self, config: ConverterConfig) -> ConversionEngine {
        ConversionEngine::with_resolver(config, self.resolver())
    }

    /// `ffprobe` that prints `stdout` and exits 0.
    pub fn install_prober(&self, stdout: &str) -> io::Result<PathBuf> {
        let body = format!("printf '%s\\n' {}\nexit 0\n", shell_quote(stdout));
        self.install_script(ToolSpec::FFPROBE.name, &body)
    }

    /// `ffmpeg` following `script`.
    pub fn install_transcoder(&self, script: TranscoderScript) -> io::Result<PathBuf> {
        self.install_script(ToolSpec::FFMPEG.name, &script.render())
    }

    /// `soffice` following `behaviour`.
    pub fn install_office(&self, behaviour: OfficeBehaviour) -> io::Result<PathBuf> {
        self.install_script(ToolSpec::SOFFICE.name, &behaviour.render())
    }

    /// Writes an executable `/bin/sh` script named `name`.
    pub fn install_script(&self, name: &str, body: &str) -> io::Result<PathBuf> {
        let path = self.bin_dir().join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}"))?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
        Ok(path)
    }
}

/// Behaviour of the fake transcoder. The target is always the last argument.
#[derive(Debug, Clone)]
pub struct TranscoderScript {
    stderr: Vec<String>,
    stdout: Vec<String>,
    output: Option<String>,
    exit_code: i32,
    hang: bool,
    pid_file: Option<PathBuf>,
    marker_file: Option<PathBuf>,
}

impl Default for TranscoderScript {
    fn default() -> Self {
        Self {
            stderr: Vec::new(),
            stdout: Vec::new(),
            output: Some("fake media payload".to_string()),
            exit_code: 0,
            hang: false,
            pid_file: None,
            marker_file: None,
        }
    }
}

impl TranscoderScript {
    /// Writes a non-empty target and exits 0.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stderr_line(mut self, line: &str) -> Self {
        self.stderr.push(format!("{line}\n"));
        self
    }

    /// Raw stderr text, e.g. carriage-return separated status updates.
    pub fn stderr_raw(mut self, text: &str) -> Self {
        self.stderr.push(text.to_string());
        self
    }

    pub fn stdout_line(mut self, line: &str) -> Self {
        self.stdout.push(line.to_string());
        self
    }

    pub fn without_output(mut self) -> Self {
        self.output = None;
        self
    }

    pub fn exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    /// Replace itself with `sleep 30` after writing output.
    pub fn hang(mut self) -> Self {
        self.hang = true;
        self
    }

    /// Record the process id in `path`.
    pub fn pid_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.pid_file = Some(path.into());
        self
    }

    /// Touch `path` when started.
    pub fn marker_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.marker_file = Some(path.into());
        self
    }

    fn render(&self) -> String {
        let mut body = String::from("for last; do :; done\n");
        if let Some(marker) = &self.marker_file {
            body.push_str(&format!(": > {}\n", shell_quote_path(marker)));
        }
        if let Some(pid) = &self.pid_file {
            body.push_str(&format!("echo $$ > {}\n", shell_quote_path(pid)));
        }
        if let Some(output) = &self.output {
            body.push_str(&format!("printf '%s' {} > \"$last\"\n", shell_quote(output)));
        }
        for chunk in &self.stderr {
            body.push_str(&format!("printf '%s' {} >&2\n", shell_quote(chunk)));
        }
        for line in &self.stdout {
            body.push_str(&format!("printf '%s\\n' {}\n", shell_quote(line)));
        }
        if self.hang {
            body.push_str("exec sleep 30\n");
        }
        body.push_str(&format!("exit {}\n", self.exit_code));
        body
    }
}

/// Behaviour of the fake office suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfficeBehaviour {
    /// Copies the input to `<outdir>/<stem>.<ext>` and exits 0.
    CopyInput,
    /// Exits 0 without producing anything.
    SilentNoOutput,
    /// Prints `stderr` and exits with `code`.
    Fail { code: i32, stderr: String },
    /// Sleeps until killed.
    Hang,
}

impl OfficeBehaviour {
    fn render(&self) -> String {
        match self {
            OfficeBehaviour::CopyInput => r#"ext=""; outdir=""; src=""
while [ $# -gt 0 ]; do
  case "$1" in
    --convert-to) ext="$2"; shift 2 ;;
    --outdir) outdir="$2"; shift 2 ;;
    --*) shift ;;
    *) src="$1"; shift ;;
  esac
done
name=$(basename "$src")
cp "$src" "$outdir/${name%.*}.$ext"
echo "convert $src -> $outdir/${name%.*}.$ext"
exit 0
"#
            .to_string(),
            OfficeBehaviour::SilentNoOutput => "exit 0\n".to_string(),
            OfficeBehaviour::Fail { code, stderr } => {
                format!("printf '%s\\n' {} >&2\nexit {code}\n", shell_quote(stderr))
            }
            OfficeBehaviour::Hang => "exec sleep 30\n".to_string(),
        }
    }
}

fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "'\\''"))
}

fn shell_quote_path(path: &Path) -> String {
    shell_quote(&path.to_string_lossy())
}
