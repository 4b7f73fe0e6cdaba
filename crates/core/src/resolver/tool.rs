use std::path::{Path, PathBuf};

use super::is_executable_file;

/// Static description of an external tool and where it is usually laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSpec {
    /// Executable name without platform suffix.
    pub name: &'static str,
    /// Substring identifying the tool's distribution directories.
    pub family: &'static str,
    /// Directory name under an install root.
    pub install_dir: &'static str,
    /// Subdirectories checked below a root, in order. `""` is the root itself.
    pub subdirs: &'static [&'static str],
}

impl ToolSpec {
    pub const FFMPEG: ToolSpec = ToolSpec {
        name: "ffmpeg",
        family: "ffmpeg",
        install_dir: "ffmpeg",
        subdirs: &["", "bin"],
    };

    pub const FFPROBE: ToolSpec = ToolSpec {
        name: "ffprobe",
        family: "ffmpeg",
        install_dir: "ffmpeg",
        subdirs: &["", "bin"],
    };

    pub const SOFFICE: ToolSpec = ToolSpec {
        name: "soffice",
        family: "libreoffice",
        install_dir: "LibreOffice",
        subdirs: &["", "program", "bin"],
    };

    /// Platform file name, e.g. `ffmpeg.exe` on Windows.
    pub fn file_name(&self) -> String {
        format!("{}{}", self.name, std::env::consts::EXE_SUFFIX)
    }

    pub(crate) fn find_under(&self, root: &Path, file_name: &str) -> Option<PathBuf> {
        self.subdirs
            .iter()
            .map(|sub| {
                if sub.is_empty() {
                    root.join(file_name)
                } else {
                    root.join(sub).join(file_name)
                }
            })
            .find(|candidate| is_executable_file(candidate))
    }
}
