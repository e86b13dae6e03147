use std::fs;
use std::path::{Path, PathBuf};

use crate::error::LaunchError;

/// Text shown when the client launches without naming a program.
const SYNTHETIC_CONTENT: &str = "// Hello Debugger!

This is a synthetic source file provided by the DAP debugger.

You can set breakpoints, and single line step.

You may also notice that the locals contains a single variable for the currently executing line number.";

const SYNTHETIC_NAME: &str = "HelloDebuggerSource";

/// The document the debuggee "executes". Immutable once loaded.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    path: Option<PathBuf>,
    content: String,
    reference_id: i64,
    lines: Vec<String>,
}

impl SourceDocument {
    pub fn load(path: impl AsRef<Path>, reference_id: i64) -> Result<Self, LaunchError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| LaunchError::SourceUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::build(Some(path.to_path_buf()), content, reference_id))
    }

    pub fn from_text(content: impl Into<String>, reference_id: i64) -> Self {
        Self::build(None, content.into(), reference_id)
    }

    pub fn synthetic(reference_id: i64) -> Self {
        Self::from_text(SYNTHETIC_CONTENT, reference_id)
    }

    fn build(path: Option<PathBuf>, content: String, reference_id: i64) -> Self {
        let lines = content.lines().map(str::to_owned).collect();
        Self {
            path,
            content,
            reference_id,
            lines,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn name(&self) -> String {
        self.path
            .as_deref()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| SYNTHETIC_NAME.to_string())
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn reference_id(&self) -> i64 {
        self.reference_id
    }

    /// Number of lines, never less than one so the cursor always has a home.
    pub fn line_count(&self) -> i64 {
        self.lines.len().max(1) as i64
    }

    /// 1-based line lookup.
    pub fn line(&self, line: i64) -> Option<&str> {
        let index = usize::try_from(line.checked_sub(1)?).ok()?;
        self.lines.get(index).map(String::as_str)
    }

    pub fn is_blank(&self, line: i64) -> bool {
        self.line(line).map_or(true, |text| text.trim().is_empty())
    }
}
