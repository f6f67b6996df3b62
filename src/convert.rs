//! External formatter invocation.
//!
//! The [`Formatter`] trait is the seam between the pipeline and the program
//! that actually turns roff into HTML. The production implementation is
//! [`GroffFormatter`]; tests use a recording mock.
//!
//! ## Image placement
//!
//! `grohtml` renders tables, equations and pictures to image files. It writes
//! them relative to its current directory and references them with the same
//! relative path, so the child runs with its working directory set to the
//! category output directory and is told to use `images/` with a per-page
//! file prefix:
//!
//! ```text
//! groff -t -m mandoc -mwww -Thtml -P -Dimages -P -Ipic-
//!   → html.1/pic.html           <img src="images/pic-1.png">
//!   → html.1/images/pic-1.png
//! ```
//!
//! Only the child's working directory changes, never the parent's, so several
//! pages can render concurrently.

use crate::config::FormatterConfig;
use crate::naming;
use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("failed to run formatter '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Everything the formatter needs to render one page.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    /// Canonical page name, used for the image prefix.
    pub page: &'a str,
    pub source_text: &'a str,
    /// Category output directory; images are placed relative to it.
    pub work_dir: &'a Path,
    /// Image directory relative to `work_dir`.
    pub images_dir: &'a str,
}

/// Captured formatter result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub html: String,
    /// Whatever the formatter printed on stderr.
    pub diagnostics: String,
    /// Exit code, `None` when terminated by a signal.
    pub status: Option<i32>,
}

impl Rendered {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Renders a man page source to HTML.
pub trait Formatter: Sync {
    fn render(&self, request: &RenderRequest<'_>) -> Result<Rendered, ConvertError>;
}

/// Runs `groff` (or a compatible program) as a child process.
#[derive(Debug, Clone)]
pub struct GroffFormatter {
    program: String,
    args: Vec<String>,
}

impl GroffFormatter {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &FormatterConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Full argument list for a request: base args, then image placement.
    pub fn command_args(&self, request: &RenderRequest<'_>) -> Vec<String> {
        let mut args = self.args.clone();
        args.extend([
            "-P".to_string(),
            format!("-D{}", request.images_dir),
            "-P".to_string(),
            format!("-I{}", naming::image_prefix(request.page)),
        ]);
        args
    }
}

impl Formatter for GroffFormatter {
    fn render(&self, request: &RenderRequest<'_>) -> Result<Rendered, ConvertError> {
        let mut child = Command::new(&self.program)
            .args(self.command_args(request))
            .current_dir(request.work_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ConvertError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            io::Error::new(io::ErrorKind::BrokenPipe, "formatter stdin unavailable")
        })?;
        let input = request.source_text.as_bytes();

        // Feed stdin from a second thread so a chatty formatter cannot
        // deadlock on a full stdout pipe.
        let output = std::thread::scope(|scope| {
            let writer = scope.spawn(move || {
                // A formatter that exits early closes the pipe; its exit
                // status reports the problem.
                let _ = stdin.write_all(input);
            });
            let output = child.wait_with_output();
            let _ = writer.join();
            output
        })?;

        Ok(Rendered {
            html: String::from_utf8_lossy(&output.stdout).into_owned(),
            diagnostics: String::from_utf8_lossy(&output.stderr).into_owned(),
            status: output.status.code(),
        })
    }
}
