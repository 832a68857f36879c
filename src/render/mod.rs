//! Renderers turn a [`MetricQuery`] into query text.
//!
//! The orchestrator only sees the [`Renderer`] trait. The shipped
//! implementation, [`CommandRenderer`], delegates to an external semantic
//! layer executable: the query goes to the process's stdin as JSON and the
//! rendered text is read back from stdout.
//!
//! Rendering is blocking and has no timeout; a hung renderer hangs the pass.
//!
//! # Examples
//!
//! ```rust,no_run
//! use metricmat::render::{CommandRenderer, Renderer};
//! use metricmat::query::Invocation;
//!
//! # fn example() -> metricmat::core::Result<()> {
//! let invocation = Invocation::parse("model.shop.report", "m(metrics=['revenue'])")?;
//! let mut renderer = CommandRenderer::new("mf").arg("explain-json");
//! let sql = renderer.render(&invocation.query)?;
//! println!("{sql}");
//! # Ok(())
//! # }
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::core::{MaterializeError, Result};
use crate::query::MetricQuery;

/// Converts structured query parameters into rendered text.
pub trait Renderer {
    /// Render `query`.
    ///
    /// # Errors
    ///
    /// [`MaterializeError::Render`] for any engine-side failure. The
    /// orchestrator attaches the invocation's node id and text.
    fn render(&mut self, query: &MetricQuery) -> Result<String>;
}

impl<F> Renderer for F
where
    F: FnMut(&MetricQuery) -> Result<String>,
{
    fn render(&mut self, query: &MetricQuery) -> Result<String> {
        self(query)
    }
}

/// Renderer backed by an external executable.
///
/// The command receives the query as a JSON object on stdin, for example
/// `{"metrics":["revenue"],"dimensions":null,"group_by":["region"],...}`, and
/// must print the rendered text on stdout and exit with status 0.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    env_vars: Vec<(String, String)>,
}

impl CommandRenderer {
    /// Create a renderer that runs `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            env_vars: Vec::new(),
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run the command in `dir` instead of the current directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Set an environment variable for the child process.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// The command line, for log messages.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn render_error(&self, reason: impl std::fmt::Display) -> MaterializeError {
        MaterializeError::Render {
            reason: format!("`{}`: {reason}", self.command_line()),
        }
    }
}

impl Renderer for CommandRenderer {
    fn render(&mut self, query: &MetricQuery) -> Result<String> {
        let payload = serde_json::to_vec(query).map_err(|e| self.render_error(e))?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped());
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }

        tracing::debug!(target: "render", "Executing renderer: {}", self.command_line());
        let mut child = cmd.spawn().map_err(|e| self.render_error(format!("failed to start: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A renderer that ignores stdin may exit before reading it
            match stdin.write_all(&payload) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Err(e) => return Err(self.render_error(format!("failed to send query: {e}"))),
            }
        }

        let output = child.wait_with_output().map_err(|e| self.render_error(e))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let status = output
                .status
                .code()
                .map_or_else(|| "terminated by signal".to_string(), |c| format!("exit code {c}"));
            return Err(self.render_error(format!("{status}: {}", stderr.trim())));
        }

        String::from_utf8(output.stdout)
            .map_err(|_| self.render_error("output is not valid UTF-8"))
    }
}
