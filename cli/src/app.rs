//! Application context — unified state passed to every command handler.

use std::path::PathBuf;

use anyhow::Result;

use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::state::state_dir;
use crate::output::OutputContext;

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Skip interactive prompts (also set by `CI` / `CONVOY_YES` env vars).
    pub yes: bool,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Process runner shared by the docker-facing adapters.
    pub runner: TokioCommandRunner,
    /// Convoy state directory (`~/.convoy` or `CONVOY_HOME`).
    pub state_dir: PathBuf,
    /// When `true`, skip interactive prompts and use defaults.
    pub non_interactive: bool,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the state directory cannot be resolved.
    pub fn new(flags: &AppFlags) -> Result<Self> {
        let ci_env = std::env::var("CI").is_ok() || std::env::var("CONVOY_YES").is_ok();
        Ok(Self {
            output: OutputContext::new(flags.no_color, flags.quiet),
            runner: TokioCommandRunner,
            state_dir: state_dir()?,
            non_interactive: flags.yes || ci_env,
        })
    }

    /// Ask the user for confirmation.
    ///
    /// When `non_interactive` is `true` (CI, `--yes` flag, or `CONVOY_YES`
    /// env), returns `default` immediately without prompting.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal prompt fails (e.g. no TTY available).
    pub fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        if self.non_interactive {
            return Ok(default);
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()?;
        Ok(confirmed)
    }
}
