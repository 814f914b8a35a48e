//! The external package manager.
//!
//! Everything the rest of the crate knows about winget goes through the
//! [`PackageManager`] trait: listing calls hand back captured text, action
//! calls hand back an exit code. [`WingetCli`] is the real implementation;
//! tests substitute scripted fakes.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::debug;

use crate::model::types::BatchAction;

/// Flags that keep winget from stopping at agreement prompts.
const SOURCE_AGREEMENTS: &str = "--accept-source-agreements";
const PACKAGE_AGREEMENTS: &str = "--accept-package-agreements";

/// Errors raised when the package manager cannot be run at all. A non-zero
/// exit code is not an error; it is reported through [`ProcessOutput`] or the
/// returned code.
#[derive(Error, Debug)]
pub enum PackageManagerError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// One captured line, tagged with the stream it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
}

impl OutputLine {
    pub fn text(&self) -> &str {
        match self {
            OutputLine::Stdout(s) | OutputLine::Stderr(s) => s,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, OutputLine::Stderr(_))
    }
}

/// Exit code plus captured text of a listing call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub lines: Vec<OutputLine>,
}

impl ProcessOutput {
    /// Build from plain stdout text; handy for fakes.
    pub fn from_stdout(exit_code: i32, text: &str) -> Self {
        Self {
            exit_code,
            lines: text
                .lines()
                .map(|l| OutputLine::Stdout(clean_line(l)))
                .collect(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Both streams, stdout first.
    pub fn all_lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(OutputLine::text)
    }

    /// Only the non-error lines.
    pub fn stdout_lines(&self) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .filter(|l| !l.is_error())
            .map(OutputLine::text)
    }
}

/// Resolve spinner overwrites: winget redraws progress in place with `\r`, so
/// only the text after the last carriage return is what the user saw.
pub fn clean_line(raw: &str) -> String {
    let visible = raw.rsplit('\r').find(|seg| !seg.trim().is_empty()).unwrap_or("");
    visible.trim_end().to_string()
}

/// Operations the batch layer needs from a package manager.
pub trait PackageManager: Send + Sync {
    fn search(&self, query: &str) -> Result<ProcessOutput, PackageManagerError>;

    fn show(&self, id: &str) -> Result<ProcessOutput, PackageManagerError>;

    /// Installed packages, optionally narrowed by the tool's own query.
    fn list(&self, query: Option<&str>) -> Result<ProcessOutput, PackageManagerError>;

    /// Installed packages with a newer version available.
    fn upgrades(&self) -> Result<ProcessOutput, PackageManagerError>;

    fn install(&self, id: &str) -> Result<i32, PackageManagerError>;

    fn upgrade(&self, id: &str) -> Result<i32, PackageManagerError>;

    fn uninstall(&self, id: &str) -> Result<i32, PackageManagerError>;

    /// Dispatch on a [`BatchAction`].
    fn apply(&self, action: BatchAction, id: &str) -> Result<i32, PackageManagerError> {
        match action {
            BatchAction::Install => self.install(id),
            BatchAction::Upgrade => self.upgrade(id),
            BatchAction::Uninstall => self.uninstall(id),
        }
    }
}

/// Runs the real `winget` executable.
#[derive(Debug, Clone)]
pub struct WingetCli {
    program: PathBuf,
    install_args: Vec<String>,
    upgrade_args: Vec<String>,
    uninstall_args: Vec<String>,
}

impl WingetCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            install_args: Vec::new(),
            upgrade_args: Vec::new(),
            uninstall_args: Vec::new(),
        }
    }

    /// Use `explicit` if given, else the first `winget` on PATH, else the bare
    /// name and let the OS resolve it at spawn time.
    pub fn locate(explicit: Option<&Path>) -> Self {
        let program = explicit
            .map(Path::to_path_buf)
            .or_else(|| which::which("winget").ok())
            .unwrap_or_else(|| PathBuf::from("winget"));
        debug!(program = %program.display(), "using package manager");
        Self::new(program)
    }

    /// Extra arguments appended to every action of the given kind.
    pub fn with_extra_args(mut self, action: BatchAction, args: Vec<String>) -> Self {
        match action {
            BatchAction::Install => self.install_args = args,
            BatchAction::Upgrade => self.upgrade_args = args,
            BatchAction::Uninstall => self.uninstall_args = args,
        }
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn spawn_error(&self, source: std::io::Error) -> PackageManagerError {
        PackageManagerError::Spawn {
            program: self.program.display().to_string(),
            source,
        }
    }

    fn capture(&self, args: &[String]) -> Result<ProcessOutput, PackageManagerError> {
        debug!(program = %self.program.display(), ?args, "capturing");
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.spawn_error(e))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let lines = stdout
            .lines()
            .map(|l| OutputLine::Stdout(clean_line(l)))
            .chain(stderr.lines().map(|l| OutputLine::Stderr(clean_line(l))))
            .collect();

        Ok(ProcessOutput {
            exit_code: output.status.code().unwrap_or(-1),
            lines,
        })
    }

    fn run_interactive(&self, args: &[String]) -> Result<i32, PackageManagerError> {
        debug!(program = %self.program.display(), ?args, "running");
        let status = Command::new(&self.program)
            .args(args)
            .status()
            .map_err(|e| self.spawn_error(e))?;
        Ok(status.code().unwrap_or(-1))
    }

    pub(crate) fn action_args(&self, action: BatchAction, id: &str) -> Vec<String> {
        let mut args: Vec<String> = vec![
            action.verb().to_string(),
            "--id".into(),
            id.to_string(),
            "--exact".into(),
            SOURCE_AGREEMENTS.into(),
        ];
        let extra = match action {
            BatchAction::Install => {
                args.push(PACKAGE_AGREEMENTS.into());
                &self.install_args
            }
            BatchAction::Upgrade => {
                args.push(PACKAGE_AGREEMENTS.into());
                &self.upgrade_args
            }
            BatchAction::Uninstall => &self.uninstall_args,
        };
        args.extend(extra.iter().cloned());
        args
    }
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

impl PackageManager for WingetCli {
    fn search(&self, query: &str) -> Result<ProcessOutput, PackageManagerError> {
        self.capture(&strings(&["search", query, SOURCE_AGREEMENTS, "--disable-interactivity"]))
    }

    fn show(&self, id: &str) -> Result<ProcessOutput, PackageManagerError> {
        self.capture(&strings(&[
            "show",
            "--id",
            id,
            "--exact",
            SOURCE_AGREEMENTS,
            "--disable-interactivity",
        ]))
    }

    fn list(&self, query: Option<&str>) -> Result<ProcessOutput, PackageManagerError> {
        let mut args = strings(&["list", SOURCE_AGREEMENTS, "--disable-interactivity"]);
        if let Some(q) = query {
            args.push("--query".into());
            args.push(q.to_string());
        }
        self.capture(&args)
    }

    fn upgrades(&self) -> Result<ProcessOutput, PackageManagerError> {
        self.capture(&strings(&["upgrade", SOURCE_AGREEMENTS, "--disable-interactivity"]))
    }

    fn install(&self, id: &str) -> Result<i32, PackageManagerError> {
        self.run_interactive(&self.action_args(BatchAction::Install, id))
    }

    fn upgrade(&self, id: &str) -> Result<i32, PackageManagerError> {
        self.run_interactive(&self.action_args(BatchAction::Upgrade, id))
    }

    fn uninstall(&self, id: &str) -> Result<i32, PackageManagerError> {
        self.run_interactive(&self.action_args(BatchAction::Uninstall, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_line_keeps_text_after_last_carriage_return() {
        assert_eq!(clean_line("   - \r   \\ \rName   Id"), "Name   Id");
        assert_eq!(clean_line("plain line   "), "plain line");
        assert_eq!(clean_line("text\r   "), "text");
        assert_eq!(clean_line(""), "");
    }

    #[test]
    fn action_args_target_exact_id() {
        let cli = WingetCli::new("winget")
            .with_extra_args(BatchAction::Install, vec!["--scope".into(), "user".into()]);
        assert_eq!(
            cli.action_args(BatchAction::Install, "Acme.Widget"),
            vec![
                "install",
                "--id",
                "Acme.Widget",
                "--exact",
                "--accept-source-agreements",
                "--accept-package-agreements",
                "--scope",
                "user"
            ]
        );
        let uninstall = cli.action_args(BatchAction::Uninstall, "Acme.Widget");
        assert_eq!(uninstall[0], "uninstall");
        assert!(!uninstall.contains(&"--accept-package-agreements".to_string()));
        assert!(!uninstall.contains(&"--scope".to_string()));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let cli = WingetCli::new("/nonexistent/definitely-not-winget");
        let err = cli.search("anything").unwrap_err();
        assert!(matches!(err, PackageManagerError::Spawn { .. }));
        assert!(err.to_string().contains("definitely-not-winget"));
    }

    #[test]
    fn process_output_separates_streams() {
        let out = ProcessOutput {
            exit_code: 0,
            lines: vec![
                OutputLine::Stdout("Version: 1.0".into()),
                OutputLine::Stderr("warning: something".into()),
            ],
        };
        assert!(out.success());
        assert_eq!(out.all_lines().count(), 2);
        assert_eq!(out.stdout_lines().collect::<Vec<_>>(), vec!["Version: 1.0"]);
    }

    #[test]
    fn from_stdout_cleans_lines() {
        let out = ProcessOutput::from_stdout(1, "a\r b  \nc");
        assert!(!out.success());
        assert_eq!(out.all_lines().collect::<Vec<_>>(), vec![" b", "c"]);
    }
}
