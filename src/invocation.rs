use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Command as ProcessCommand, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use log::debug;
use thiserror::Error;

use crate::{interrupt, messages};

#[derive(Error, Debug)]
pub enum InvocationError {
    #[error("`{0}` was not found on the system path")]
    ToolNotFound(String),
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// A single call to an external tool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: HashMap<String, String>,
}

/// Exit state of a finished invocation
#[derive(Debug, Clone)]
pub struct Outcome {
    pub exit_code: i32,
    pub duration: Duration,
}

impl Outcome {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

impl Invocation {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = dir.into();
        self
    }

    #[must_use]
    pub fn envs(mut self, env: &HashMap<String, String>) -> Self {
        self.env
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    fn command(&self) -> ProcessCommand {
        let mut command = ProcessCommand::new(&self.program);
        command.args(&self.args).envs(&self.env);
        if !self.cwd.as_os_str().is_empty() {
            command.current_dir(&self.cwd);
        }
        command
    }

    fn spawn_error(&self, e: io::Error) -> InvocationError {
        if e.kind() == io::ErrorKind::NotFound {
            InvocationError::ToolNotFound(self.program.clone())
        } else {
            InvocationError::Spawn {
                program: self.program.clone(),
                source: e,
            }
        }
    }

    fn failure_banner(&self, exit_code: i32) -> String {
        messages::format_failure_message(&self.to_string(), exit_code)
    }

    /// Run the tool to completion.
    ///
    /// With `hide` set, stdout and stderr are captured and only replayed to
    /// stderr when the tool fails. Otherwise the child inherits both streams.
    ///
    /// Ctrl-C does not terminate pyfab while the tool runs; the tool receives
    /// it and its exit code is returned as usual.
    ///
    /// # Errors
    ///
    /// Returns `InvocationError::ToolNotFound` if the program cannot be found,
    /// or `InvocationError::Spawn` for any other spawn failure.
    pub fn run(&self, hide: bool) -> Result<Outcome, InvocationError> {
        debug!("Running `{self}` in {}", self.cwd.display());
        interrupt::install();
        let start = Instant::now();

        let outcome = if hide {
            let output = self
                .command()
                .stdin(Stdio::null())
                .output()
                .map_err(|e| self.spawn_error(e))?;
            let outcome = Outcome {
                exit_code: exit_code(output.status),
                duration: start.elapsed(),
            };
            if !outcome.success() {
                let mut stderr = io::stderr().lock();
                let _ = stderr.write_all(&output.stdout);
                let _ = stderr.write_all(&output.stderr);
                let _ = write!(stderr, "{}", self.failure_banner(outcome.exit_code));
            }
            outcome
        } else {
            eprint!("{}", messages::format_start_message(&self.to_string()));
            let status = self
                .command()
                .status()
                .map_err(|e| self.spawn_error(e))?;
            let outcome = Outcome {
                exit_code: exit_code(status),
                duration: start.elapsed(),
            };
            if outcome.success() {
                eprint!("{}", messages::format_success_message(outcome.duration));
            } else {
                eprint!("{}", self.failure_banner(outcome.exit_code));
            }
            outcome
        };

        Ok(outcome)
    }
}

/// Map a child's exit status to a shell-style exit code.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

fn needs_quoting(arg: &str) -> bool {
    arg.is_empty()
        || !arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./=:,+@%".contains(c))
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if needs_quoting(arg) {
                write!(f, " '{}'", arg.replace('\'', r"'\''"))?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_quotes_special_arguments() {
        let invocation = Invocation::new("tree")
            .args(["-v", "-I", "env|*pycache*", "--dirsfirst"])
            .arg("it's")
            .arg("");
        insta::assert_snapshot!(invocation.to_string(), @r"tree -v -I 'env|*pycache*' --dirsfirst 'it'\''s' ''");
    }

    #[test]
    fn test_failure_banner_names_full_command() {
        let banner = Invocation::new("tree").args(["-L", "2"]).failure_banner(3);
        assert!(banner.contains("tree -L 2 failed"), "got: {banner}");
        assert!(banner.contains("(exit code 3)"), "got: {banner}");
    }

    #[test]
    fn test_envs_merge() {
        let mut env = HashMap::new();
        env.insert("PYLINTHOME".to_string(), ".cache".to_string());
        let invocation = Invocation::new("python").envs(&env);
        assert_eq!(invocation.env.get("PYLINTHOME").map(String::as_str), Some(".cache"));
    }

    #[test]
    fn test_missing_tool_is_reported() {
        let result = Invocation::new("pyfab-test-no-such-tool").run(true);
        match result {
            Err(InvocationError::ToolNotFound(program)) => {
                assert_eq!(program, "pyfab-test-no-such-tool");
            }
            other => panic!("Expected ToolNotFound, got: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_code_is_propagated() {
        let outcome = Invocation::new("sh")
            .args(["-c", "exit 3"])
            .run(true)
            .unwrap();
        assert_eq!(outcome.exit_code, 3);
        assert!(!outcome.success());
    }

    #[cfg(unix)]
    #[test]
    fn test_runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker"), "").unwrap();
        let outcome = Invocation::new("sh")
            .args(["-c", "test -f marker"])
            .current_dir(dir.path())
            .run(true)
            .unwrap();
        assert!(outcome.success());
    }
}
