//! External commands (psql, supervisorctl, manage.py, ...) behind a trait so
//! the restore pipeline and bulk loaders can be driven by a script in tests.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub current_dir: Option<PathBuf>,
    pub stdin: Option<Vec<u8>>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Program and arguments, for log lines
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessOutput {
    /// `None` when the process was killed by a signal
    pub code: Option<i32>,
    /// Non-empty stdout lines
    pub lines: Vec<String>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn has_output(&self) -> bool {
        !self.lines.is_empty()
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion. Only a failure to start the process is an error;
    /// a non-zero exit is reported through `ProcessOutput::code`.
    async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput>;
}

/// Runs commands on the host
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput> {
        tracing::debug!("Running: {}", spec.display());

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(if spec.stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &spec.current_dir {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .with_context(|| format!("Failed to start {}", spec.program))?;

        let writer = match (child.stdin.take(), spec.stdin.clone()) {
            (Some(mut stdin), Some(input)) => Some(tokio::spawn(async move {
                let result = stdin.write_all(&input).await;
                drop(stdin);
                result
            })),
            _ => None,
        };

        let output = child
            .wait_with_output()
            .await
            .with_context(|| format!("Failed to wait for {}", spec.program))?;

        if let Some(writer) = writer {
            match writer.await {
                Ok(Err(e)) => tracing::debug!("{}: stdin closed early: {}", spec.program, e),
                Err(e) => tracing::debug!("{}: stdin writer failed: {}", spec.program, e),
                Ok(Ok(())) => {}
            }
        }

        for line in String::from_utf8_lossy(&output.stderr).lines() {
            tracing::debug!("{}: {}", spec.program, line);
        }

        let lines = String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string)
            .collect();

        Ok(ProcessOutput {
            code: output.status.code(),
            lines,
        })
    }
}
