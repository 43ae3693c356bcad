use derive_more::{Display, From};
use log::{debug, info, warn};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use tokio::io::{self, AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::process::Command;
use tokio::select;

#[derive(Debug, From, Display)]
pub enum CommandError {
    #[display(fmt = "IO Error occurred while executing command: {}", _0)]
    IO(io::Error),
    #[from(ignore)]
    #[display(fmt = "Provided command string didn't contain a command. (Was it empty?)")]
    MissingCommand,
    #[from(ignore)]
    #[display(fmt = "`{}` exited with non-zero exit code: Code {}", command, code)]
    NonZeroExitCode { command: String, code: i32 },
}

impl std::error::Error for CommandError {}

pub type CommandResult<T> = Result<T, CommandError>;

/// Where the output streams of a spawned command end up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    /// Both streams are inherited from this process
    Inherit,
    /// Standard output is discarded, standard error is inherited
    Quiet,
    /// Both streams are forwarded line by line to the log, each
    /// line prefixed with the provided name
    Log(&'static str),
}

/// Output of a command that was run to completion with both of
/// its streams captured. The exit status is not checked.
#[derive(Debug)]
pub struct Captured {
    pub command: String,
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl Captured {
    /// Turns a non-zero exit status into an error
    pub fn check(self) -> CommandResult<Self> {
        check_status(&self.command, self.status)?;
        Ok(self)
    }
}

/// Executes the provided command in the provided working directory
/// with both output streams inherited. The command is a format string
/// which can contain format arguments (i.e. {0} {1}) these values are
/// provided in the `args_in` slice
pub async fn run_command(
    working_dir: impl AsRef<Path>,
    command: &str,
    args_in: &[&str],
) -> CommandResult<()> {
    run_command_format(working_dir, command, args_in, Output::Inherit).await
}

/// Executes the formatted command and fails if it exits with a
/// non-zero exit code
pub async fn run_command_format(
    working_dir: impl AsRef<Path>,
    command: &str,
    args_in: &[&str],
    output: Output,
) -> CommandResult<()> {
    let (line, status) = spawn_command(working_dir, command, args_in, output).await?;
    check_status(&line, status)
}

/// Executes the formatted command and returns the command line that
/// was run along with its exit status, leaving the status unchecked
pub async fn spawn_command(
    working_dir: impl AsRef<Path>,
    command: &str,
    args_in: &[&str],
    output: Output,
) -> CommandResult<(String, ExitStatus)> {
    let (mut command, line) = build_command(working_dir.as_ref(), command, args_in)?;
    let status = match output {
        Output::Inherit => command.status().await?,
        Output::Quiet => command.stdout(Stdio::null()).status().await?,
        Output::Log(prefix) => pipe_and_wait(command, prefix).await?,
    };
    Ok((line, status))
}

/// Executes the formatted command capturing both of its output streams
pub async fn capture_command(
    working_dir: impl AsRef<Path>,
    command: &str,
    args_in: &[&str],
) -> CommandResult<Captured> {
    let (mut command, line) = build_command(working_dir.as_ref(), command, args_in)?;
    let output = command.stdin(Stdio::null()).output().await?;
    Ok(Captured {
        command: line,
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

fn check_status(command: &str, status: ExitStatus) -> CommandResult<()> {
    if status.success() {
        return Ok(());
    }
    Err(exit_error(command, status))
}

/// Creates the error for a command that exited with `status`
pub fn exit_error(command: &str, status: ExitStatus) -> CommandError {
    CommandError::NonZeroExitCode {
        command: command.to_string(),
        // No code means the process was killed by a signal
        code: status.code().unwrap_or(-1),
    }
}

/// Creates the process builder for the formatted command returning
/// it alongside the full command line for error reporting
fn build_command(
    working_dir: &Path,
    command: &str,
    args_in: &[&str],
) -> CommandResult<(Command, String)> {
    let (cmd, args) = split_command(command).ok_or(CommandError::MissingCommand)?;
    let args = transform_args(args, args_in);

    let mut line = cmd.to_string();
    for arg in &args {
        line.push(' ');
        line.push_str(arg);
    }
    debug!("Running `{line}` in {working_dir:?}");

    let mut command = Command::new(cmd);
    command.args(&args);
    command.current_dir(working_dir);

    // Fail on missing credentials instead of blocking on a prompt
    const GIT_PROMPT_ENV: &str = "GIT_TERMINAL_PROMPT";
    if std::env::var(GIT_PROMPT_ENV).is_err() {
        command.env(GIT_PROMPT_ENV, "0");
    }

    Ok((command, line))
}

/// Line reader over an optional child stream which reports
/// itself closed once the stream has reached its end
struct LineReader<V> {
    lines: Option<Lines<BufReader<V>>>,
}

impl<V> LineReader<V>
where
    V: Unpin + AsyncRead,
{
    fn new(value: Option<V>) -> Self {
        Self {
            lines: value.map(|value| BufReader::new(value).lines()),
        }
    }

    fn is_open(&self) -> bool {
        self.lines.is_some()
    }

    async fn next_line(&mut self) -> io::Result<Option<String>> {
        let Some(lines) = self.lines.as_mut() else {
            return Ok(None);
        };
        let line = lines.next_line().await?;
        if line.is_none() {
            self.lines = None;
        }
        Ok(line)
    }
}

/// Spawns the command child piping its output to the logging for
/// the application and waiting until the process exits returning the
/// exit status of the program or an Error
async fn pipe_and_wait(mut command: Command, prefix: &str) -> CommandResult<ExitStatus> {
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());
    let mut child = command.spawn()?;

    let mut stdout = LineReader::new(child.stdout.take());
    let mut stderr = LineReader::new(child.stderr.take());

    loop {
        select! {
            line = stdout.next_line(), if stdout.is_open() => {
                if let Some(line) = line? {
                    info!("[{prefix}] {line}");
                }
            }
            line = stderr.next_line(), if stderr.is_open() => {
                if let Some(line) = line? {
                    warn!("[{prefix}] {line}");
                }
            }
            else => break,
        }
    }

    Ok(child.wait().await?)
}

/// Splits the command into the command itself and a vector
/// containing the additional arguments
fn split_command(value: &str) -> Option<(&str, Vec<&str>)> {
    let mut parts = value.split_whitespace();
    let command = parts.next()?;
    let args = parts.collect::<Vec<&str>>();
    Some((command, args))
}

/// Transforms the provided `args` formatting them replacing their
/// values with those stored in the `args_in` slice. A replaced value
/// is always passed as a single argument even when it contains spaces
fn transform_args<'a: 'b, 'b>(args: Vec<&'a str>, args_in: &'a [&str]) -> Vec<&'b str> {
    /// Parses a format value from the provided `value`
    /// returning the index stored inside it or None if
    /// it could not be parsed as a format
    fn parse_format(value: &str) -> Option<usize> {
        let inner = value.strip_prefix('{')?.strip_suffix('}')?;
        inner.parse::<usize>().ok()
    }

    let mut out = Vec::with_capacity(args.len());
    for arg in args {
        if let Some(index) = parse_format(arg) {
            if let Some(value) = args_in.get(index) {
                out.push(*value);
                continue;
            }
        }
        out.push(arg)
    }
    out
}
