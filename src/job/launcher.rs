use crate::job::encoder::EncoderInvocation;
use std::process::Stdio;
use tokio::process::{Child, Command};

/// What happens to the encoder's stdout and stderr.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Diagnostics {
    /// Both streams are piped and drained line by line into the log.
    Piped,
    /// Both streams go to the null device; nothing is buffered.
    Discarded,
}

impl Diagnostics {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Diagnostics::Piped
        } else {
            Diagnostics::Discarded
        }
    }

    pub fn stdio(self) -> Stdio {
        match self {
            Diagnostics::Piped => Stdio::piped(),
            Diagnostics::Discarded => Stdio::null(),
        }
    }
}

/// Starts encoder processes.
///
/// The returned child must honour `diagnostics`: when `Piped`, both `stdout`
/// and `stderr` handles are present and the caller drains them. On unix the
/// child leads its own process group, which is killed as a whole on cancel.
/// [`prepare_command`] sets all of this up.
pub trait Launcher: Send + Sync {
    fn launch(
        &self,
        invocation: &EncoderInvocation,
        diagnostics: Diagnostics,
    ) -> std::io::Result<Child>;
}

/// Spawns the invocation as a real OS process.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessLauncher;

impl Launcher for ProcessLauncher {
    fn launch(
        &self,
        invocation: &EncoderInvocation,
        diagnostics: Diagnostics,
    ) -> std::io::Result<Child> {
        prepare_command(&mut invocation.to_command(), diagnostics).spawn()
    }
}

/// Applies the stdio and lifetime settings every encoder process runs with.
pub fn prepare_command(command: &mut Command, diagnostics: Diagnostics) -> &mut Command {
    command
        .stdin(Stdio::null())
        .stdout(diagnostics.stdio())
        .stderr(diagnostics.stdio())
        .kill_on_drop(true);

    // Helpers the encoder forks (wrapper scripts) share its group
    #[cfg(unix)]
    command.process_group(0);

    command
}
