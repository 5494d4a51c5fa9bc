use crate::error::StreamError;
use crate::target::StreamTarget;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

// Fixed delivery profile: video passes through untouched, audio is normalised
pub const AUDIO_CODEC: &str = "aac";
pub const AUDIO_SAMPLE_RATE: u32 = 44_100;
pub const AUDIO_BITRATE: &str = "128k";
pub const OUTPUT_FORMAT: &str = "flv";

/// Command line of one encoder run.
#[derive(Clone, PartialEq, Eq)]
pub struct EncoderInvocation {
    program: String,
    args: Vec<OsString>,
}

impl EncoderInvocation {
    /// Real-time read of `input`, video copy, fixed audio transcode, FLV mux to `target`.
    pub fn stream(program: &str, input: &Path, target: &StreamTarget) -> Self {
        let sample_rate = AUDIO_SAMPLE_RATE.to_string();
        let mut args: Vec<OsString> = Vec::with_capacity(16);
        args.extend(["-hide_banner", "-re", "-i"].map(OsString::from));
        args.push(input.as_os_str().to_owned());
        args.extend(
            [
                "-c:v",
                "copy",
                "-c:a",
                AUDIO_CODEC,
                "-ar",
                sample_rate.as_str(),
                "-b:a",
                AUDIO_BITRATE,
                "-f",
                OUTPUT_FORMAT,
            ]
            .map(OsString::from),
        );
        args.push(OsString::from(target.as_str()));

        Self {
            program: program.to_string(),
            args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

/// Runs `<program> -version` once so a missing encoder is reported at startup.
///
/// Returns the first line the encoder printed.
pub async fn probe_encoder(program: &str) -> Result<String, StreamError> {
    let output = Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|error| StreamError::EncoderUnavailable {
            program: program.to_string(),
            reason: error.to_string(),
        })?;

    if !output.status.success() {
        return Err(StreamError::EncoderUnavailable {
            program: program.to_string(),
            reason: format!("`-version` exited with {}", output.status),
        });
    }

    let version = String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .unwrap_or_default()
        .to_string();
    debug!(program, version, "Encoder probed");
    Ok(version)
}
