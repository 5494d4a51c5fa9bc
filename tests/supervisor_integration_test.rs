#![cfg(unix)]

use playlist_streamer::{
    Diagnostics, EncoderInvocation, FsLister, Launcher, OrderingMode, PlaylistEntry,
    StreamJobRunner, StreamTarget, Supervisor, SupervisorState, prepare_command,
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// Stands in for ffmpeg: runs `script` and records which file it was asked to stream.
#[derive(Clone)]
struct MockEncoder {
    script: &'static str,
    inputs: Arc<Mutex<Vec<PathBuf>>>,
    pids: Arc<Mutex<Vec<u32>>>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl MockEncoder {
    fn new(script: &'static str) -> Self {
        Self {
            script,
            inputs: Arc::default(),
            pids: Arc::default(),
            cancel_after: None,
        }
    }

    fn cancel_after(mut self, launches: usize, cancel: CancellationToken) -> Self {
        self.cancel_after = Some((launches, cancel));
        self
    }

    fn inputs(&self) -> Vec<PathBuf> {
        self.inputs.lock().unwrap().clone()
    }
}

impl Launcher for MockEncoder {
    fn launch(
        &self,
        invocation: &EncoderInvocation,
        diagnostics: Diagnostics,
    ) -> std::io::Result<Child> {
        let args = invocation.args();
        let input = args
            .iter()
            .position(|arg| arg == OsStr::new("-i"))
            .map(|index| PathBuf::from(&args[index + 1]))
            .expect("invocation without input");

        let child =
            prepare_command(Command::new("sh").arg("-c").arg(self.script), diagnostics).spawn()?;

        let launches = {
            let mut inputs = self.inputs.lock().unwrap();
            inputs.push(input);
            inputs.len()
        };
        self.pids.lock().unwrap().extend(child.id());

        if let Some((limit, cancel)) = &self.cancel_after
            && launches >= *limit
        {
            cancel.cancel();
        }

        Ok(child)
    }
}

fn supervisor(
    folder: &Path,
    encoder: MockEncoder,
    cancel: CancellationToken,
) -> Supervisor<FsLister, MockEncoder> {
    Supervisor::new(
        FsLister,
        StreamJobRunner::new(encoder, "ffmpeg", false),
        folder,
        StreamTarget::new("rtmp://127.0.0.1/live", "test-key").unwrap(),
        OrderingMode::Sequential,
        cancel,
    )
    .with_rescan_interval(Duration::from_millis(20))
}

fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"").unwrap();
    path
}

#[tokio::test]
async fn test_empty_folder_waits_and_picks_up_new_file() {
    let dir = tempfile::tempdir().unwrap();
    let encoder = MockEncoder::new("exit 0");
    let mut supervisor = supervisor(dir.path(), encoder, CancellationToken::new());

    let state = supervisor.step(SupervisorState::ScanningForFiles).await;
    assert_eq!(state, SupervisorState::WaitingForContent);

    // Still empty after the interval: rescan, then wait again
    let state = supervisor.step(state).await;
    assert_eq!(state, SupervisorState::ScanningForFiles);
    let state = supervisor.step(state).await;
    assert_eq!(state, SupervisorState::WaitingForContent);

    let added = touch(dir.path(), "late.mp4");
    let state = supervisor.step(state).await;
    assert_eq!(state, SupervisorState::ScanningForFiles);
    let state = supervisor.step(state).await;
    assert_eq!(
        state,
        SupervisorState::PlayingOne {
            playlist: vec![PlaylistEntry::new(added)],
            position: 0,
        }
    );
    assert_eq!(supervisor.stats().passes, 1);
}

#[tokio::test]
async fn test_failing_encoder_moves_to_next_file() {
    let dir = tempfile::tempdir().unwrap();
    let first = touch(dir.path(), "01-intro.mp4");
    let second = touch(dir.path(), "02-main.mkv");
    touch(dir.path(), "poster.png");

    let encoder = MockEncoder::new("exit 1");
    let mut supervisor = supervisor(dir.path(), encoder.clone(), CancellationToken::new());

    let mut state = supervisor.step(SupervisorState::ScanningForFiles).await;
    for _ in 0..2 {
        assert!(matches!(state, SupervisorState::PlayingOne { .. }));
        state = supervisor.step(state).await;
    }

    assert_eq!(state, SupervisorState::ScanningForFiles);
    assert_eq!(encoder.inputs(), vec![first, second]);

    let stats = supervisor.stats();
    assert_eq!(stats.jobs_started, 2);
    assert_eq!(stats.non_zero_exits, 2);
}

#[tokio::test]
async fn test_every_pass_rescans_folder() {
    let dir = tempfile::tempdir().unwrap();
    let clip = touch(dir.path(), "clip.flv");

    let cancel = CancellationToken::new();
    let encoder = MockEncoder::new("exit 0").cancel_after(3, cancel.clone());
    let supervisor = supervisor(dir.path(), encoder.clone(), cancel);

    let stats = tokio::time::timeout(Duration::from_secs(10), supervisor.run())
        .await
        .expect("supervisor did not stop");

    assert_eq!(encoder.inputs(), vec![clip.clone(), clip.clone(), clip]);
    assert_eq!(stats.passes, 3);
    assert_eq!(stats.jobs_started, 3);
}

#[tokio::test]
async fn test_cancel_during_stream_reaps_encoder_and_stops() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "a.mp4");
    touch(dir.path(), "b.mp4");

    let cancel = CancellationToken::new();
    let encoder = MockEncoder::new("exec sleep 1000");
    let supervisor = supervisor(dir.path(), encoder.clone(), cancel.clone());

    let cancel_c = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        cancel_c.cancel();
    });

    let stats = tokio::time::timeout(Duration::from_secs(10), supervisor.run())
        .await
        .expect("supervisor did not stop");

    // Only the first file ever started
    assert_eq!(stats.jobs_started, 1);
    assert_eq!(encoder.inputs().len(), 1);

    let pids = encoder.pids.lock().unwrap().clone();
    assert_eq!(pids.len(), 1);
    #[cfg(target_os = "linux")]
    assert!(
        !Path::new(&format!("/proc/{}", pids[0])).exists(),
        "encoder outlived the supervisor"
    );
}
