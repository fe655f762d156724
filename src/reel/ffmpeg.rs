use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;

use crate::ui::prelude::{Level, emit};

use super::error::{EncodingFailure, ReelError, ReelResult};
use super::frames::FrameSink;
use super::raster::RenderedFrame;
use super::segment::FrameSpec;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const STDERR_TAIL_LINES: usize = 20;
/// How long a reader may keep draining stderr once the child is gone.
const STDERR_GRACE: Duration = Duration::from_secs(2);
/// How long a consumer that closed its input gets to exit on its own.
const ABORT_GRACE: Duration = Duration::from_secs(5);

pub trait FfmpegRunner {
    fn run(&self, args: &[String]) -> ReelResult<()>;
}

/// Opens a raw RGBA frame stream that is encoded into `output`.
pub trait FrameEncoderFactory {
    fn open(&self, spec: &FrameSpec, output: &Path) -> ReelResult<Box<dyn FrameSink>>;
}

pub trait MediaProbe {
    fn duration_seconds(&self, path: &Path) -> ReelResult<f64>;
}

/// Resolve `program` on PATH so a missing tool is reported before any work starts.
pub fn ensure_program_available(program: &str) -> ReelResult<PathBuf> {
    which::which(program).map_err(|_| {
        ReelError::validation(format!(
            "{program} was not found on PATH. Install it and verify `{program} -version` works."
        ))
    })
}

#[derive(Debug, Clone)]
pub struct SystemFfmpegRunner {
    program: String,
    timeout: Option<Duration>,
    verbose: bool,
}

impl SystemFfmpegRunner {
    pub fn new(program: impl Into<String>, timeout: Option<Duration>, verbose: bool) -> Self {
        Self {
            program: program.into(),
            timeout,
            verbose,
        }
    }
}

impl FfmpegRunner for SystemFfmpegRunner {
    fn run(&self, args: &[String]) -> ReelResult<()> {
        emit(
            Level::Debug,
            "reel.ffmpeg.command",
            &format!("{} {}", self.program, args.join(" ")),
            None,
        );

        let mut child = spawn_child(&self.program, args, Stdio::null())?;
        let stderr = StderrCapture::start(child.stderr.take(), self.verbose);
        let mut watchdog = Watchdog::arm(&child, self.timeout);
        let exit = wait_for_exit(&mut child, &mut watchdog)?;
        let captured = stderr.finish();
        check_exit(&self.program, exit, &captured)
    }
}

/// Spawn `program` as the leader of its own process group, so a kill reaches
/// anything it forked as well.
fn spawn_child(program: &str, args: &[String], stdin: Stdio) -> ReelResult<Child> {
    Command::new(program)
        .args(args)
        .stdin(stdin)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .process_group(0)
        .spawn()
        .map_err(|err| spawn_error(program, err))
}

fn kill_process_group(pid: u32) {
    if let Ok(pid) = i32::try_from(pid) {
        let _ = killpg(Pid::from_raw(pid), Signal::SIGKILL);
    }
}

fn spawn_error(program: &str, err: std::io::Error) -> ReelError {
    let reason = if err.kind() == ErrorKind::NotFound {
        format!("{program} was not found on PATH")
    } else {
        err.to_string()
    };
    ReelError::encoding(program, EncodingFailure::Spawn(reason), "")
}

fn check_exit(program: &str, exit: Exit, captured: &CapturedStderr) -> ReelResult<()> {
    match exit {
        Exit::Finished(status) if status.success() => Ok(()),
        Exit::Finished(status) => Err(ReelError::encoding(
            program,
            EncodingFailure::ExitStatus(status.code()),
            captured.diagnostics(),
        )),
        Exit::TimedOut(after) => Err(ReelError::encoding(
            program,
            EncodingFailure::Timeout(after),
            captured.diagnostics(),
        )),
    }
}

enum Exit {
    Finished(ExitStatus),
    TimedOut(Duration),
}

/// Kills a child's process group once its time limit passes, unless disarmed first.
/// The clock starts at `arm`, so a consumer that stops reading mid-stream is
/// killed too and the blocked writer sees a broken pipe.
struct Watchdog {
    timeout: Option<Duration>,
    fired: Arc<AtomicBool>,
    cancel: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Watchdog {
    fn arm(child: &Child, timeout: Option<Duration>) -> Self {
        let fired = Arc::new(AtomicBool::new(false));
        let mut watchdog = Self {
            timeout,
            fired: Arc::clone(&fired),
            cancel: None,
            handle: None,
        };
        let Some(limit) = timeout else {
            return watchdog;
        };

        let (cancel, cancelled) = mpsc::channel::<()>();
        let pid = child.id();
        watchdog.handle = Some(thread::spawn(move || {
            if matches!(cancelled.recv_timeout(limit), Err(RecvTimeoutError::Timeout)) {
                fired.store(true, Ordering::SeqCst);
                kill_process_group(pid);
            }
        }));
        watchdog.cancel = Some(cancel);
        watchdog
    }

    /// The limit that was exceeded, once the watchdog has fired.
    fn expired(&self) -> Option<Duration> {
        self.timeout.filter(|_| self.fired.load(Ordering::SeqCst))
    }

    fn disarm(&mut self) {
        // dropping the sender wakes the thread
        self.cancel.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.disarm();
    }
}

fn wait_for_exit(child: &mut Child, watchdog: &mut Watchdog) -> ReelResult<Exit> {
    let status = child.wait()?;
    watchdog.disarm();
    Ok(match watchdog.expired() {
        Some(after) => Exit::TimedOut(after),
        None => Exit::Finished(status),
    })
}

/// Poll for an exit until `grace` runs out, then kill the group.
fn wait_with_grace(child: &mut Child, grace: Duration) -> ReelResult<Exit> {
    let deadline = Instant::now() + grace;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Exit::Finished(status));
        }
        if Instant::now() >= deadline {
            kill_process_group(child.id());
            let _ = child.kill();
            let _ = child.wait();
            return Ok(Exit::TimedOut(grace));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[derive(Debug, Default)]
struct CapturedStderr {
    tail: VecDeque<String>,
    error_lines: Vec<String>,
}

impl CapturedStderr {
    fn diagnostics(&self) -> String {
        if self.error_lines.is_empty() {
            self.tail.iter().cloned().collect::<Vec<_>>().join("\n")
        } else {
            self.error_lines.join("\n")
        }
    }

    fn push(&mut self, line: &str) {
        if line.contains("error") || line.contains("Error") || line.contains("ERROR") {
            self.error_lines.push(line.to_string());
        }
        if self.tail.len() == STDERR_TAIL_LINES {
            self.tail.pop_front();
        }
        self.tail.push_back(line.to_string());
    }
}

/// Drains a child's stderr on a helper thread so a full pipe never stalls the child.
struct StderrCapture {
    collected: Option<Receiver<CapturedStderr>>,
}

impl StderrCapture {
    fn start<R: Read + Send + 'static>(stderr: Option<R>, verbose: bool) -> Self {
        let collected = stderr.map(|stream| {
            let (sender, receiver) = mpsc::channel();
            thread::spawn(move || {
                let _ = sender.send(collect_stderr(stream, verbose));
            });
            receiver
        });
        Self { collected }
    }

    fn detached() -> Self {
        Self { collected: None }
    }

    /// Call once the child has exited. A descendant still holding the pipe
    /// open only costs `STDERR_GRACE`; its reader is left behind.
    fn finish(mut self) -> CapturedStderr {
        self.collected
            .take()
            .and_then(|receiver| receiver.recv_timeout(STDERR_GRACE).ok())
            .unwrap_or_default()
    }
}

fn collect_stderr<R: Read>(mut stderr: R, verbose: bool) -> CapturedStderr {
    let mut captured = CapturedStderr::default();
    let mut buffer = [0u8; 4096];
    let mut accumulated = String::new();

    loop {
        let bytes_read = match stderr.read(&mut buffer) {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        accumulated.push_str(&String::from_utf8_lossy(&buffer[..bytes_read]));

        // ffmpeg redraws its status line with '\r'
        while let Some(pos) = accumulated.find(['\r', '\n']) {
            let line = accumulated[..pos].trim_end().to_string();
            accumulated.drain(..=pos);
            if line.is_empty() {
                continue;
            }
            if verbose {
                eprintln!("{line}");
            }
            captured.push(&line);
        }
    }

    let rest = accumulated.trim();
    if !rest.is_empty() {
        captured.push(rest);
    }
    captured
}

/// Encodes frames piped as raw RGBA into a video-only file.
#[derive(Debug, Clone)]
pub struct FfmpegFrameEncoder {
    program: String,
    video_codec: String,
    timeout: Option<Duration>,
}

impl FfmpegFrameEncoder {
    pub fn new(program: impl Into<String>, video_codec: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            program: program.into(),
            video_codec: video_codec.into(),
            timeout,
        }
    }

    pub fn args(&self, spec: &FrameSpec, output: &Path) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-y".to_string(),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgba".to_string(),
            "-s:v".to_string(),
            spec.size_arg(),
            "-r".to_string(),
            spec.fps.to_string(),
            "-i".to_string(),
            "-".to_string(),
            "-an".to_string(),
            "-c:v".to_string(),
            self.video_codec.clone(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            output.to_string_lossy().into_owned(),
        ]
    }
}

impl FrameEncoderFactory for FfmpegFrameEncoder {
    fn open(&self, spec: &FrameSpec, output: &Path) -> ReelResult<Box<dyn FrameSink>> {
        let args = self.args(spec, output);
        emit(
            Level::Debug,
            "reel.ffmpeg.command",
            &format!("{} {}", self.program, args.join(" ")),
            None,
        );
        let encoder = RawVideoEncoder::spawn(&self.program, &args, spec.frame_bytes(), self.timeout)?;
        Ok(Box::new(encoder))
    }
}

pub struct RawVideoEncoder {
    program: String,
    child: Child,
    stdin: Option<ChildStdin>,
    stderr: StderrCapture,
    frame_size: usize,
    watchdog: Watchdog,
}

impl RawVideoEncoder {
    pub fn spawn(
        program: &str,
        args: &[String],
        frame_size: usize,
        timeout: Option<Duration>,
    ) -> ReelResult<Self> {
        let mut child = spawn_child(program, args, Stdio::piped())?;
        let stdin = child.stdin.take();
        let stderr = StderrCapture::start(child.stderr.take(), false);
        let watchdog = Watchdog::arm(&child, timeout);

        Ok(Self {
            program: program.to_string(),
            child,
            stdin,
            stderr,
            frame_size,
            watchdog,
        })
    }

    // The consumer went away mid-stream, on its own or killed by the watchdog;
    // report how it exited.
    fn abort(&mut self) -> ReelError {
        self.stdin.take();
        let exit = wait_with_grace(&mut self.child, ABORT_GRACE);
        self.watchdog.disarm();
        let exit = match (self.watchdog.expired(), exit) {
            (Some(after), Ok(_)) => Ok(Exit::TimedOut(after)),
            (_, exit) => exit,
        };
        let captured = std::mem::replace(&mut self.stderr, StderrCapture::detached()).finish();
        match exit {
            Ok(Exit::Finished(status)) => ReelError::encoding(
                &self.program,
                EncodingFailure::ExitStatus(status.code()),
                captured.diagnostics(),
            ),
            Ok(Exit::TimedOut(after)) => ReelError::encoding(
                &self.program,
                EncodingFailure::Timeout(after),
                captured.diagnostics(),
            ),
            Err(err) => err,
        }
    }
}

impl FrameSink for RawVideoEncoder {
    fn write_frame(&mut self, frame: &RenderedFrame) -> ReelResult<()> {
        let bytes = frame.as_bytes();
        if bytes.len() != self.frame_size {
            return Err(ReelError::validation(format!(
                "frame size mismatch: expected {} bytes, got {}",
                self.frame_size,
                bytes.len()
            )));
        }
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(self.abort());
        };
        match stdin.write_all(bytes) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::BrokenPipe || self.watchdog.expired().is_some() => {
                Err(self.abort())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn finish(mut self: Box<Self>) -> ReelResult<()> {
        if let Some(mut stdin) = self.stdin.take() {
            // A closed pipe here means the encoder already exited; its status says why.
            let _ = stdin.flush();
        }
        let exit = wait_for_exit(&mut self.child, &mut self.watchdog)?;
        let captured = std::mem::replace(&mut self.stderr, StderrCapture::detached()).finish();
        check_exit(&self.program, exit, &captured)
    }
}

impl Drop for RawVideoEncoder {
    fn drop(&mut self) {
        if self.stdin.is_some() {
            // Dropped mid-stream because an earlier stage failed.
            self.stdin.take();
            kill_process_group(self.child.id());
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    program: String,
}

impl FfprobeProbe {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl MediaProbe for FfprobeProbe {
    fn duration_seconds(&self, path: &Path) -> ReelResult<f64> {
        let output = Command::new(&self.program)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .output()
            .map_err(|err| spawn_error(&self.program, err))?;

        if !output.status.success() {
            return Err(ReelError::encoding(
                &self.program,
                EncodingFailure::ExitStatus(output.status.code()),
                String::from_utf8_lossy(&output.stderr),
            ));
        }

        parse_duration(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
            ReelError::validation(format!(
                "{} reported no usable duration for {}",
                self.program,
                path.display()
            ))
        })
    }
}

fn parse_duration(stdout: &str) -> Option<f64> {
    stdout
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|duration| duration.is_finite() && *duration >= 0.0)
}
