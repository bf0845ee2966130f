use super::{
    Capability, InferenceBackend, InferenceHandle, InferenceRequest, InferenceResponse, types::*,
};
use crate::config::Config;
use anyhow::{Context, Result, anyhow};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Output, Stdio};
use std::sync::{Mutex, PoisonError, mpsc};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Hosts each capability in its own long-lived `transformers` worker process.
pub struct PythonBackend {
    cfg: Config,
    worker_script: PathBuf,
    python_exe: PathBuf,
}

impl PythonBackend {
    pub fn new(cfg: &Config) -> Result<Self> {
        let scripts_dir = PathBuf::from(&cfg.backend.scripts_dir);
        if cfg.security.pin_scripts_dir {
            let cwd = std::env::current_dir().with_context(|| "current_dir")?;
            let canon = scripts_dir
                .canonicalize()
                .with_context(|| format!("canonicalize scripts_dir: {}", scripts_dir.display()))?;
            if !canon.starts_with(&cwd) {
                return Err(anyhow!(
                    "scripts_dir is outside cwd while pin_scripts_dir=true: {}",
                    canon.display()
                ));
            }
        }
        let worker_script = scripts_dir.join(&cfg.backend.worker_script);
        if !worker_script.exists() {
            return Err(anyhow!("missing script: {}", worker_script.display()));
        }
        let python_exe = resolve_python_exe(&cfg.backend.python_exe);
        Ok(Self {
            cfg: cfg.clone(),
            worker_script,
            python_exe,
        })
    }

    fn model_for(&self, capability: Capability) -> &str {
        match capability {
            Capability::Summarizer => &self.cfg.models.summarizer,
            Capability::QuestionAnswerer => &self.cfg.models.question_answerer,
            Capability::QuestionGenerator => &self.cfg.models.question_generator,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.python_exe);
        cmd.arg(&self.worker_script);
        for (k, v) in &self.cfg.backend.env {
            cmd.env(k, v);
        }
        if self.cfg.backend.offline_only {
            cmd.env("HF_HUB_OFFLINE", "1");
            cmd.env("TRANSFORMERS_OFFLINE", "1");
        }
        cmd
    }
}

fn resolve_python_exe(raw: &str) -> PathBuf {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("auto") {
        if let Ok(env_val) = std::env::var("RESEARCH_ASSISTANT_PYTHON") {
            let p = expand_tilde(&env_val);
            if p.exists() {
                return p;
            }
        }
        return PathBuf::from("python3");
    }
    expand_tilde(raw)
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

impl InferenceBackend for PythonBackend {
    fn load(&self, capability: Capability) -> Result<Box<dyn InferenceHandle>> {
        let model = self.model_for(capability).to_string();
        let started = Instant::now();

        let mut cmd = self.command();
        cmd.args(["serve", "--task", capability.pipeline_task(), "--model", model.as_str()]);
        cmd.args(["--device", self.cfg.backend.device.as_str()]);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(if self.cfg.debug.keep_worker_stderr {
            Stdio::inherit()
        } else {
            Stdio::null()
        });

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning worker: {}", self.worker_script.display()))?;
        let stdin = child.stdin.take().ok_or_else(|| anyhow!("no stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| anyhow!("no stdout"))?;

        let timeout = Duration::from_secs(self.cfg.backend.startup_timeout_seconds);
        let (stdout, ready_line) = match read_line_with_timeout(BufReader::new(stdout), timeout) {
            Ok(v) => v,
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(err.context(format!("{capability} worker did not start")));
            }
        };

        let ready: WorkerReady = match serde_json::from_str(ready_line.trim()) {
            Ok(r) => r,
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(anyhow!(err).context("parsing worker ready line"));
            }
        };
        if !ready.ok {
            let _ = child.kill();
            let _ = child.wait();
            return Err(anyhow!(
                "loading {model}: {}",
                ready.error.unwrap_or_else(|| "unknown error".to_string())
            ));
        }

        info!(
            "{capability} worker pid={} model={} device={} loaded in {:?}",
            child.id(),
            ready.model,
            ready.device.as_deref().unwrap_or("?"),
            started.elapsed()
        );

        Ok(Box::new(WorkerHandle {
            capability,
            pipes: Mutex::new(WorkerPipes {
                child,
                stdin,
                stdout,
            }),
        }))
    }

    fn doctor(&self) -> Result<BackendDiag> {
        let mut cmd = self.command();
        cmd.arg("doctor");
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning worker: {}", self.worker_script.display()))?;
        let output = wait_with_timeout(
            &mut child,
            Duration::from_secs(self.cfg.backend.doctor_timeout_seconds),
        )?;
        if !output.status.success() {
            return Err(anyhow!(
                "worker doctor failed: {}",
                String::from_utf8_lossy(&output.stderr)
            ));
        }
        let mut diag: BackendDiag = serde_json::from_slice(&output.stdout)
            .with_context(|| "parsing worker doctor output")?;
        diag.python_exe = self.python_exe.display().to_string();
        Ok(diag)
    }
}

struct WorkerPipes {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// One request in flight per worker; concurrent callers queue on the mutex.
struct WorkerHandle {
    capability: Capability,
    pipes: Mutex<WorkerPipes>,
}

impl InferenceHandle for WorkerHandle {
    fn capability(&self) -> Capability {
        self.capability
    }

    fn invoke(&self, req: &InferenceRequest) -> Result<InferenceResponse> {
        let mut pipes = self.pipes.lock().unwrap_or_else(PoisonError::into_inner);

        let mut line = serde_json::to_string(req)?;
        line.push('\n');
        pipes
            .stdin
            .write_all(line.as_bytes())
            .with_context(|| "writing request to worker")?;
        pipes.stdin.flush().ok();

        let mut reply = String::new();
        let n = pipes
            .stdout
            .read_line(&mut reply)
            .with_context(|| "reading worker reply")?;
        if n == 0 {
            let status = pipes.child.try_wait().ok().flatten();
            return Err(anyhow!("worker exited (status={status:?})"));
        }
        debug!("{} reply bytes={}", self.capability, n);

        let reply: WorkerReply =
            serde_json::from_str(reply.trim()).with_context(|| "parsing worker reply")?;
        if !reply.ok {
            return Err(anyhow!(
                reply.error.unwrap_or_else(|| "worker returned ok=false".to_string())
            ));
        }
        reply
            .result
            .ok_or_else(|| anyhow!("worker reply has no result"))
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        let pipes = self.pipes.get_mut().unwrap_or_else(PoisonError::into_inner);
        let _ = pipes.child.kill();
        let _ = pipes.child.wait();
    }
}

fn read_line_with_timeout(
    mut reader: BufReader<ChildStdout>,
    timeout: Duration,
) -> Result<(BufReader<ChildStdout>, String)> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let mut line = String::new();
        let res = reader.read_line(&mut line).map(|n| (n, line));
        let _ = tx.send((reader, res));
    });

    match rx.recv_timeout(timeout) {
        Ok((reader, Ok((n, line)))) => {
            if n == 0 {
                return Err(anyhow!(
                    "worker exited before ready (set debug.keep_worker_stderr=true to see why)"
                ));
            }
            Ok((reader, line))
        }
        Ok((_, Err(err))) => Err(anyhow!(err).context("reading worker ready line")),
        Err(_) => Err(anyhow!("worker not ready after {:?}", timeout)),
    }
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Output> {
    // Drain pipes while waiting so a chatty child can't block on a full buffer.
    let stdout_reader = child.stdout.take();
    let stderr_reader = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout_reader {
            out.read_to_end(&mut buf).with_context(|| "read stdout")?;
        }
        Ok(buf)
    });

    let stderr_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr_reader {
            err.read_to_end(&mut buf).with_context(|| "read stderr")?;
        }
        Ok(buf)
    });

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().with_context(|| "try_wait")? {
            let stdout = stdout_thread
                .join()
                .map_err(|_| anyhow!("stdout reader thread panicked"))??;
            let stderr = stderr_thread
                .join()
                .map_err(|_| anyhow!("stderr reader thread panicked"))??;
            return Ok(Output {
                status,
                stdout,
                stderr,
            });
        }

        if start.elapsed() > timeout {
            warn!("worker doctor timed out after {:?}", timeout);
            let _ = child.kill();
            let _ = child.wait();
            return Err(anyhow!("worker doctor exceeded timeout ({:?})", timeout));
        }

        std::thread::sleep(Duration::from_millis(50));
    }
}
