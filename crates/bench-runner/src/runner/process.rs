use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub elapsed: Duration,
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn wait_with_deadline(child: &mut Child, deadline: Duration) -> std::io::Result<(Option<i32>, bool)> {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((status.code(), false));
        }
        if started.elapsed() >= deadline {
            let _ = child.kill();
            let status = child.wait()?;
            return Ok((status.code(), true));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Runs `cmd` to completion, killing it once `deadline` has passed.
///
/// A process that cannot be spawned or waited on is reported as an engine
/// failure: the error text lands in `stderr` and no exit code is set.
pub fn run_with_deadline(mut cmd: Command, deadline: Duration) -> ProcessOutcome {
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let started = Instant::now();
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            tracing::warn!(program = ?cmd.get_program(), error = %err, "failed to spawn engine");
            return ProcessOutcome {
                stdout: String::new(),
                stderr: format!("failed to spawn {:?}: {}", cmd.get_program(), err),
                exit_code: None,
                timed_out: false,
                elapsed: started.elapsed(),
            };
        }
    };
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());
    let waited = wait_with_deadline(&mut child, deadline);
    let elapsed = started.elapsed();
    let stdout = String::from_utf8_lossy(&stdout.join().unwrap_or_default()).to_string();
    let mut stderr = String::from_utf8_lossy(&stderr.join().unwrap_or_default()).to_string();

    let (exit_code, timed_out) = match waited {
        Ok(v) => v,
        Err(err) => {
            stderr.push_str(&format!("failed to wait for engine: {}\n", err));
            (None, false)
        }
    };
    if timed_out {
        tracing::warn!(
            program = ?cmd.get_program(),
            deadline_secs = deadline.as_secs(),
            "engine killed after deadline"
        );
    }
    ProcessOutcome {
        stdout,
        stderr,
        exit_code,
        timed_out,
        elapsed,
    }
}
