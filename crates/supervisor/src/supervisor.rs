//! Supervisor - runs one command forever (or once), feeding the router

use std::process::Stdio;

use contracts::{Command, RestartPolicy, RunOutcome, SupervisorState};
use dispatcher::Router;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::SupervisorError;
use crate::lines::{decode_line, route_line, LineRoute};

/// Supervises one [`Command`]
pub struct Supervisor {
    id: usize,
    command: Command,
    router: Router,
    policy: RestartPolicy,
}

impl Supervisor {
    pub fn new(id: usize, command: Command, router: Router, policy: RestartPolicy) -> Self {
        Self {
            id,
            command,
            router,
            policy,
        }
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    /// Run the child until the policy says stop
    ///
    /// Under [`RestartPolicy::Always`] this never returns. Otherwise the
    /// result of the final run is returned: `Ok(())` for a clean exit, the
    /// run's error for a failure.
    ///
    /// # Errors
    /// The [`SupervisorError`] of the run that terminated supervision
    #[instrument(
        name = "supervisor",
        skip(self),
        fields(process = self.id, command = %self.command)
    )]
    pub async fn run(&self) -> Result<(), SupervisorError> {
        let mut state = SupervisorState::Starting;
        let mut runs: u64 = 0;

        loop {
            match state {
                SupervisorState::Starting | SupervisorState::Restarting => {
                    if matches!(state, SupervisorState::Restarting) {
                        observability::record_child_restart(&self.command.name);
                        // Keep a child that dies instantly from starving the runtime
                        tokio::task::yield_now().await;
                    }
                    runs += 1;
                    debug!(run = runs, "Executing #{}: {}", self.id, self.command);
                    state = SupervisorState::Running;
                }
                SupervisorState::Running => {
                    let result = self.run_once().await;
                    let outcome = match &result {
                        Ok(()) => RunOutcome::Clean,
                        Err(e) => e.outcome(),
                    };
                    state = SupervisorState::Exited(outcome);

                    let next = self.policy.decide(outcome);
                    if let Err(e) = &result {
                        match next {
                            SupervisorState::Terminated if self.policy.is_fatal() => {
                                error!(error = %e, "Subprocess #{} failed, terminating", self.id);
                            }
                            _ => error!(error = %e, "Executing subprocess #{}", self.id),
                        }
                    }
                    debug!(?state, ?next, "Child run finished");

                    if next.is_terminal() {
                        return result;
                    }
                    state = next;
                }
                SupervisorState::Exited(_) | SupervisorState::Terminated => {
                    return Ok(());
                }
            }
        }
    }

    /// Spawn the child once, pump its output, and collect the exit status
    async fn run_once(&self) -> Result<(), SupervisorError> {
        let mut child = self.spawn()?;

        let stdout = child.stdout.take().ok_or_else(|| self.missing_pipe("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| self.missing_pipe("stderr"))?;

        tokio::spawn(copy_stderr(stderr, self.id));

        let (tx, rx) = mpsc::channel(1);
        let prefix = self.command.prefix.clone();
        let process = self.command.name.clone();
        let reader = tokio::spawn(read_stdout(stdout, prefix, process, tx));

        let lines = self.router.forward(rx).await;
        if let Err(e) = reader.await {
            error!(error = ?e, "Stdout reader panicked");
        }
        debug!(lines, "Child stdout closed");

        self.wait(&mut child).await
    }

    fn spawn(&self) -> Result<Child, SupervisorError> {
        tokio::process::Command::new(&self.command.name)
            .args(&self.command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SupervisorError::Spawn {
                command: self.command.to_string(),
                source,
            })
    }

    async fn wait(&self, child: &mut Child) -> Result<(), SupervisorError> {
        let status = child.wait().await.map_err(|source| SupervisorError::Wait {
            command: self.command.to_string(),
            source,
        })?;

        observability::record_child_exit(&self.command.name, status.code());
        if status.success() {
            debug!("Child exited cleanly");
            Ok(())
        } else {
            Err(SupervisorError::AbnormalExit {
                command: self.command.to_string(),
                code: status.code(),
            })
        }
    }

    fn missing_pipe(&self, stream: &'static str) -> SupervisorError {
        SupervisorError::MissingPipe {
            command: self.command.to_string(),
            stream,
        }
    }
}

/// Read stdout line by line; pipeline lines go to `tx`, the rest to stdout
///
/// Dropping `tx` on return ends the router's forward loop.
async fn read_stdout(
    stdout: ChildStdout,
    prefix: Option<String>,
    process: String,
    tx: mpsc::Sender<String>,
) {
    let mut operator = tokio::io::stdout();
    let mut reader = BufReader::new(stdout);

    loop {
        let mut raw = Vec::new();
        match reader.read_until(b'\n', &mut raw).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "Fatal: reading stdout");
                break;
            }
        }

        match route_line(decode_line(raw), prefix.as_deref()) {
            LineRoute::Pipeline(line) => {
                if tx.send(line).await.is_err() {
                    warn!("Router stopped accepting lines");
                    break;
                }
            }
            LineRoute::Operator(line) => {
                observability::record_line_skipped(&process);
                if let Err(e) = write_line(&mut operator, &line).await {
                    warn!(error = %e, "Writing passthrough line");
                }
            }
        }
    }
}

/// Copy stderr lines verbatim to the operator's stderr
async fn copy_stderr(stderr: ChildStderr, id: usize) {
    let mut operator = tokio::io::stderr();
    let mut reader = BufReader::new(stderr);

    loop {
        let mut raw = Vec::new();
        match reader.read_until(b'\n', &mut raw).await {
            Ok(0) => break,
            Ok(_) => {
                if let Err(e) = write_line(&mut operator, &decode_line(raw)).await {
                    warn!(process = id, error = %e, "Writing stderr line");
                }
            }
            Err(e) => {
                error!(process = id, error = %e, "Reading stderr");
                break;
            }
        }
    }
}

async fn write_line<W>(out: &mut W, line: &str) -> std::io::Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await
}

/// Supervise every command against the same router
///
/// A single command runs on the calling task. With several, each gets its own
/// task and the first error returned by any of them ends the rest.
///
/// # Errors
/// The first terminating [`SupervisorError`]
pub async fn run_all(
    commands: Vec<Command>,
    router: Router,
    policy: RestartPolicy,
) -> Result<(), SupervisorError> {
    run_all_until(commands, router, policy, CancellationToken::new()).await
}

/// [`run_all`] that also stops when `shutdown` is cancelled
///
/// Every supervisor (and its router clone) has been dropped by the time this
/// returns, so the caller's router is the last one left and its shutdown
/// flushes the sinks. Children are killed on drop.
///
/// # Errors
/// The first terminating [`SupervisorError`]; cancellation is `Ok(())`
pub async fn run_all_until(
    commands: Vec<Command>,
    router: Router,
    policy: RestartPolicy,
    shutdown: CancellationToken,
) -> Result<(), SupervisorError> {
    if commands.len() == 1 {
        let Some(command) = commands.into_iter().next() else {
            return Ok(());
        };
        let supervisor = Supervisor::new(0, command, router, policy);
        return tokio::select! {
            result = supervisor.run() => result,
            _ = shutdown.cancelled() => {
                debug!("Supervisor cancelled");
                Ok(())
            }
        };
    }

    info!(count = commands.len(), ?policy, "Starting supervisors");
    let mut set = JoinSet::new();
    for (id, command) in commands.into_iter().enumerate() {
        let supervisor = Supervisor::new(id, command, router.clone(), policy);
        set.spawn(async move { supervisor.run().await });
    }
    drop(router);

    let result = loop {
        tokio::select! {
            joined = set.join_next() => match joined {
                None => break Ok(()),
                Some(Ok(Ok(()))) => {}
                Some(Ok(Err(e))) => break Err(e),
                Some(Err(e)) => error!(error = ?e, "Supervisor task panicked"),
            },
            _ = shutdown.cancelled() => {
                debug!("Supervisors cancelled");
                break Ok(());
            }
        }
    };

    // Wait for aborted tasks to drop their router clones
    set.shutdown().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ContractError, LineSink};
    use dispatcher::SinkHandle;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct RecordingSink {
        lines: Arc<Mutex<Vec<String>>>,
    }

    impl LineSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        fn tick_interval(&self) -> Option<Duration> {
            None
        }

        async fn write(&mut self, line: String) -> Result<(), ContractError> {
            self.lines.lock().unwrap().push(line);
            Ok(())
        }

        async fn tick(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    fn recording_router() -> (Router, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink {
            lines: Arc::clone(&lines),
        };
        let router = Router::new(vec![SinkHandle::spawn(sink, 16)]).unwrap();
        (router, lines)
    }

    fn sh(script: &str) -> Command {
        Command::new("sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn test_clean_exit_under_never_runs_once() {
        let (router, lines) = recording_router();
        let supervisor = Supervisor::new(
            0,
            sh("echo 'cpu value=1'; echo 'cpu value=2'"),
            router.clone(),
            RestartPolicy::Never,
        );

        supervisor.run().await.unwrap();
        drop(supervisor);
        router.shutdown().await;

        assert_eq!(*lines.lock().unwrap(), vec!["cpu value=1", "cpu value=2"]);
    }

    #[tokio::test]
    async fn test_fatal_mode_returns_abnormal_exit() {
        let (router, lines) = recording_router();
        let supervisor = Supervisor::new(
            0,
            sh("echo before; exit 1"),
            router.clone(),
            RestartPolicy::OnCleanExit,
        );

        let err = supervisor.run().await.unwrap_err();
        assert!(matches!(
            err,
            SupervisorError::AbnormalExit { code: Some(1), .. }
        ));

        drop(supervisor);
        router.shutdown().await;
        assert_eq!(*lines.lock().unwrap(), vec!["before"]);
    }

    #[tokio::test]
    async fn test_fatal_mode_spawn_failure() {
        let (router, _) = recording_router();
        let supervisor = Supervisor::new(
            0,
            Command::new("/nonexistent/influxin-test-binary"),
            router,
            RestartPolicy::OnCleanExit,
        );

        let err = supervisor.run().await.unwrap_err();
        assert!(matches!(err, SupervisorError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_always_restarts_after_clean_exit() {
        let (router, lines) = recording_router();
        let supervisor = Supervisor::new(0, sh("echo tick"), router.clone(), RestartPolicy::Always);

        let result = tokio::time::timeout(Duration::from_millis(500), supervisor.run()).await;
        assert!(result.is_err(), "Always policy should keep running");

        drop(supervisor);
        router.shutdown().await;

        let lines = lines.lock().unwrap();
        assert!(lines.len() >= 2, "expected restarts, got {}", lines.len());
        assert!(lines.iter().all(|l| l == "tick"));
    }

    #[tokio::test]
    async fn test_prefix_filter_applies_to_child_output() {
        let (router, lines) = recording_router();
        let command = sh("echo 'noise'; echo 'M: mem used=3 '").with_prefix(Some("M:".to_string()));
        let supervisor = Supervisor::new(0, command, router.clone(), RestartPolicy::Never);

        supervisor.run().await.unwrap();
        drop(supervisor);
        router.shutdown().await;

        assert_eq!(*lines.lock().unwrap(), vec!["mem used=3"]);
    }

    #[tokio::test]
    async fn test_stderr_is_not_forwarded() {
        let (router, lines) = recording_router();
        let supervisor = Supervisor::new(
            0,
            sh("echo oops 1>&2; echo ok"),
            router.clone(),
            RestartPolicy::Never,
        );

        supervisor.run().await.unwrap();
        drop(supervisor);
        router.shutdown().await;

        assert_eq!(*lines.lock().unwrap(), vec!["ok"]);
    }

    #[tokio::test]
    async fn test_run_all_returns_first_failure() {
        let (router, _) = recording_router();
        let commands = vec![sh("sleep 5"), sh("exit 3")];

        let err = run_all(commands, router, RestartPolicy::OnCleanExit)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SupervisorError::AbnormalExit { code: Some(3), .. }
        ));
    }

    #[tokio::test]
    async fn test_run_all_preserves_per_process_order() {
        let (router, lines) = recording_router();
        let commands = vec![
            sh("for i in 1 2 3 4 5; do echo a$i; done"),
            sh("for i in 1 2 3 4 5; do echo b$i; done"),
        ];

        run_all(commands, router.clone(), RestartPolicy::Never)
            .await
            .unwrap();
        router.shutdown().await;

        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 10);
        for tag in ["a", "b"] {
            let seq: Vec<&String> = lines.iter().filter(|l| l.starts_with(tag)).collect();
            let expected: Vec<String> = (1..=5).map(|i| format!("{tag}{i}")).collect();
            assert_eq!(seq, expected.iter().collect::<Vec<_>>());
        }
    }

    #[tokio::test]
    async fn test_run_all_until_stops_every_supervisor() {
        let (router, lines) = recording_router();
        let commands = vec![sh("echo a; sleep 30"), sh("echo b; sleep 30")];
        let shutdown = CancellationToken::new();

        let canceller = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                shutdown.cancel();
            })
        };

        tokio::time::timeout(
            Duration::from_secs(5),
            run_all_until(commands, router.clone(), RestartPolicy::Always, shutdown),
        )
        .await
        .expect("cancellation should stop the supervisors")
        .unwrap();
        canceller.await.unwrap();

        // The only clone left is ours, so shutdown reaches the sink
        router.shutdown().await;
        let mut lines = lines.lock().unwrap().clone();
        lines.sort();
        assert_eq!(lines, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_run_all_until_single_command_cancelled() {
        let (router, _) = recording_router();
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        tokio::time::timeout(
            Duration::from_secs(5),
            run_all_until(vec![sh("sleep 30")], router, RestartPolicy::Always, shutdown),
        )
        .await
        .expect("cancellation should stop the supervisor")
        .unwrap();
    }
}
