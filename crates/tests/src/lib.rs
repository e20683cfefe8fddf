//! # Integration Tests
//!
//! Cross-crate end-to-end tests.
//!
//! Covers:
//! - child stdout through the router into batching and HTTP submission
//! - passthrough output next to batching
//! - fatal mode and config-driven endpoint resolution
//! - shutdown flushing buffered lines from several children

#[cfg(test)]
mod e2e_tests {
    use std::io;
    use std::pin::Pin;
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll};
    use std::time::Duration;

    use config_loader::{resolve_endpoint, ConfigFormat, ConfigLoader};
    use contracts::{Command, RestartPolicy};
    use dispatcher::{BatchSink, PassthroughSink, Router, SinkHandle};
    use mockito::{Matcher, Server};
    use submitter::{build_client, Submitter, SubmitterConfig, SubmitterHandle};
    use supervisor::{run_all, run_all_until, SupervisorError};
    use tokio::io::AsyncWrite;
    use tokio::time::{sleep, timeout};
    use tokio_util::sync::CancellationToken;

    /// In-memory writer shared with the test body
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl AsyncWrite for SharedBuf {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn sh(script: &str) -> Command {
        Command::new("sh").arg("-c").arg(script)
    }

    fn submitter(endpoint: String) -> SubmitterHandle {
        Submitter::spawn(
            SubmitterConfig {
                workers: 2,
                queue_depth: 0,
                endpoint,
                debug: false,
            },
            build_client(false, Duration::from_secs(5)).unwrap(),
        )
    }

    async fn wait_for_batches(handle: &SubmitterHandle, total: u64) {
        timeout(Duration::from_secs(5), async {
            while handle.stats().total() < total {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("batches were not submitted in time");
    }

    /// Child stdout -> Router -> BatchSink -> Submitter -> HTTP
    #[tokio::test]
    async fn test_e2e_child_output_reaches_endpoint() {
        let mut server = Server::new_async().await;
        let full = server
            .mock("POST", "/write")
            .match_query(Matcher::UrlEncoded("db".into(), "metrics".into()))
            .match_header("content-type", "text/plain")
            .match_body("cpu value=1\ncpu value=2\n")
            .with_status(204)
            .expect(1)
            .create_async()
            .await;
        let remainder = server
            .mock("POST", "/write")
            .match_query(Matcher::UrlEncoded("db".into(), "metrics".into()))
            .match_body("cpu value=3\n")
            .with_status(204)
            .expect(1)
            .create_async()
            .await;

        let handle = submitter(format!("{}/write?db=metrics", server.url()));
        let sink = BatchSink::new("influxdb", 2, Duration::from_secs(3600), handle.clone());
        let router = Router::new(vec![SinkHandle::spawn(sink, 1)]).unwrap();

        let commands = vec![sh("printf 'cpu value=1\\ncpu value=2\\ncpu value=3\\n'")];
        run_all(commands, router.clone(), RestartPolicy::Never)
            .await
            .unwrap();
        // Shutdown flushes the partial batch
        router.shutdown().await;

        wait_for_batches(&handle, 2).await;
        assert_eq!(handle.stats().succeeded, 2);
        full.assert_async().await;
        remainder.assert_async().await;
    }

    /// Both sinks see every line when verbose output is on
    #[tokio::test]
    async fn test_e2e_passthrough_and_batching_together() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/write")
            .match_body("a\nb\n")
            .with_status(204)
            .expect(1)
            .create_async()
            .await;

        let handle = submitter(format!("{}/write", server.url()));
        let out = SharedBuf::default();
        let router = Router::new(vec![
            SinkHandle::spawn(
                BatchSink::new("influxdb", 10, Duration::from_secs(3600), handle.clone()),
                1,
            ),
            SinkHandle::spawn(PassthroughSink::new("stdout", out.clone()), 1),
        ])
        .unwrap();

        run_all(vec![sh("echo a; echo b")], router.clone(), RestartPolicy::Never)
            .await
            .unwrap();
        router.shutdown().await;

        assert_eq!(out.text(), "a\nb\n");
        wait_for_batches(&handle, 1).await;
        mock.assert_async().await;
    }

    /// Prefix filtering happens before fan-out
    #[tokio::test]
    async fn test_e2e_prefix_filter() {
        let out = SharedBuf::default();
        let router = Router::new(vec![SinkHandle::spawn(
            PassthroughSink::new("capture", out.clone()),
            1,
        )])
        .unwrap();

        let command = sh("echo 'log: starting'; echo 'METRIC mem used=1'; echo 'log: done'")
            .with_prefix(Some("METRIC".to_string()));
        run_all(vec![command], router.clone(), RestartPolicy::Never)
            .await
            .unwrap();
        router.shutdown().await;

        assert_eq!(out.text(), "mem used=1\n");
    }

    /// Several children share one router; each keeps its own order
    #[tokio::test]
    async fn test_e2e_multiple_children() {
        let out = SharedBuf::default();
        let router = Router::new(vec![SinkHandle::spawn(
            PassthroughSink::new("capture", out.clone()),
            1,
        )])
        .unwrap();

        let commands = vec![
            sh("for i in 1 2 3; do echo x$i; done"),
            sh("for i in 1 2 3; do echo y$i; done"),
        ];
        run_all(commands, router.clone(), RestartPolicy::Never)
            .await
            .unwrap();
        router.shutdown().await;

        let text = out.text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 6);
        let xs: Vec<&str> = lines.iter().copied().filter(|l| l.starts_with('x')).collect();
        assert_eq!(xs, vec!["x1", "x2", "x3"]);
    }

    /// Fatal mode: a failing child ends supervision with an error
    #[tokio::test]
    async fn test_e2e_fatal_child_failure() {
        let out = SharedBuf::default();
        let router = Router::new(vec![SinkHandle::spawn(
            PassthroughSink::new("capture", out.clone()),
            1,
        )])
        .unwrap();

        let err = run_all(
            vec![sh("echo partial; exit 1")],
            router.clone(),
            RestartPolicy::from_fatal(true),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SupervisorError::AbnormalExit { code: Some(1), .. }));

        router.shutdown().await;
        assert_eq!(out.text(), "partial\n");
    }

    /// Config file -> endpoint overrides -> request actually lands on the override
    #[tokio::test]
    async fn test_e2e_config_endpoint_overrides() {
        let mut server = Server::new_async().await;
        let host = server.host_with_port();
        let mock = server
            .mock("POST", "/write")
            .match_query(Matcher::UrlEncoded("db".into(), "metrics".into()))
            .match_header("authorization", Matcher::Regex("^Basic ".into()))
            .with_status(204)
            .expect(1)
            .create_async()
            .await;

        let toml = format!(
            r#"
[endpoint]
url = "http://placeholder:8086/write?db=test"
host = "{host}"
dbname = "metrics"
user = "agent"
password = "secret"

[[commands]]
name = "true"
"#
        );
        let config =
            ConfigLoader::finalize(ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap())
                .unwrap();
        let endpoint = resolve_endpoint(&config.endpoint).unwrap();
        assert_eq!(endpoint, format!("http://agent:secret@{host}/write?db=metrics"));

        let handle = submitter(endpoint);
        let sink = BatchSink::new("influxdb", 1, Duration::from_secs(3600), handle.clone());
        let router = Router::new(vec![SinkHandle::spawn(sink, 1)]).unwrap();
        router.deliver("disk used=5".to_string()).await;
        router.shutdown().await;

        wait_for_batches(&handle, 1).await;
        mock.assert_async().await;
    }

    /// Signal-style shutdown with several long-running children still flushes
    #[tokio::test]
    async fn test_e2e_shutdown_flushes_multiple_children() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/write")
            .match_body(Matcher::AnyOf(vec![
                Matcher::Exact("a\nb\n".into()),
                Matcher::Exact("b\na\n".into()),
            ]))
            .with_status(204)
            .expect(1)
            .create_async()
            .await;

        let handle = submitter(format!("{}/write", server.url()));
        let sink = BatchSink::new("influxdb", 100, Duration::from_secs(3600), handle.clone());
        let router = Router::new(vec![SinkHandle::spawn(sink, 1)]).unwrap();

        let shutdown = CancellationToken::new();
        {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                sleep(Duration::from_millis(300)).await;
                shutdown.cancel();
            });
        }

        let commands = vec![sh("echo a; sleep 30"), sh("echo b; sleep 30")];
        timeout(
            Duration::from_secs(5),
            run_all_until(commands, router.clone(), RestartPolicy::Always, shutdown),
        )
        .await
        .expect("supervisors did not stop")
        .unwrap();
        router.shutdown().await;

        wait_for_batches(&handle, 1).await;
        assert_eq!(handle.stats().succeeded, 1);
        mock.assert_async().await;
    }

    /// Fatal failure of one child still flushes what the others produced
    #[tokio::test]
    async fn test_e2e_fatal_failure_flushes_other_children() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/write")
            .match_body("a\n")
            .with_status(204)
            .expect(1)
            .create_async()
            .await;

        let handle = submitter(format!("{}/write", server.url()));
        let sink = BatchSink::new("influxdb", 100, Duration::from_secs(3600), handle.clone());
        let router = Router::new(vec![SinkHandle::spawn(sink, 1)]).unwrap();

        let commands = vec![sh("echo a; sleep 30"), sh("sleep 0.3; exit 3")];
        let err = timeout(
            Duration::from_secs(5),
            run_all(commands, router.clone(), RestartPolicy::from_fatal(true)),
        )
        .await
        .expect("fatal failure did not end supervision")
        .unwrap_err();
        assert!(matches!(err, SupervisorError::AbnormalExit { code: Some(3), .. }));
        router.shutdown().await;

        wait_for_batches(&handle, 1).await;
        mock.assert_async().await;
    }
}
