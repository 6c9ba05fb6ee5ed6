/// Spinner rendering for long-running background actions
use anyhow::{anyhow, Result};
use std::future::Future;
use std::io::{IsTerminal, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const FRAMES: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
const CLEAR_LINE: &str = "\x1b[2K";

/// Where spinner frames are drawn
pub type Sink = Arc<Mutex<Box<dyn Write + Send>>>;

/// Starts background actions and animates them until they finish
///
/// Without a terminal the reporter falls back to plain log lines.
#[derive(Clone)]
pub struct ProgressReporter {
    tick: Duration,
    sink: Option<Sink>,
}

impl ProgressReporter {
    /// Animate on stderr when it is a terminal
    pub fn new(tick: Duration) -> Self {
        if !std::io::stderr().is_terminal() {
            return Self {
                tick,
                ..Self::plain()
            };
        }
        let stderr: Box<dyn Write + Send> = Box::new(std::io::stderr());
        Self::with_sink(tick, Arc::new(Mutex::new(stderr)))
    }

    /// Log lines only
    pub fn plain() -> Self {
        Self {
            tick: Duration::from_millis(100),
            sink: None,
        }
    }

    pub fn with_sink(tick: Duration, sink: Sink) -> Self {
        Self {
            tick,
            sink: Some(sink),
        }
    }

    /// Spawn `action` and start reporting on it
    pub fn start<T, F>(&self, label: impl Into<String>, action: F) -> ProgressHandle<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let label = label.into();
        let action = tokio::spawn(action);

        let (stop, ticker) = match &self.sink {
            Some(sink) => {
                let (tx, rx) = oneshot::channel();
                let ticker = tokio::spawn(animate(sink.clone(), label.clone(), self.tick, rx));
                (Some(tx), Some(ticker))
            }
            None => {
                info!("{}...", label);
                (None, None)
            }
        };

        ProgressHandle {
            label,
            action,
            stop,
            ticker,
            sink: self.sink.clone(),
        }
    }

    /// Run `action` in the background and wait for it behind a spinner
    pub async fn track<T, F>(&self, label: impl Into<String>, action: F) -> Result<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        self.start(label, action).finish().await
    }
}

async fn animate(sink: Sink, label: String, tick: Duration, mut stop: oneshot::Receiver<()>) {
    let mut interval = tokio::time::interval(tick);
    let mut frame = 0usize;
    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = interval.tick() => {
                draw(&sink, &format!("\r{}{} {}", CLEAR_LINE, FRAMES[frame % FRAMES.len()], label));
                frame += 1;
            }
        }
    }
}

fn draw(sink: &Sink, text: &str) {
    if let Ok(mut out) = sink.lock() {
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }
}

/// One in-flight action and its spinner
///
/// Dropping the handle without `finish` abandons the action.
pub struct ProgressHandle<T> {
    label: String,
    action: JoinHandle<Result<T>>,
    stop: Option<oneshot::Sender<()>>,
    ticker: Option<JoinHandle<()>>,
    sink: Option<Sink>,
}

impl<T> ProgressHandle<T> {
    /// Wait for the action, stop the spinner and print the final line
    ///
    /// The action's result is returned unchanged.
    pub async fn finish(mut self) -> Result<T> {
        let result = match (&mut self.action).await {
            Ok(result) => result,
            Err(e) => Err(anyhow!("{} did not complete: {}", self.label, e)),
        };

        self.stop_ticker().await;

        match (&self.sink, &result) {
            (Some(sink), Ok(_)) => draw(sink, &format!("\r{}✓ {}\n", CLEAR_LINE, self.label)),
            (Some(sink), Err(_)) => draw(sink, &format!("\r{}✗ {}\n", CLEAR_LINE, self.label)),
            (None, Ok(_)) => info!("✓ {}", self.label),
            (None, Err(e)) => warn!("✗ {}: {:#}", self.label, e),
        }

        result
    }

    async fn stop_ticker(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(ticker) = self.ticker.take() {
            let _ = ticker.await;
        }
    }
}

impl<T> Drop for ProgressHandle<T> {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        self.action.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
        }

        fn sink(&self) -> Sink {
            let boxed: Box<dyn Write + Send> = Box::new(self.clone());
            Arc::new(Mutex::new(boxed))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_spinner_animates_until_done() {
        let captured = Captured::default();
        let reporter = ProgressReporter::with_sink(Duration::from_millis(100), captured.sink());

        let value = reporter
            .track("Creating cluster oim-dev", async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(42)
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        let text = captured.text();
        let frames = text.matches("Creating cluster oim-dev").count() - 1;
        assert!(frames >= 10, "only {frames} frames drawn");
        assert!(text.ends_with("✓ Creating cluster oim-dev\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_passes_through() {
        let captured = Captured::default();
        let reporter = ProgressReporter::with_sink(Duration::from_millis(100), captured.sink());

        let result: Result<()> = reporter
            .track("Deleting cluster oim-dev", async {
                tokio::time::sleep(Duration::from_millis(250)).await;
                Err(anyhow!("docker daemon not running"))
            })
            .await;

        assert_eq!(result.unwrap_err().to_string(), "docker daemon not running");
        assert!(captured.text().ends_with("✗ Deleting cluster oim-dev\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_frames_after_finish() {
        let captured = Captured::default();
        let reporter = ProgressReporter::with_sink(Duration::from_millis(100), captured.sink());

        reporter
            .track("quick", async { Ok(()) })
            .await
            .unwrap();
        let after_finish = captured.text();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(captured.text(), after_finish);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_abandons_action() {
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();

        let handle = ProgressReporter::plain().start("slow", async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });
        drop(handle);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(!done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_plain_mode_returns_value() {
        let value = ProgressReporter::plain()
            .track("plain", async { Ok("done") })
            .await
            .unwrap();
        assert_eq!(value, "done");
    }
}
