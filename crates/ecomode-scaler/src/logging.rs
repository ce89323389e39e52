//! Log conventions shared by the scaler and the job layer.
//!
//! Every record carries an `event` field naming the flow it belongs to and,
//! when it concerns a single review app, an `app` field. The "ok" level of
//! the log sink is an `info` record tagged `outcome = "ok"`.

use serde::Serialize;

pub const EVENT_SESSION: &str = "session";
pub const EVENT_SCALE: &str = "scale-review-app";
pub const EVENT_STOP: &str = "stop-review-apps";
pub const EVENT_RESTART: &str = "restart-review-apps";
pub const EVENT_FLEET: &str = "list-review-apps";
pub const EVENT_JOB: &str = "review-app-job";

/// Emit an "ok" record: an `info!` tagged `outcome = "ok"`.
#[macro_export]
macro_rules! ok {
    ($($arg:tt)+) => {
        ::tracing::info!(outcome = "ok", $($arg)+)
    };
}

/// Render a log message value. Strings pass through untouched, anything
/// else is serialized to JSON text.
pub fn render_message<T: Serialize + ?Sized>(message: &T) -> String {
    match serde_json::to_value(message) {
        Ok(serde_json::Value::String(s)) => s,
        Ok(value) => value.to_string(),
        Err(e) => format!("<unserializable message: {e}>"),
    }
}

/// In-memory JSON log sink for asserting on emitted records.
#[cfg(any(test, feature = "testing"))]
pub mod capture {
    use std::io;
    use std::sync::{Arc, Mutex};

    use serde_json::Value;
    use tracing::subscriber::DefaultGuard;
    use tracing_subscriber::fmt::MakeWriter;

    /// Records written while the guard returned by [`CapturedLogs::install`]
    /// is alive, on the current thread.
    #[derive(Clone, Default)]
    pub struct CapturedLogs {
        buf: Arc<Mutex<Vec<u8>>>,
    }

    pub struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CaptureWriter {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.0
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CaptureWriter;

        fn make_writer(&'a self) -> Self::Writer {
            CaptureWriter(Arc::clone(&self.buf))
        }
    }

    impl CapturedLogs {
        /// Route this thread's records into a fresh buffer until the guard
        /// is dropped.
        pub fn install() -> (Self, DefaultGuard) {
            let logs = Self::default();
            let subscriber = tracing_subscriber::fmt()
                .json()
                .with_max_level(tracing::Level::DEBUG)
                .with_writer(logs.clone())
                .finish();
            let guard = tracing::subscriber::set_default(subscriber);
            (logs, guard)
        }

        /// Every record, as parsed JSON.
        pub fn records(&self) -> Vec<Value> {
            let buf = self
                .buf
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone();
            String::from_utf8_lossy(&buf)
                .lines()
                .filter_map(|line| serde_json::from_str(line).ok())
                .collect()
        }

        /// Records whose message is exactly `message`.
        pub fn with_message(&self, message: &str) -> Vec<Value> {
            self.records()
                .into_iter()
                .filter(|r| r["fields"]["message"] == message)
                .collect()
        }
    }
}
