//! Logging for test binaries.
//!
//! [`init`] gives every binary a human-readable subscriber tuned to the
//! platform crates. Binaries that assert on log output
//! use [`LogCapture::install_global`] instead and read the JSON lines back.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use once_cell::sync::OnceCell;
use tracing::subscriber::SetGlobalDefaultError;
use tracing::Subscriber;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

/// Used when neither `TEST_LOG` nor `RUST_LOG` is set.
pub const DEFAULT_FILTER: &str = "warn,platform_common=info,sea_orm=error,sqlx=error";

static INITIALIZED: OnceCell<()> = OnceCell::new();

/// Install the shared test subscriber once per process.
///
/// `TEST_LOG` wins over `RUST_LOG`, which wins over [`DEFAULT_FILTER`]
/// (platform events at `info`, everything else at `warn` or quieter). A
/// subscriber installed earlier by someone else is left alone.
pub fn init() {
    INITIALIZED.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_test_writer()
            .without_time()
            .with_target(true)
            .try_init();
    });
}

fn env_filter() -> EnvFilter {
    ["TEST_LOG", "RUST_LOG"]
        .iter()
        .find_map(|var| std::env::var(var).ok())
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// In-memory sink for JSON log lines.
///
/// Clones share the same buffer.
#[derive(Clone, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Capture every event in the process, including those emitted on other
    /// runtime worker threads. Fails if a global subscriber already exists,
    /// so the binary must not also call [`init`].
    pub fn install_global() -> Result<Self, SetGlobalDefaultError> {
        let capture = Self::default();
        tracing::subscriber::set_global_default(capture.subscriber())?;
        Ok(capture)
    }

    /// A JSON subscriber writing into this capture, for scoped use with
    /// `tracing::subscriber::with_default`.
    pub fn subscriber(&self) -> impl Subscriber + Send + Sync + 'static {
        tracing_subscriber::registry().with(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(self.clone()),
        )
    }

    /// Captured output split into lines.
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.lock())
            .lines()
            .map(str::to_owned)
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.buf.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub struct CaptureWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for CaptureWriter {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CaptureWriter {
            buf: Arc::clone(&self.buf),
        }
    }
}
