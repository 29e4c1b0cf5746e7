//! Feature-gated profiling support via `tracing-chrome`.
//!
//! With the `profiling` feature, [`init`] installs a Chrome trace layer next
//! to the usual fmt logger on stderr, so the encoder and both decoders show up as
//! separate spans (`core_encoder`, `core_decoder`, `core_decoder_statefull`).
//! Open the trace in `chrome://tracing` or [Perfetto](https://ui.perfetto.dev).
//!
//! Without the feature, [`init`] returns `None` and the caller sets up logging.

use std::path::Path;

/// Trace file written when no path is given.
pub const DEFAULT_TRACE_FILE: &str = "trace.json";

/// Keeps the Chrome trace writer alive; the file is flushed on drop.
#[cfg(feature = "profiling")]
pub struct ProfilingGuard {
    _guard: tracing_chrome::FlushGuard,
}

#[cfg(not(feature = "profiling"))]
pub struct ProfilingGuard;

/// Start tracing to `trace_file` (or [`DEFAULT_TRACE_FILE`]).
///
/// Returns `Some(guard)` when the `profiling` feature is active. Hold the
/// guard until the end of `main()`.
///
/// ```rust,ignore
/// let _guard = radae::profiling::init(None);
/// // ... load model, run the check ...
/// ```
pub fn init(trace_file: Option<&Path>) -> Option<ProfilingGuard> {
    #[cfg(feature = "profiling")]
    {
        use tracing_chrome::ChromeLayerBuilder;
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;

        let file = trace_file.unwrap_or_else(|| Path::new(DEFAULT_TRACE_FILE));
        let (chrome_layer, guard) = ChromeLayerBuilder::new()
            .file(file)
            .include_args(true)
            .build();

        tracing_subscriber::registry()
            .with(chrome_layer)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();

        tracing::info!("Profiling enabled, writing {} on exit", file.display());
        Some(ProfilingGuard { _guard: guard })
    }

    #[cfg(not(feature = "profiling"))]
    {
        let _ = trace_file;
        None
    }
}
