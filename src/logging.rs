//! Logging setup for binaries and tests.
//!
//! The library itself only emits `tracing` events; nothing is printed
//! until a subscriber is installed. `RUST_LOG` overrides the default
//! filter, e.g. `RUST_LOG=parmap=debug` to watch workers start and stop.
//! Each `map` call runs in a `map` span and each shutdown in a
//! `pool_shutdown` span; their close events carry the elapsed time.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

/// Installs a stderr subscriber filtered by `RUST_LOG`, or by `default_filter` when unset.
///
/// Fails if a global subscriber is already installed.
pub fn init(default_filter: &str) -> Result<(), TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .with_span_events(FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init()
}

/// Routes events to the test harness output; repeated calls are ignored.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_thread_names(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tracing::span::{Attributes, Id};
    use tracing::Subscriber;
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    use crate::mapper::ParallelMapper;

    /// Records the name of every span opened on the current thread.
    struct SpanNames(Arc<Mutex<Vec<&'static str>>>);

    impl<S: Subscriber> Layer<S> for SpanNames {
        fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
            self.0.lock().push(attrs.metadata().name());
        }
    }

    #[test]
    fn map_and_shutdown_open_spans() {
        let names = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(SpanNames(Arc::clone(&names)));

        tracing::subscriber::with_default(subscriber, || {
            let mapper = ParallelMapper::new(2).unwrap();
            assert_eq!(mapper.map(|x: u8| x + 1, vec![1, 2]).unwrap(), vec![2, 3]);
            mapper.close().unwrap();
        });

        let names = names.lock();
        assert!(names.contains(&"map"), "spans: {names:?}");
        assert!(names.contains(&"pool_shutdown"), "spans: {names:?}");
    }
}
