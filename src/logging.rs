use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;

/// Host-application logging setup: rolling daily file, no ANSI, target
/// stripped. The returned guard must be kept alive for the duration of
/// the process or buffered lines are lost.
pub fn init(log_dir: &str) -> WorkerGuard {
    let file_appender = rolling::daily(log_dir, "paylink.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .pretty()
        .init();

    guard
}
