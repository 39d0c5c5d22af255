use std::time::Instant;

/// Log the program version, the time since `start_time`, and the process's
/// current memory usage
pub(crate) fn log_process_info(start_time: Instant) {
    let (physical_mem, virtual_mem) = match memory_stats::memory_stats() {
        Some(st) => (Some(st.physical_mem), Some(st.virtual_mem)),
        None => (None, None),
    };
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        elapsed = ?start_time.elapsed(),
        physical_mem,
        virtual_mem,
        "Process info",
    );
}
