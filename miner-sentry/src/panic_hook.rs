use chrono::Local;
use std::{
    backtrace::Backtrace,
    fs::OpenOptions,
    io::Write,
    panic::{PanicHookInfo, take_hook},
    path::Path,
    thread,
};

use crate::logging::LogFiles;

/// Installs a global panic hook that logs panics via `tracing`.
///
/// In `panic = "abort"` builds the record is also appended straight to the
/// current daily log file, because the non-blocking writer may not flush
/// before the process aborts.
pub fn install(files: &LogFiles) {
    let log_path = files.log_dir().to_path_buf();
    let files = files.clone();
    let previous_hook = take_hook();

    std::panic::set_hook(Box::new(move |panic_info: &PanicHookInfo<'_>| {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let panic_record = format_panic_record(panic_info);

            tracing::error!(target: "miner_sentry::panic", "{panic_record}");

            if cfg!(panic = "abort") {
                let _ = append_panic_record(&log_path.join(files.current_file_name()), &panic_record);
            }
        }));

        previous_hook(panic_info);
    }));
}

fn append_panic_record(path: &Path, record: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{record}")?;
    file.flush()
}

fn format_panic_record(panic_info: &PanicHookInfo<'_>) -> String {
    let payload = panic_payload_to_string(panic_info);
    let location = panic_info
        .location()
        .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
        .unwrap_or_else(|| "<unknown>".to_string());

    let thread_name = thread::current()
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| "<unnamed>".to_string());

    let backtrace = Backtrace::force_capture();
    let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");

    format!(
        "{ts} PANIC thread={thread_name} location={location} payload={payload}\nBacktrace:\n{backtrace}"
    )
}

fn panic_payload_to_string(panic_info: &PanicHookInfo<'_>) -> String {
    if let Some(s) = panic_info.payload().downcast_ref::<&'static str>() {
        return (*s).to_string();
    }
    if let Some(s) = panic_info.payload().downcast_ref::<String>() {
        return s.clone();
    }
    panic_info.to_string()
}
