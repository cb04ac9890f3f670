use std::{fs::OpenOptions, io::Write, path::Path, sync::Mutex};

use tracing::warn;

use crate::trace::trace::ExecutionRecord;

enum Sink {
    File(Mutex<std::fs::File>),
    Memory(Mutex<Vec<ExecutionRecord>>),
    Disabled,
}

/// Append-only execution log. Write failures are reported as warnings
/// and never abort a run.
pub struct TraceLogger {
    sink: Sink,
    next_step: Mutex<u64>,
}

impl TraceLogger {
    /// JSON-lines file sink, appending.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let file = OpenOptions::new().create(true).append(true).open(path);

        let sink = match file {
            Ok(f) => Sink::File(Mutex::new(f)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not open trace file");
                Sink::Disabled
            }
        };
        Self::with_sink(sink)
    }

    /// Keeps records in memory; see [`TraceLogger::records`].
    pub fn in_memory() -> Self {
        Self::with_sink(Sink::Memory(Mutex::new(Vec::new())))
    }

    pub fn disabled() -> Self {
        Self::with_sink(Sink::Disabled)
    }

    fn with_sink(sink: Sink) -> Self {
        TraceLogger {
            sink,
            next_step: Mutex::new(0),
        }
    }

    /// Number the record and append it.
    pub fn log(&self, mut record: ExecutionRecord) {
        if let Ok(mut step) = self.next_step.lock() {
            record.step = *step;
            *step += 1;
        }

        match &self.sink {
            Sink::Disabled => {}
            Sink::Memory(records) => match records.lock() {
                Ok(mut r) => r.push(record),
                Err(e) => warn!(error = %e, "trace logger lock poisoned"),
            },
            Sink::File(file_mutex) => {
                let json = match serde_json::to_string(&record) {
                    Ok(j) => j,
                    Err(e) => {
                        warn!(error = %e, "failed to serialize execution record");
                        return;
                    }
                };

                let mut file = match file_mutex.lock() {
                    Ok(f) => f,
                    Err(e) => {
                        warn!(error = %e, "trace logger lock poisoned");
                        return;
                    }
                };

                if let Err(e) = writeln!(file, "{}", json) {
                    warn!(error = %e, "failed to write execution record");
                }
            }
        }
    }

    /// Records kept by an in-memory logger; empty for other sinks.
    pub fn records(&self) -> Vec<ExecutionRecord> {
        match &self.sink {
            Sink::Memory(records) => records.lock().map(|r| r.clone()).unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Restart step numbering and drop in-memory records.
    pub fn reset(&self) {
        if let Ok(mut step) = self.next_step.lock() {
            *step = 0;
        }
        if let Sink::Memory(records) = &self.sink {
            if let Ok(mut r) = records.lock() {
                r.clear();
            }
        }
    }
}
