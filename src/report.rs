use crate::history::LessonRecord;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// Write lesson history as CSV to any writer.
pub fn write_records<W: Write>(writer: W, records: &[LessonRecord]) -> io::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record([
        "timestamp",
        "module",
        "lesson",
        "wpm",
        "accuracy",
        "errors",
        "policy",
    ])
    .map_err(io::Error::other)?;

    for record in records {
        wtr.write_record([
            record.timestamp.to_rfc3339(),
            record.module.clone(),
            record.lesson.clone(),
            format!("{:.1}", record.wpm),
            format!("{:.1}", record.accuracy),
            record.errors.to_string(),
            record.policy.to_string(),
        ])
        .map_err(io::Error::other)?;
    }

    wtr.flush()
}

/// Export lesson history to a CSV file at `path`.
pub fn export<P: AsRef<Path>>(path: P, records: &[LessonRecord]) -> io::Result<()> {
    let file = File::create(path)?;
    write_records(file, records)
}
