use crate::error::FtResult;
use crate::metrics::FormSummary;
use std::io::Write;
use std::path::Path;

/// Write a summary's per-field breakdown as CSV, one row per field in
/// name order.
pub fn write_field_breakdown<W: Write>(summary: &FormSummary, writer: W) -> FtResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record([
        "field",
        "focus_count",
        "blur_count",
        "change_count",
        "paste_count",
        "total_focus_ms",
        "correction_count",
    ])?;
    for (name, fm) in &summary.fields {
        wtr.write_record([
            name.as_str(),
            &fm.focus_count.to_string(),
            &fm.blur_count.to_string(),
            &fm.change_count.to_string(),
            &fm.paste_count.to_string(),
            &fm.total_focus_ms.to_string(),
            &fm.correction_count.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn export_field_breakdown<P: AsRef<Path>>(summary: &FormSummary, path: P) -> FtResult<()> {
    let file = std::fs::File::create(path)?;
    write_field_breakdown(summary, file)
}
