use crate::report::report_model::RunReport;

/// Pretty JSON form of a run report.
pub fn format_json_report(report: &RunReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}
