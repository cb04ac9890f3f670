use crate::report::report_model::RunReport;
use crate::script::StepValue;

/// Format a run report for terminal output.
///
/// Produces output like:
/// ```text
/// === Scripts: smoke ===
///
/// ✓ PASS  open_wifi (4 steps, 3 actions)
///     line 3: get_text($settings__title) -> "Wi-Fi"
/// ✗ FAIL  toggle_bt (2 steps, 2 actions)
///     [not_found] not found: 'settings__bt' [//switch] (at line 2: tap($settings__bt))
///
/// === Results: 1 passed, 1 failed (2 total) ===
/// ```
pub fn format_console_report(report: &RunReport) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== Scripts: {} ===\n\n", report.suite_name));

    for result in &report.results {
        let marker = if result.passed {
            "\u{2713} PASS"
        } else {
            "\u{2717} FAIL"
        };
        out.push_str(&format!(
            "{}  {} ({} steps, {} actions)\n",
            marker, result.script, result.steps_run, result.actions
        ));

        for output in &result.outputs {
            out.push_str(&format!(
                "    line {}: {} -> {}\n",
                output.source.line,
                output.source.code,
                format_value(&output.value)
            ));
        }

        if let Some(ref error) = result.error {
            out.push_str(&format!("    [{}] {}\n", error.kind, error.message));
        }
    }

    out.push_str(&format!(
        "\n=== Results: {} passed, {} failed ({} total)",
        report.passed, report.failed, report.total
    ));

    if let Some(ms) = report.duration_ms {
        let secs = ms as f64 / 1000.0;
        out.push_str(&format!(" in {:.1}s", secs));
    }

    out.push_str(" ===\n");

    out
}

fn format_value(value: &StepValue) -> String {
    match value {
        StepValue::Text(Some(text)) => format!("{:?}", text),
        StepValue::Text(None) => "(no text)".to_string(),
        StepValue::Attributes(attrs) => {
            serde_json::to_string(attrs).unwrap_or_else(|_| format!("{:?}", attrs))
        }
        StepValue::Count(n) => n.to_string(),
        StepValue::AtEnd(true) => "at end".to_string(),
        StepValue::AtEnd(false) => "moved".to_string(),
    }
}
