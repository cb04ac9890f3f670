pub mod console;
pub mod json;
pub mod report_model;

pub use console::format_console_report;
pub use json::format_json_report;
pub use report_model::RunReport;
