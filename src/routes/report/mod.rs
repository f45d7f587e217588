mod handler;
mod model;

pub use handler::{create_report, delete_report, get_report, list_reports, update_status};
pub use model::{Report, ReportStatus};
