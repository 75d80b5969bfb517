//! Report generation: workbook export and the synthesis report

pub mod aggregate;
pub mod format;
pub mod html;
pub mod svg;
pub mod xlsx;

pub use aggregate::{aggregate, ReportData};
pub use html::{pdf_filename, render_report};
pub use xlsx::{build_workbook, xlsx_filename, XLSX_CONTENT_TYPE};
