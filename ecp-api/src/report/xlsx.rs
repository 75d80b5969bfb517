//! Workbook export
//!
//! One sheet named "Results", one row per result row, every column.

use ecp_common::models::{ActivityCategory, ResultRow};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use uuid::Uuid;

pub const SHEET_NAME: &str = "Results";

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

enum Cell {
    Text(String),
    Number(f64),
    Bool(bool),
    Empty,
}

fn text(value: &Option<String>) -> Cell {
    value.clone().map(Cell::Text).unwrap_or(Cell::Empty)
}

fn number(value: Option<f64>) -> Cell {
    value.filter(|v| v.is_finite()).map(Cell::Number).unwrap_or(Cell::Empty)
}

const HEADERS: [&str; 20] = [
    "id",
    "project_id",
    "batch_id",
    "catégorie",
    "activité",
    "fournisseur",
    "prix_total(euro)",
    "nombre_activité",
    "unité_activité",
    "facteur_émission",
    "unité_post",
    "source_fe",
    "nom_base",
    "émission_totale",
    "unité_émission_totale",
    "fe_trouvé",
    "a_verif",
    "statut_verif",
    "reprocess_status",
    "commentaire",
];

/// Value of column `col` (index into `HEADERS`) for one row
fn cell(r: &ResultRow, col: usize) -> Cell {
    match col {
        0 => Cell::Number(r.id as f64),
        1 => Cell::Text(r.project_id.to_string()),
        2 => text(&r.batch_id),
        3 => r
            .category
            .map(|c| Cell::Text(c.label().to_string()))
            .unwrap_or(Cell::Empty),
        4 => text(&r.activity),
        5 => text(&r.supplier),
        6 => number(r.total_price_eur),
        7 => number(r.quantity),
        8 => text(&r.quantity_unit),
        9 => number(r.emission_factor),
        10 => text(&r.factor_unit),
        11 => text(&r.factor_source),
        12 => text(&r.factor_database),
        13 => number(r.total_emission),
        14 => text(&r.emission_unit),
        15 => Cell::Bool(r.factor_found),
        16 => Cell::Bool(r.requires_verification),
        17 => Cell::Text(r.effective_verification().label().to_string()),
        18 => Cell::Text(r.reprocess_status.as_str().to_string()),
        19 => text(&r.comment),
        _ => Cell::Empty,
    }
}

/// Build the workbook bytes
pub fn build_workbook(rows: &[ResultRow]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, name) in HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *name, &header)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        for col in 0..HEADERS.len() {
            let c = col as u16;
            match cell(row, col) {
                Cell::Text(s) => {
                    sheet.write_string(r, c, s)?;
                }
                Cell::Number(n) => {
                    sheet.write_number(r, c, n)?;
                }
                Cell::Bool(b) => {
                    sheet.write_boolean(r, c, b)?;
                }
                Cell::Empty => {}
            }
        }
    }

    workbook.save_to_buffer()
}

/// `results-<id>.xlsx` or `results-<id>-<slug>.xlsx` for a category export
pub fn xlsx_filename(project_id: Uuid, category: Option<ActivityCategory>) -> String {
    match category {
        Some(c) => format!("results-{}-{}.xlsx", project_id, c.slug()),
        None => format!("results-{}.xlsx", project_id),
    }
}
