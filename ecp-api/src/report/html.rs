//! Synthesis report HTML
//!
//! A self-contained A4 document (inline CSS and SVG, no external assets)
//! handed to the print service. Three pages: headline figures and
//! breakdowns, per-category cards, recap table.

use std::fmt::Write;

use super::aggregate::{ReportData, Slice};
use super::format::{escape_html as esc, fmt_count, fmt_int, fmt_kg, fmt_pct};
use super::svg::{donut_svg, CenterText, DonutGeometry};

const STYLE: &str = r#"
  * { box-sizing: border-box; margin: 0; padding: 0; }
  body {
    font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Inter, sans-serif;
    background: #f9fafb;
    color: #052e16;
    padding: 28px 32px;
    font-size: 13px;
    -webkit-print-color-adjust: exact;
    print-color-adjust: exact;
  }
  .card { background: white; border-radius: 14px; border: 1px solid rgba(5,46,22,.12); padding: 16px; }
  .kpi-grid { display: grid; grid-template-columns: repeat(3, 1fr); gap: 12px; margin-bottom: 16px; }
  .kpi-card { background: white; border-radius: 14px; border: 1px solid rgba(5,46,22,.12); padding: 14px 16px 14px 20px; position: relative; overflow: hidden; }
  .kpi-accent { position: absolute; left: 0; top: 14px; bottom: 14px; width: 4px; border-radius: 0 3px 3px 0; background: #047857; }
  .kpi-label { font-size: 11px; color: rgba(5,46,22,.55); margin-bottom: 4px; }
  .kpi-value { font-size: 22px; font-weight: 700; color: #052e16; line-height: 1.1; }
  .kpi-sub { font-size: 11px; color: rgba(5,46,22,.55); margin-top: 4px; }
  .section-title { font-size: 17px; font-weight: 700; margin-bottom: 4px; }
  .section-sub { font-size: 11px; color: rgba(5,46,22,.55); margin-bottom: 14px; }
  .big-donut-card { display: flex; align-items: center; gap: 28px; margin-bottom: 16px; }
  .big-donut-legend { flex: 1; }
  .fe-grid { display: grid; grid-template-columns: 1fr 1fr; gap: 16px; margin-bottom: 16px; }
  .fe-card { display: flex; align-items: center; gap: 20px; }
  .fe-legend { flex: 1; }
  .cat-grid { display: grid; grid-template-columns: repeat(3, 1fr); gap: 14px; }
  .cat-card { padding: 12px 14px; }
  .cat-card-title { font-size: 11px; font-weight: 700; margin-bottom: 2px; }
  .cat-card-sub { font-size: 10px; color: rgba(5,46,22,.55); margin-bottom: 8px; }
  .cat-donut-row { display: flex; justify-content: center; margin-bottom: 8px; }
  .table-section { margin-top: 28px; }
  .table-title { font-size: 15px; font-weight: 700; margin-bottom: 12px; }
  table { width: 100%; border-collapse: collapse; }
  thead th { font-size: 11px; font-weight: 600; color: rgba(5,46,22,.55); padding: 6px 8px; text-align: left; border-bottom: 2px solid #047857; }
  thead th:not(:first-child) { text-align: right; }
  tbody tr:last-child td { border-bottom: none; }
  tbody td { border-bottom: 1px solid rgba(5,46,22,.08); }
  tfoot td { border-top: 2px solid #0F3D2E; padding: 7px 8px; font-size: 12px; font-weight: 700; }
  tfoot td:not(:first-child) { text-align: right; }
  @page { size: A4; margin: 18px 26px; }
  @media print {
    .page-break { page-break-before: always; }
    .no-break { page-break-inside: avoid; }
  }
"#;

fn share(value: f64, total: f64) -> f64 {
    if total > 0.0 {
        value / total * 100.0
    } else {
        0.0
    }
}

fn visible(slices: &[Slice]) -> impl Iterator<Item = &Slice> {
    slices
        .iter()
        .filter(|s| s.value > 0.0 || s.lines.unwrap_or(0) > 0)
}

/// Legend beside the large and medium donuts
fn legend_html(slices: &[Slice], unit: &str, fmt_value: fn(f64) -> String) -> String {
    let total: f64 = slices.iter().map(|s| s.value.max(0.0)).sum();
    let mut out = String::new();
    for slice in visible(slices) {
        let lines = slice
            .lines
            .map(|n| format!(" &bull; {} lgn", fmt_count(n)))
            .unwrap_or_default();
        let _ = write!(
            out,
            r#"
        <div style="display:flex;align-items:flex-start;gap:8px;margin-bottom:8px;">
          <span style="width:10px;height:10px;border-radius:50%;background:{color};flex-shrink:0;margin-top:3px;"></span>
          <div>
            <div style="font-size:12px;font-weight:600;color:rgba(5,46,22,.8);">{label}</div>
            <div style="font-size:11px;color:rgba(5,46,22,.6);">{value} {unit} &bull; {pct}{lines}</div>
          </div>
        </div>"#,
            color = slice.color,
            label = esc(&slice.label),
            value = esc(&fmt_value(slice.value)),
            unit = unit,
            pct = esc(&fmt_pct(share(slice.value, total))),
            lines = lines,
        );
    }
    out
}

/// Compact legend under category card donuts
fn small_legend_html(slices: &[Slice], unit: &str) -> String {
    let total: f64 = slices.iter().map(|s| s.value.max(0.0)).sum();
    let kg = unit.to_lowercase().contains("kg");
    let mut out = String::new();
    for slice in visible(slices) {
        let value = if kg { fmt_kg(slice.value) } else { fmt_int(slice.value) };
        let _ = write!(
            out,
            r#"
        <div style="display:flex;align-items:flex-start;gap:6px;margin-bottom:5px;">
          <span style="width:8px;height:8px;border-radius:50%;background:{color};flex-shrink:0;margin-top:2px;"></span>
          <div>
            <div style="font-size:10.5px;font-weight:600;color:rgba(5,46,22,.8);">{label}</div>
            <div style="font-size:9.5px;color:rgba(5,46,22,.6);">{value} {unit} &bull; {pct}</div>
          </div>
        </div>"#,
            color = slice.color,
            label = esc(&slice.label),
            value = esc(&value),
            unit = unit,
            pct = esc(&fmt_pct(share(slice.value, total))),
        );
    }
    out
}

fn kpi_section(data: &ReportData) -> String {
    format!(
        r#"
<div class="kpi-grid">
  <div class="kpi-card no-break">
    <div class="kpi-accent"></div>
    <div class="kpi-label">Total lignes</div>
    <div class="kpi-value">{lines}</div>
  </div>
  <div class="kpi-card no-break">
    <div class="kpi-accent"></div>
    <div class="kpi-label">Total émissions</div>
    <div class="kpi-value">{kg}</div>
    <div class="kpi-sub">kgCO2e</div>
  </div>
  <div class="kpi-card no-break">
    <div class="kpi-accent" style="background:#9F2D20;"></div>
    <div class="kpi-label">Non valorisées</div>
    <div class="kpi-value">{not_found}</div>
    <div class="kpi-sub">{not_found_pct}</div>
  </div>
</div>"#,
        lines = fmt_count(data.total_lines),
        kg = fmt_kg(data.total_kg),
        not_found = fmt_count(data.not_found),
        not_found_pct = fmt_pct(data.not_found_pct()),
    )
}

fn emissions_section(data: &ReportData) -> String {
    let total = fmt_kg(data.total_kg);
    let svg = donut_svg(
        &data.emission_slices,
        DonutGeometry::LARGE,
        CenterText {
            label: "Total",
            value: &total,
            unit: Some("kgCO2e"),
        },
    );

    format!(
        r#"
<div class="card big-donut-card no-break">
  <div>
    <div style="font-size:12px;font-weight:700;margin-bottom:4px;">Émissions par catégorie</div>
    <div style="font-size:10px;color:rgba(5,46,22,.55);margin-bottom:12px;">{total} kgCO2e &bull; {lines} lignes</div>
    {svg}
  </div>
  <div class="big-donut-legend">
    {legend}
  </div>
</div>"#,
        total = total,
        lines = fmt_count(data.total_lines),
        svg = svg,
        legend = legend_html(&data.emission_slices, "kgCO2e", fmt_kg),
    )
}

fn classification_section(data: &ReportData) -> String {
    let found = fmt_count(data.found);
    let total = fmt_count(data.total_lines);
    let svg_monetary = donut_svg(
        &data.monetary_slices,
        DonutGeometry::MEDIUM,
        CenterText {
            label: "Valorisées",
            value: &found,
            unit: Some("lignes"),
        },
    );
    let svg_found = donut_svg(
        &data.found_slices,
        DonutGeometry::MEDIUM,
        CenterText {
            label: "Total",
            value: &total,
            unit: Some("lignes"),
        },
    );

    format!(
        r#"
<div class="fe-grid">
  <div class="card fe-card no-break">
    <div>{svg_monetary}</div>
    <div class="fe-legend">
      <div style="font-size:11px;font-weight:700;margin-bottom:3px;">Part de FE monétaire</div>
      <div style="font-size:10px;color:rgba(5,46,22,.55);margin-bottom:10px;">{monetary_pct} moné. &bull; {found} lgn valorisées</div>
      {legend_monetary}
    </div>
  </div>
  <div class="card fe-card no-break">
    <div>{svg_found}</div>
    <div class="fe-legend">
      <div style="font-size:11px;font-weight:700;margin-bottom:3px;">Taux de lignes valorisées</div>
      <div style="font-size:10px;color:rgba(5,46,22,.55);margin-bottom:10px;">{not_found_pct} non valorisées &bull; {not_found}/{total}</div>
      {legend_found}
    </div>
  </div>
</div>"#,
        svg_monetary = svg_monetary,
        monetary_pct = fmt_pct(data.monetary_pct()),
        found = found,
        legend_monetary = legend_html(&data.monetary_slices, "lignes", fmt_int),
        svg_found = svg_found,
        not_found_pct = fmt_pct(data.not_found_pct()),
        not_found = fmt_count(data.not_found),
        total = total,
        legend_found = legend_html(&data.found_slices, "lignes", fmt_int),
    )
}

fn category_section(data: &ReportData) -> String {
    let mut cards = String::new();
    for card in &data.cards {
        let total = fmt_kg(card.total_kg);
        let svg = donut_svg(
            &card.slices,
            DonutGeometry::SMALL,
            CenterText {
                label: "Total",
                value: &total,
                unit: Some("kgCO2e"),
            },
        );
        let _ = write!(
            cards,
            r#"
    <div class="card cat-card no-break">
      <div class="cat-card-title">{title}</div>
      <div class="cat-card-sub">{total} kgCO2e &bull; {lines} lignes</div>
      <div class="cat-donut-row">{svg}</div>
      <div>{legend}</div>
    </div>"#,
            title = esc(card.title),
            total = total,
            lines = fmt_count(card.lines),
            svg = svg,
            legend = small_legend_html(&card.slices, "kgCO2e"),
        );
    }

    format!(
        r#"
<div class="page-break">
  <div class="section-title" style="margin-bottom:4px;">Détails par catégorie</div>
  <div class="section-sub">Toutes les catégories &bull; Donuts par type de valorisation</div>
  <div class="cat-grid">{cards}
  </div>
</div>"#
    )
}

fn recap_section(data: &ReportData) -> String {
    let mut body = String::new();
    for (idx, line) in data.recap.iter().enumerate() {
        let bg = if idx % 2 == 1 {
            "background:rgba(5,46,22,.025)"
        } else {
            ""
        };
        let _ = write!(
            body,
            r#"
      <tr style="{bg}">
        <td style="padding:6px 8px;font-size:12px;color:#052e16;">{label}</td>
        <td style="padding:6px 8px;font-size:12px;text-align:right;color:rgba(5,46,22,.7);">{lines}</td>
        <td style="padding:6px 8px;font-size:12px;text-align:right;color:#052e16;font-weight:600;">{kg}</td>
      </tr>"#,
            bg = bg,
            label = esc(&line.label),
            lines = fmt_count(line.lines),
            kg = fmt_kg(line.kg),
        );
    }
    let (total_lines, total_kg) = data.recap_totals();

    format!(
        r#"
<div class="page-break table-section">
  <div class="table-title">Récapitulatif par catégorie</div>
  <table>
    <thead>
      <tr>
        <th>Catégorie</th>
        <th style="text-align:right;">Lignes</th>
        <th style="text-align:right;">kgCO2e</th>
      </tr>
    </thead>
    <tbody>{body}
    </tbody>
    <tfoot>
      <tr>
        <td>Total</td>
        <td style="text-align:right;">{lines}</td>
        <td style="text-align:right;">{kg}</td>
      </tr>
    </tfoot>
  </table>
</div>"#,
        body = body,
        lines = fmt_count(total_lines),
        kg = fmt_kg(total_kg),
    )
}

/// Render the full synthesis report
pub fn render_report(data: &ReportData) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="fr">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width,initial-scale=1">
<title>Synthèse des résultats - {title}</title>
<style>{style}</style>
</head>
<body>
<div class="section-title">Synthèse des résultats</div>
<div class="section-sub">Projet&nbsp;: {title}</div>
{kpi}
{emissions}
{classification}
{categories}
{recap}
</body>
</html>"#,
        title = esc(&data.project_name),
        style = STYLE,
        kpi = kpi_section(data),
        emissions = emissions_section(data),
        classification = classification_section(data),
        categories = category_section(data),
        recap = recap_section(data),
    )
}

/// Attachment filename: `synthese-<name>.pdf`, non-alphanumerics replaced by `-`
pub fn pdf_filename(project_name: &str) -> String {
    let safe: String = project_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    format!("synthese-{}.pdf", safe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::aggregate::{aggregate, tests::row};
    use ecp_common::models::ActivityCategory::*;

    fn sample() -> ReportData {
        let rows = vec![
            row(1, Some(Fret), 1200.0, true, "kgCO2e/t.km", None),
            row(2, Some(AchatMateriel), 300.5, true, "kgCO2e/k€", None),
            row(3, Some(AchatMateriel), 0.0, false, "", None),
            row(4, Some(Annexe), 12.0, true, "", None),
        ];
        aggregate("Chantier <Nord>", &rows)
    }

    #[test]
    fn test_report_contains_all_sections() {
        let html = render_report(&sample());

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Synthèse des résultats"));
        assert!(html.contains("Émissions par catégorie"));
        assert!(html.contains("Part de FE monétaire"));
        assert!(html.contains("Taux de lignes valorisées"));
        assert!(html.contains("Détails par catégorie"));
        assert!(html.contains("Récapitulatif par catégorie"));
        // 1 large + 2 medium + 3 category donuts
        assert_eq!(html.matches("<svg").count(), 6);
    }

    #[test]
    fn test_report_escapes_project_name() {
        let html = render_report(&sample());
        assert!(html.contains("Chantier &lt;Nord&gt;"));
        assert!(!html.contains("<Nord>"));
    }

    #[test]
    fn test_report_totals_use_french_format() {
        let html = render_report(&sample());
        assert!(html.contains("1\u{202F}512,50"));
        assert!(html.contains(">25%<"));
    }

    #[test]
    fn test_report_is_deterministic() {
        assert_eq!(render_report(&sample()), render_report(&sample()));
    }

    #[test]
    fn test_pdf_filename() {
        assert_eq!(pdf_filename("Chantier Nord 2025"), "synthese-Chantier-Nord-2025.pdf");
        assert_eq!(pdf_filename("Été"), "synthese--t-.pdf");
    }
}
