//! Report aggregation
//!
//! Turns result rows into the figures the synthesis report displays:
//! headline totals, the category emissions breakdown, the two classification
//! breakdowns, one valorization breakdown per category and the recap table.
//! Everything is ordered deterministically so identical rows give identical output.

use ecp_common::models::{ActivityCategory, FactorOrigin, ResultRow};
use std::collections::BTreeMap;

/// Report palette
pub mod palette {
    pub const EMERALD: &str = "#047857";
    pub const TEAL: &str = "#0D9488";
    pub const FOREST: &str = "#0F3D2E";
    pub const CLAY: &str = "#9F2D20";
    pub const STONE: &str = "#CBD5E1";
    pub const SLATE: &str = "#475569";
    pub const AMBER: &str = "#F59E0B";
    pub const SAGE: &str = "#84A98C";
    pub const MOSS: &str = "#3F6212";

    /// Colors of the category emissions donut, in slice order
    pub const EMISSIONS: [&str; 9] = [EMERALD, TEAL, FOREST, CLAY, AMBER, MOSS, SAGE, SLATE, STONE];
}

/// Number of categories shown individually before grouping into "Autres"
pub const TOP_CATEGORIES: usize = 8;

/// Recap label for rows without a category
pub const UNCATEGORIZED: &str = "Sans catégorie";

#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    pub label: String,
    pub value: f64,
    pub color: &'static str,
    /// Line count shown in legends, when meaningful
    pub lines: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryCard {
    pub category: ActivityCategory,
    pub title: &'static str,
    pub total_kg: f64,
    pub lines: usize,
    pub slices: Vec<Slice>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecapLine {
    pub label: String,
    pub lines: usize,
    pub kg: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportData {
    pub project_name: String,
    pub total_lines: usize,
    pub total_kg: f64,
    pub found: usize,
    pub not_found: usize,
    pub monetary: usize,
    pub physical: usize,
    pub emission_slices: Vec<Slice>,
    pub monetary_slices: Vec<Slice>,
    pub found_slices: Vec<Slice>,
    pub cards: Vec<CategoryCard>,
    pub recap: Vec<RecapLine>,
}

impl ReportData {
    /// Share of rows without a matching factor, in percent
    pub fn not_found_pct(&self) -> f64 {
        pct(self.not_found, self.total_lines)
    }

    /// Share of monetary factors among valorized rows, in percent
    pub fn monetary_pct(&self) -> f64 {
        pct(self.monetary, self.found)
    }

    pub fn recap_totals(&self) -> (usize, f64) {
        self.recap
            .iter()
            .fold((0, 0.0), |(lines, kg), r| (lines + r.lines, kg + r.kg))
    }
}

fn pct(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn sum_kg<'a>(rows: impl IntoIterator<Item = &'a ResultRow>) -> f64 {
    rows.into_iter().map(ResultRow::emission_kg).sum()
}

fn is_found(r: &ResultRow) -> bool {
    r.factor_found
}

fn is_not_found(r: &ResultRow) -> bool {
    !r.factor_found
}

fn is_default_monetary(r: &ResultRow) -> bool {
    r.factor_origin() == FactorOrigin::DefaultMonetary
}

type RowRule = fn(&ResultRow) -> bool;

/// One valorization slice of a category card
struct SliceRule {
    label: &'static str,
    color: &'static str,
    matches: RowRule,
}

fn rule(label: &'static str, color: &'static str, matches: RowRule) -> SliceRule {
    SliceRule {
        label,
        color,
        matches,
    }
}

fn card_rules(category: ActivityCategory) -> Vec<SliceRule> {
    use palette::*;
    use ActivityCategory::*;

    let not_valorized = || rule("Non valorisées", CLAY, is_not_found);

    match category {
        AchatMateriel => vec![
            rule("FE monétaire", EMERALD, |r| is_found(r) && r.is_monetary()),
            rule("FE réel", TEAL, |r| is_found(r) && !r.is_monetary()),
            not_valorized(),
        ],
        LocationMateriel => vec![rule("FE monétaire", EMERALD, is_found), not_valorized()],
        LocationVehicule => vec![
            rule("FE physique", TEAL, |r| is_found(r) && !r.is_monetary()),
            rule("FE monétaire", AMBER, |r| {
                is_found(r) && r.is_monetary() && !is_default_monetary(r)
            }),
            rule("FE par défaut", FOREST, |r| is_found(r) && is_default_monetary(r)),
            not_valorized(),
        ],
        Prestation => vec![
            rule("FE monétaire", EMERALD, |r| {
                is_found(r) && !is_default_monetary(r) && r.factor_origin() != FactorOrigin::Supplier
            }),
            rule("FE Fournisseur", TEAL, |r| {
                is_found(r) && r.factor_origin() == FactorOrigin::Supplier
            }),
            rule("FE par défaut", FOREST, |r| is_found(r) && is_default_monetary(r)),
            not_valorized(),
        ],
        Assurance => vec![
            rule("FE monétaire", MOSS, |r| {
                is_found(r) && r.factor_origin() != FactorOrigin::DefaultInsurance
            }),
            rule("FE par défaut", TEAL, |r| {
                is_found(r) && r.factor_origin() == FactorOrigin::DefaultInsurance
            }),
            not_valorized(),
        ],
        Energie => vec![rule("FE Physique", EMERALD, is_found), not_valorized()],
        Fret => vec![
            rule("FE physique", FOREST, |r| is_found(r) && !r.is_monetary()),
            rule("FE monétaire", TEAL, |r| {
                is_found(r) && r.is_monetary() && !is_default_monetary(r)
            }),
            rule("FE par défaut", AMBER, |r| is_found(r) && is_default_monetary(r)),
            not_valorized(),
        ],
        Annexe => vec![rule("Annexe", SAGE, |_| true)],
    }
}

fn card_title(category: ActivityCategory) -> &'static str {
    match category {
        ActivityCategory::LocationVehicule => "Location de véhicule",
        other => other.label(),
    }
}

fn build_card(category: ActivityCategory, rows: &[&ResultRow]) -> CategoryCard {
    let slices = card_rules(category)
        .into_iter()
        .filter_map(|rule| {
            let matching: Vec<&ResultRow> =
                rows.iter().copied().filter(|r| (rule.matches)(r)).collect();
            if matching.is_empty() {
                return None;
            }
            Some(Slice {
                label: rule.label.to_string(),
                value: sum_kg(matching.iter().copied()),
                color: rule.color,
                lines: Some(matching.len()),
            })
        })
        .collect();

    CategoryCard {
        category,
        title: card_title(category),
        total_kg: sum_kg(rows.iter().copied()),
        lines: rows.len(),
        slices,
    }
}

/// Sort descending by value, keeping input order for ties
fn sort_desc<T>(items: &mut [T], key: impl Fn(&T) -> f64) {
    items.sort_by(|a, b| key(b).total_cmp(&key(a)));
}

/// Aggregate every figure of the synthesis report
pub fn aggregate(project_name: &str, rows: &[ResultRow]) -> ReportData {
    let total_lines = rows.len();
    let total_kg = sum_kg(rows);
    let found = rows.iter().filter(|r| is_found(r)).count();
    let not_found = total_lines - found;
    let monetary = rows.iter().filter(|r| is_found(r) && r.is_monetary()).count();
    let physical = found - monetary;

    // Group by category in canonical order
    let mut by_category: BTreeMap<ActivityCategory, Vec<&ResultRow>> = BTreeMap::new();
    let mut uncategorized: Vec<&ResultRow> = Vec::new();
    for row in rows {
        match row.category {
            Some(c) => by_category.entry(c).or_default().push(row),
            None => uncategorized.push(row),
        }
    }

    // Category emissions: top N plus "Autres"
    let mut emitting: Vec<(ActivityCategory, f64, usize)> = by_category
        .iter()
        .map(|(c, list)| (*c, sum_kg(list.iter().copied()), list.len()))
        .filter(|(_, kg, _)| *kg > 0.0)
        .collect();
    sort_desc(&mut emitting, |(_, kg, _)| *kg);

    let rest = if emitting.len() > TOP_CATEGORIES {
        emitting.split_off(TOP_CATEGORIES)
    } else {
        Vec::new()
    };
    let emission_slices: Vec<Slice> = emitting
        .iter()
        .map(|(c, kg, lines)| (c.label().to_string(), *kg, *lines))
        .chain((!rest.is_empty()).then(|| {
            (
                "Autres".to_string(),
                rest.iter().map(|(_, kg, _)| *kg).sum::<f64>(),
                rest.iter().map(|(_, _, n)| *n).sum::<usize>(),
            )
        }))
        .enumerate()
        .map(|(i, (label, value, lines))| Slice {
            label,
            value,
            color: palette::EMISSIONS[i % palette::EMISSIONS.len()],
            lines: Some(lines),
        })
        .collect();

    let monetary_slices = vec![
        Slice {
            label: "Monétaire".to_string(),
            value: monetary as f64,
            color: palette::AMBER,
            lines: None,
        },
        Slice {
            label: "Physique".to_string(),
            value: physical as f64,
            color: palette::SAGE,
            lines: None,
        },
    ];

    let found_slices = vec![
        Slice {
            label: "Valorisées".to_string(),
            value: found as f64,
            color: palette::FOREST,
            lines: None,
        },
        Slice {
            label: "Non valorisées".to_string(),
            value: not_found as f64,
            color: palette::CLAY,
            lines: None,
        },
    ];

    let mut cards: Vec<CategoryCard> = by_category
        .iter()
        .map(|(c, list)| build_card(*c, list))
        .collect();
    sort_desc(&mut cards, |card| card.total_kg);

    let mut recap: Vec<RecapLine> = by_category
        .iter()
        .map(|(c, list)| RecapLine {
            label: c.label().to_string(),
            lines: list.len(),
            kg: sum_kg(list.iter().copied()),
        })
        .collect();
    if !uncategorized.is_empty() {
        recap.push(RecapLine {
            label: UNCATEGORIZED.to_string(),
            lines: uncategorized.len(),
            kg: sum_kg(uncategorized.iter().copied()),
        });
    }

    ReportData {
        project_name: project_name.to_string(),
        total_lines,
        total_kg,
        found,
        not_found,
        monetary,
        physical,
        emission_slices,
        monetary_slices,
        found_slices,
        cards,
        recap,
    }
}
