//! Sorting and filtering of the review table
//!
//! One numeric column sorts at a time. Rows requiring verification stay
//! pinned above the others whatever the sort; missing values go last in
//! both directions and ties keep fetch order.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use ecp_common::models::{ActivityCategory, ResultRow, VerificationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    TotalPrice,
    TotalEmission,
}

impl SortKey {
    fn value(&self, row: &ResultRow) -> Option<f64> {
        let v = match self {
            SortKey::TotalPrice => row.total_price_eur,
            SortKey::TotalEmission => row.total_emission,
        };
        v.filter(|v| !v.is_nan())
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "price" | "prix" | "total_price" => Ok(SortKey::TotalPrice),
            "emission" | "total_emission" => Ok(SortKey::TotalEmission),
            other => Err(format!("Unknown sort column: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Desc,
    Asc,
}

/// Active sort, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortState {
    active: Option<(SortKey, SortDirection)>,
}

impl SortState {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self {
            active: Some((key, direction)),
        }
    }

    pub fn active(&self) -> Option<(SortKey, SortDirection)> {
        self.active
    }

    /// Column header click: desc, then asc, then unsorted
    ///
    /// Clicking another column starts over at desc on that column.
    pub fn click(&mut self, key: SortKey) {
        self.active = match self.active {
            Some((k, SortDirection::Desc)) if k == key => Some((key, SortDirection::Asc)),
            Some((k, SortDirection::Asc)) if k == key => None,
            _ => Some((key, SortDirection::Desc)),
        };
    }

    fn compare(&self, a: &ResultRow, b: &ResultRow) -> Ordering {
        let Some((key, direction)) = self.active else {
            return Ordering::Equal;
        };
        match (key.value(a), key.value(b)) {
            (Some(x), Some(y)) => {
                let ord = x.total_cmp(&y);
                match direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

/// Category and verification-status filters, combined with AND
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Filters {
    pub category: Option<ActivityCategory>,
    /// Matched against the effective verification status
    pub status: Option<VerificationStatus>,
}

impl Filters {
    pub fn matches(&self, row: &ResultRow) -> bool {
        let category_ok = self.category.map_or(true, |c| row.category == Some(c));
        let status_ok = self
            .status
            .map_or(true, |s| row.effective_verification() == s);
        category_ok && status_ok
    }

    /// Back to "all" on both filters
    pub fn reset(&mut self) {
        *self = Filters::default();
    }

    pub fn is_active(&self) -> bool {
        self.category.is_some() || self.status.is_some()
    }
}

impl fmt::Display for Filters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "catégorie: {}, statut: {}",
            self.category.map(|c| c.label()).unwrap_or("toutes"),
            self.status.map(|s| s.label()).unwrap_or("tous")
        )
    }
}

/// Rows to display, in display order
pub fn visible_rows<'a>(
    rows: &'a [ResultRow],
    filters: &Filters,
    sort: &SortState,
) -> Vec<&'a ResultRow> {
    let mut visible: Vec<&ResultRow> = rows.iter().filter(|r| filters.matches(r)).collect();
    // sort_by is stable, so equal rows keep fetch order
    visible.sort_by(|a, b| {
        b.requires_verification
            .cmp(&a.requires_verification)
            .then_with(|| sort.compare(a, b))
    });
    visible
}
