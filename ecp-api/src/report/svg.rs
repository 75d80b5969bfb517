//! SVG donut charts
//!
//! Slices start at 12 o'clock and run clockwise, separated by a small gap
//! when more than one slice is visible. Coordinates are printed with three
//! decimals so output is stable across platforms.

use std::f64::consts::PI;
use std::fmt::Write;

use super::aggregate::Slice;
use super::format::{escape_html, fmt_pct};

/// Angular gap between adjacent slices, in degrees
const GAP_DEGREES: f64 = 1.8;

/// A slice at or above this share is drawn as a full ring
const FULL_RING_PCT: f64 = 99.9;

/// Slices below this share get no percentage label
const LABEL_MIN_PCT: f64 = 4.0;

const EMPTY_FILL: &str = "#e5e7eb";

#[derive(Debug, Clone, Copy)]
pub struct DonutGeometry {
    pub width: f64,
    pub height: f64,
    pub r_outer: f64,
    pub r_inner: f64,
    /// Compact typography for category cards
    pub small: bool,
}

impl DonutGeometry {
    /// Category emissions donut
    pub const LARGE: DonutGeometry = DonutGeometry {
        width: 260.0,
        height: 260.0,
        r_outer: 88.0,
        r_inner: 56.0,
        small: false,
    };

    /// Classification donuts
    pub const MEDIUM: DonutGeometry = DonutGeometry {
        width: 180.0,
        height: 180.0,
        r_outer: 60.0,
        r_inner: 38.0,
        small: false,
    };

    /// Per-category cards
    pub const SMALL: DonutGeometry = DonutGeometry {
        width: 130.0,
        height: 130.0,
        r_outer: 46.0,
        r_inner: 29.0,
        small: true,
    };
}

/// Text shown in the donut hole
#[derive(Debug, Clone, Copy)]
pub struct CenterText<'a> {
    pub label: &'a str,
    pub value: &'a str,
    pub unit: Option<&'a str>,
}

fn n(v: f64) -> String {
    let s = format!("{:.3}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

fn ring(out: &mut String, cx: f64, cy: f64, g: &DonutGeometry, fill: &str) {
    let _ = write!(
        out,
        r#"<circle cx="{}" cy="{}" r="{}" fill="{}"/><circle cx="{}" cy="{}" r="{}" fill="white"/>"#,
        n(cx),
        n(cy),
        n(g.r_outer),
        fill,
        n(cx),
        n(cy),
        n(g.r_inner)
    );
}

/// Render a donut chart as a standalone `<svg>` element
pub fn donut_svg(slices: &[Slice], g: DonutGeometry, center: CenterText<'_>) -> String {
    let cx = g.width / 2.0;
    let cy = g.height / 2.0;
    let total: f64 = slices.iter().map(|s| s.value.max(0.0)).sum();
    let active = slices.iter().filter(|s| s.value > 0.0).count();
    let gap = if active > 1 { GAP_DEGREES * PI / 180.0 } else { 0.0 };

    let mut paths = String::new();
    let mut texts = String::new();

    if total <= 0.0 {
        ring(&mut paths, cx, cy, &g, EMPTY_FILL);
    } else {
        let mut start = -PI / 2.0;
        for slice in slices {
            let v = slice.value.max(0.0);
            if v == 0.0 {
                continue;
            }
            let sweep = v / total * PI * 2.0;
            let pct = v / total * 100.0;

            // A 100% arc starts and ends on the same point, so draw a ring instead
            if pct >= FULL_RING_PCT {
                ring(&mut paths, cx, cy, &g, slice.color);
                start += sweep;
                continue;
            }

            let ds = start + gap;
            let de = start + sweep - gap;
            if de > ds {
                let large_arc = if de - ds > PI { 1 } else { 0 };
                let (x1, y1) = (cx + g.r_outer * ds.cos(), cy + g.r_outer * ds.sin());
                let (x2, y2) = (cx + g.r_outer * de.cos(), cy + g.r_outer * de.sin());
                let (x3, y3) = (cx + g.r_inner * de.cos(), cy + g.r_inner * de.sin());
                let (x4, y4) = (cx + g.r_inner * ds.cos(), cy + g.r_inner * ds.sin());
                let _ = write!(
                    paths,
                    r#"<path d="M{} {} A{} {} 0 {} 1 {} {} L{} {} A{} {} 0 {} 0 {} {}Z" fill="{}"/>"#,
                    n(x1),
                    n(y1),
                    n(g.r_outer),
                    n(g.r_outer),
                    large_arc,
                    n(x2),
                    n(y2),
                    n(x3),
                    n(y3),
                    n(g.r_inner),
                    n(g.r_inner),
                    large_arc,
                    n(x4),
                    n(y4),
                    slice.color
                );

                if pct >= LABEL_MIN_PCT {
                    let mid = start + sweep / 2.0;
                    let r = g.r_inner + (g.r_outer - g.r_inner) * 0.58;
                    let _ = write!(
                        texts,
                        r#"<text x="{}" y="{}" text-anchor="middle" dominant-baseline="central" font-size="{}" font-weight="700" fill="rgba(255,255,255,.93)" stroke="rgba(0,0,0,.4)" stroke-width="2.5" paint-order="stroke">{}</text>"#,
                        n(cx + r * mid.cos()),
                        n(cy + r * mid.sin()),
                        if g.small { 9 } else { 11 },
                        escape_html(&fmt_pct(pct))
                    );
                }
            }
            start += sweep;
        }
    }

    let (value_fs, label_fs, unit_fs, offset) = if g.small {
        (15, 10, 9, 12.0)
    } else {
        (20, 11, 10, 15.0)
    };

    let mut center_svg = String::new();
    let _ = write!(
        center_svg,
        r#"<text x="{}" y="{}" text-anchor="middle" font-size="{}" fill="rgba(5,46,22,.55)">{}</text>"#,
        n(cx),
        n(cy - offset),
        label_fs,
        escape_html(center.label)
    );
    let _ = write!(
        center_svg,
        r##"<text x="{}" y="{}" text-anchor="middle" font-size="{}" font-weight="600" fill="#052e16">{}</text>"##,
        n(cx),
        n(cy + if g.small { 3.0 } else { 4.0 }),
        value_fs,
        escape_html(center.value)
    );
    if let Some(unit) = center.unit {
        let _ = write!(
            center_svg,
            r#"<text x="{}" y="{}" text-anchor="middle" font-size="{}" fill="rgba(5,46,22,.5)">{}</text>"#,
            n(cx),
            n(cy + if g.small { 17.0 } else { 22.0 }),
            unit_fs,
            escape_html(unit)
        );
    }

    format!(
        r#"<svg width="{w}" height="{h}" viewBox="0 0 {w} {h}" xmlns="http://www.w3.org/2000/svg">{paths}{texts}{center_svg}</svg>"#,
        w = n(g.width),
        h = n(g.height),
    )
}
