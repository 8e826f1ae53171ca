// 📈 Charts - SVG renderings of the three analysis outputs
// Stateless: each function reads its input and writes one file.

use crate::aggregate::{CategoryEncoding, CitySummaryRecord, CorrelationMatrix, IncomeFatalityPoint};
use crate::record::Indicator;
use anyhow::Result;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::FontTransform;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const CORRELATION_CHART: &str = "correlation_matrix.svg";
pub const INCOME_CHART: &str = "income_vs_fatalities.svg";
pub const CITY_CHART: &str = "citywise_median_income.svg";

const FONT: &str = "sans-serif";

/// What happened to one chart
#[derive(Debug, Clone, PartialEq)]
pub enum ChartOutcome {
    Written(PathBuf),
    /// Nothing to draw; the reason is logged
    Skipped(String),
}

impl ChartOutcome {
    fn skipped(chart: &str, reason: &str) -> Self {
        warn!(chart, "skipping chart: {}", reason);
        ChartOutcome::Skipped(reason.to_string())
    }
}

/// City labels from Latin-1 data may carry the 0x96 dash
pub fn display_city(city: &str) -> String {
    city.replace('\u{96}', "-")
}

// ============================================================================
// COLOR SCALE
// ============================================================================

const COOL: (f64, f64, f64) = (59.0, 76.0, 192.0);
const NEUTRAL: (f64, f64, f64) = (221.0, 221.0, 221.0);
const WARM: (f64, f64, f64) = (180.0, 4.0, 38.0);

fn lerp(a: (f64, f64, f64), b: (f64, f64, f64), t: f64) -> RGBColor {
    let mix = |x: f64, y: f64| (x + (y - x) * t).round().clamp(0.0, 255.0) as u8;
    RGBColor(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
}

/// Diverging cool/warm color for a coefficient in [-1, 1]
pub fn coolwarm(value: f64) -> RGBColor {
    let v = value.clamp(-1.0, 1.0);
    if v < 0.0 {
        lerp(NEUTRAL, COOL, -v)
    } else {
        lerp(NEUTRAL, WARM, v)
    }
}

// ============================================================================
// CORRELATION HEATMAP
// ============================================================================

/// Annotated heatmap of the correlation matrix.
/// An empty matrix is not an error: the chart is skipped.
pub fn plot_correlation(matrix: &CorrelationMatrix, path: &Path) -> Result<ChartOutcome> {
    if matrix.columns.is_empty() || matrix.is_empty() {
        return Ok(ChartOutcome::skipped(CORRELATION_CHART, "correlation matrix is empty"));
    }

    let n = matrix.columns.len() as i32;
    let (width, height) = (1000u32, 1000u32);
    let left = 200;
    let top = 70;
    let cell = ((width as i32 - left - 40) / n).min((height as i32 - top - 200) / n);

    let root = SVGBackend::new(path, (width, height)).into_drawing_area();
    root.fill(&WHITE)?;

    root.draw(&Text::new(
        "Correlation Matrix of Key Metrics",
        (width as i32 / 2, 30),
        TextStyle::from((FONT, 24).into_font()).pos(Pos::new(HPos::Center, VPos::Center)),
    ))?;

    for (i, row) in matrix.values.iter().enumerate() {
        for (j, value) in row.iter().enumerate() {
            let x0 = left + j as i32 * cell;
            let y0 = top + i as i32 * cell;
            let fill = value.map(coolwarm).unwrap_or(RGBColor(240, 240, 240));

            root.draw(&Rectangle::new([(x0, y0), (x0 + cell, y0 + cell)], fill.filled()))?;
            root.draw(&Rectangle::new([(x0, y0), (x0 + cell, y0 + cell)], WHITE.stroke_width(1)))?;

            let label = value.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".to_string());
            root.draw(&Text::new(
                label,
                (x0 + cell / 2, y0 + cell / 2),
                (FONT, 13).into_font().color(&BLACK).pos(Pos::new(HPos::Center, VPos::Center)),
            ))?;
        }
    }

    for (k, name) in matrix.columns.iter().enumerate() {
        let offset = k as i32 * cell + cell / 2;
        root.draw(&Text::new(
            name.clone(),
            (left - 8, top + offset),
            TextStyle::from((FONT, 12).into_font()).pos(Pos::new(HPos::Right, VPos::Center)),
        ))?;
        root.draw(&Text::new(
            name.clone(),
            (left + offset, top + n * cell + 8),
            TextStyle::from((FONT, 12).into_font().transform(FontTransform::Rotate90))
                .pos(Pos::new(HPos::Left, VPos::Center)),
        ))?;
    }

    root.present()?;
    info!("Saved correlation plot to {}", path.display());
    Ok(ChartOutcome::Written(path.to_path_buf()))
}

// ============================================================================
// INCOME VS FATALITIES
// ============================================================================

/// Box plot of median income per encoded manner of death.
/// Rows without an income value are left out.
pub fn plot_income_vs_fatalities(
    points: &[IncomeFatalityPoint],
    encoding: &CategoryEncoding,
    path: &Path,
) -> Result<ChartOutcome> {
    let mut groups: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
    for p in points {
        if let Some(income) = p.median_income {
            groups.entry(p.manner_of_death_encoded).or_default().push(income);
        }
    }

    let Some(max_code) = groups.keys().next_back().copied() else {
        return Ok(ChartOutcome::skipped(INCOME_CHART, "no rows with median income"));
    };

    let all = groups.values().flatten();
    let lo = all.clone().fold(f64::INFINITY, |a, b| a.min(*b));
    let hi = all.fold(f64::NEG_INFINITY, |a, b| a.max(*b));
    let pad = ((hi - lo) * 0.05).max(1.0);

    let root = SVGBackend::new(path, (1000, 1000)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Relationship Between Median Income and Fatalities", (FONT, 24))
        .margin(20)
        .x_label_area_size(120)
        .y_label_area_size(90)
        .build_cartesian_2d(
            (0i32..max_code as i32 + 1).into_segmented(),
            (lo - pad) as f32..(hi + pad) as f32,
        )?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("Fatalities (Encoded)")
        .y_desc("Median Income")
        .x_labels(max_code as usize + 1)
        .x_label_style((FONT, 11).into_font().transform(FontTransform::Rotate90))
        .x_label_formatter(&|v| match v {
            SegmentValue::CenterOf(code) => match encoding.label(*code as i64) {
                Some(label) => format!("{} ({})", code, label),
                None => code.to_string(),
            },
            _ => String::new(),
        })
        .draw()?;

    chart.draw_series(groups.iter().map(|(code, values)| {
        Boxplot::new_vertical(SegmentValue::CenterOf(*code as i32), &Quartiles::new(values))
            .width(30)
            .style(BLUE.stroke_width(2))
    }))?;

    root.present()?;
    info!("Saved income vs fatalities plot to {}", path.display());
    Ok(ChartOutcome::Written(path.to_path_buf()))
}

// ============================================================================
// CITY SUMMARY
// ============================================================================

/// Bar chart of mean median income for each summary city, in the order given.
pub fn plot_city_summary(rows: &[CitySummaryRecord], path: &Path) -> Result<ChartOutcome> {
    let bars: Vec<(i32, f64)> = rows
        .iter()
        .enumerate()
        .filter_map(|(i, r)| r.mean(Indicator::MedianIncome).map(|v| (i as i32, v)))
        .collect();

    if bars.is_empty() {
        return Ok(ChartOutcome::skipped(CITY_CHART, "no city has a median income"));
    }

    let labels: Vec<String> = rows.iter().map(|r| display_city(&r.city)).collect();
    let max = bars.iter().map(|(_, v)| *v).fold(1.0f64, f64::max);
    let min = bars.iter().map(|(_, v)| *v).fold(0.0f64, f64::min);

    let root = SVGBackend::new(path, (1400, 1000)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(format!("Top {} Cities by Median Income", rows.len()), (FONT, 24))
        .margin(20)
        .x_label_area_size(180)
        .y_label_area_size(90)
        .build_cartesian_2d((0i32..rows.len() as i32).into_segmented(), min * 1.1..max * 1.1)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("City")
        .y_desc("Median Income")
        .x_labels(labels.len())
        .x_label_style((FONT, 9).into_font().transform(FontTransform::Rotate90))
        .x_label_formatter(&|v| match v {
            SegmentValue::CenterOf(i) => labels.get(*i as usize).cloned().unwrap_or_default(),
            _ => String::new(),
        })
        .draw()?;

    chart.draw_series(
        Histogram::vertical(&chart)
            .style(BLUE.mix(0.7).filled())
            .margin(1)
            .data(bars),
    )?;

    root.present()?;
    info!("Saved city summary plot to {}", path.display());
    Ok(ChartOutcome::Written(path.to_path_buf()))
}
