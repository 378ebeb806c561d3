//! PNG charts rendered with plotters.
//!
//! Text needs a TrueType font registered with plotters. When none can be found the
//! charts are still drawn, without captions, axis labels or legends.

use crate::config::ReportConfig;
use crate::error::MlError;
use plotters::prelude::*;
use plotters::style::FontStyle;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const FONT_FAMILY: &str = "sans-serif";

const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

static FONT_READY: OnceLock<bool> = OnceLock::new();

/// Register a chart font once per process. Returns whether text can be drawn.
pub fn ensure_font(configured: Option<&Path>) -> bool {
    *FONT_READY.get_or_init(|| {
        let candidates = configured
            .map(Path::to_path_buf)
            .into_iter()
            .chain(SYSTEM_FONTS.iter().map(PathBuf::from));
        for path in candidates {
            let Ok(bytes) = std::fs::read(&path) else {
                continue;
            };
            // plotters keeps registered font data for the process lifetime.
            let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
            if plotters::style::register_font(FONT_FAMILY, FontStyle::Normal, bytes).is_ok() {
                tracing::debug!(font = %path.display(), "Registered chart font");
                return true;
            }
        }
        tracing::warn!("No TrueType font found; charts are drawn without text");
        false
    })
}

/// Size and font settings shared by every chart.
#[derive(Debug, Clone)]
pub struct ChartSettings {
    pub width: u32,
    pub height: u32,
    pub font_path: Option<PathBuf>,
}

impl ChartSettings {
    pub fn from_config(config: &ReportConfig) -> Self {
        Self {
            width: config.chart_width,
            height: config.chart_height,
            font_path: config.font_path.clone(),
        }
    }

    fn text_enabled(&self) -> bool {
        ensure_font(self.font_path.as_deref())
    }
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self::from_config(&ReportConfig::default())
    }
}

fn chart_err(e: impl std::fmt::Display) -> MlError {
    MlError::chart(e.to_string())
}

/// One bar per label, annotated with the label and value when text is available.
pub fn bar_chart(
    path: &Path,
    title: &str,
    y_desc: &str,
    bars: &[(String, f64)],
    settings: &ChartSettings,
) -> Result<(), MlError> {
    if bars.is_empty() {
        return Err(MlError::chart(format!("no data for {}", path.display())));
    }
    let text = settings.text_enabled();
    let root = BitMapBackend::new(path, (settings.width, settings.height)).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    let peak = bars
        .iter()
        .map(|(_, v)| *v)
        .filter(|v| v.is_finite())
        .fold(0.0_f64, f64::max);
    let y_max = if peak > 0.0 { peak * 1.15 } else { 1.0 };

    let mut builder = ChartBuilder::on(&root);
    builder.margin(20);
    if text {
        builder
            .caption(title, (FONT_FAMILY, 26))
            .x_label_area_size(20)
            .y_label_area_size(60);
    }
    let mut chart = builder
        .build_cartesian_2d(0f64..bars.len() as f64, 0f64..y_max)
        .map_err(chart_err)?;

    if text {
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(0)
            .y_desc(y_desc)
            .draw()
            .map_err(chart_err)?;
    }

    chart
        .draw_series(bars.iter().enumerate().map(|(i, (_, v))| {
            Rectangle::new(
                [(i as f64 + 0.1, 0.0), (i as f64 + 0.9, v.max(0.0))],
                Palette99::pick(i).filled(),
            )
        }))
        .map_err(chart_err)?;

    if text {
        let style = TextStyle::from((FONT_FAMILY, 14).into_font())
            .pos(Pos::new(HPos::Center, VPos::Bottom));
        chart
            .draw_series(bars.iter().enumerate().map(|(i, (label, v))| {
                Text::new(
                    format!("{label} ({v:.2})"),
                    (i as f64 + 0.5, v.max(0.0)),
                    style.clone(),
                )
            }))
            .map_err(chart_err)?;
    }

    root.present().map_err(chart_err)?;
    Ok(())
}

/// A series of points drawn in one colour per group.
pub struct ScatterGroup {
    pub label: String,
    pub points: Vec<(f64, f64)>,
}

/// Scatter plot of several groups with a legend when text is available.
pub fn scatter_chart(
    path: &Path,
    title: &str,
    x_desc: &str,
    y_desc: &str,
    groups: &[ScatterGroup],
    settings: &ChartSettings,
) -> Result<(), MlError> {
    let all = groups.iter().flat_map(|g| g.points.iter());
    let x_peak = all
        .clone()
        .map(|p| p.0)
        .filter(|v| v.is_finite())
        .fold(0.0_f64, f64::max);
    let y_peak = all
        .map(|p| p.1)
        .filter(|v| v.is_finite())
        .fold(0.0_f64, f64::max);
    if groups.iter().all(|g| g.points.is_empty()) {
        return Err(MlError::chart(format!("no data for {}", path.display())));
    }
    let x_max = if x_peak > 0.0 { x_peak * 1.1 } else { 1e-3 };
    let y_max = if y_peak > 0.0 { y_peak * 1.05 } else { 1.0 };

    let text = settings.text_enabled();
    let root = BitMapBackend::new(path, (settings.width, settings.height)).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    let mut builder = ChartBuilder::on(&root);
    builder.margin(20);
    if text {
        builder
            .caption(title, (FONT_FAMILY, 26))
            .x_label_area_size(45)
            .y_label_area_size(60);
    }
    let mut chart = builder
        .build_cartesian_2d(0f64..x_max, 0f64..y_max)
        .map_err(chart_err)?;

    if text {
        chart
            .configure_mesh()
            .x_desc(x_desc)
            .y_desc(y_desc)
            .draw()
            .map_err(chart_err)?;
    }

    for (i, group) in groups.iter().enumerate() {
        let color = Palette99::pick(i).to_rgba();
        let series = chart
            .draw_series(
                group
                    .points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 5, color.filled())),
            )
            .map_err(chart_err)?;
        if text {
            series
                .label(group.label.as_str())
                .legend(move |(x, y)| Circle::new((x, y), 5, color.filled()));
        }
    }

    if text {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(chart_err)?;
    }

    root.present().map_err(chart_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn small() -> ChartSettings {
        ChartSettings {
            width: 320,
            height: 240,
            font_path: None,
        }
    }

    #[test]
    fn test_bar_chart_writes_png() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bars.png");
        let bars = vec![("KNN".to_string(), 93.5), ("Majority".to_string(), 33.0)];
        bar_chart(&path, "Best scores", "score", &bars, &small()).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }

    #[test]
    fn test_bar_chart_rejects_empty() {
        let dir = TempDir::new().unwrap();
        assert!(bar_chart(&dir.path().join("x.png"), "t", "y", &[], &small()).is_err());
    }

    #[test]
    fn test_scatter_chart_writes_png() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ranking.png");
        let groups = vec![
            ScatterGroup {
                label: "iris".into(),
                points: vec![(0.01, 90.0), (0.02, 95.0)],
            },
            ScatterGroup {
                label: "wine".into(),
                points: vec![(0.0, 0.0)],
            },
        ];
        scatter_chart(&path, "Ranking", "dauer", "score", &groups, &small()).unwrap();
        assert!(path.exists());
    }
}
