/// Alignment and mel-spectrogram heatmaps for training diagnostics
///
/// Every plot is a single PNG written to the given path, replacing any existing
/// file. Values are mapped through a viridis palette scaled to the array's
/// finite min/max, with a colour bar alongside each heatmap.
use ndarray::{s, ArrayView2};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::Path;

use crate::SpeakerDataError;

const FONT: &str = "sans-serif";

const ALIGNMENT_DIMS: (u32, u32) = (800, 600);
const SPECTROGRAM_DIMS: (u32, u32) = (1000, 800);

const TITLE_FONT_SIZE: i32 = 22;
const LABEL_FONT_SIZE: i32 = 16;
const TICKS_FONT_SIZE: i32 = 12;
const LINE_SPACING: i32 = 6;

const X_LABEL_AREA_SIZE: u32 = 40;
const Y_LABEL_AREA_SIZE: u32 = 50;
const COLOUR_BAR_WIDTH: u32 = 90;
const COLOUR_BAR_STEPS: usize = 128;

const MARGIN: i32 = 10;

/// Viridis anchors, evenly spaced over [0, 1]
const VIRIDIS: [(u8, u8, u8); 9] = [
    (68, 1, 84),
    (71, 44, 122),
    (59, 81, 139),
    (44, 113, 142),
    (33, 144, 141),
    (39, 173, 129),
    (92, 200, 99),
    (170, 220, 50),
    (253, 231, 37),
];

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

/// Presentation options shared by both plots
#[derive(Debug, Clone)]
pub struct PlotOptions {
    pub title: Option<String>,
    /// Wrap the title every `max_words` words
    pub split_title: bool,
    pub max_words: usize,
    /// Keep only the first `max_len` steps (decoder steps or frames)
    pub max_len: Option<usize>,
    /// Draw titles, axis labels and tick labels; needs a system font
    pub annotate: bool,
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self {
            title: None,
            split_title: false,
            max_words: 5,
            max_len: None,
            annotate: true,
        }
    }
}

impl PlotOptions {
    pub fn with_title<S: Into<String>>(title: S) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// Title as it will be rendered, wrapped when `split_title` is set
    pub fn title_text(&self) -> Option<String> {
        self.title.as_ref().map(|title| {
            if self.split_title {
                split_title_line(title, self.max_words)
            } else {
                title.clone()
            }
        })
    }
}

/// Break `text` into newline-joined lines of at most `max_words` words
pub fn split_title_line(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    words
        .chunks(max_words.max(1))
        .map(|line| line.join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Plot an attention alignment of shape `[encoder_steps, decoder_steps]`
///
/// `max_len` truncates decoder steps. Encoder steps run up the y axis.
pub fn plot_alignment<P: AsRef<Path>>(
    alignment: ArrayView2<'_, f32>,
    path: P,
    options: &PlotOptions,
) -> crate::Result<()> {
    let alignment = match options.max_len {
        Some(max_len) => {
            let cols = max_len.min(alignment.ncols());
            alignment.slice_move(s![.., ..cols])
        }
        None => alignment,
    };
    check_non_empty(alignment)?;

    let root = BitMapBackend::new(path.as_ref(), ALIGNMENT_DIMS).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let body = match options.title_text().filter(|_| options.annotate) {
        Some(title) => {
            let (title_area, body) = root.split_vertically(title_height(&title));
            draw_title(&title_area, &title)?;
            body
        }
        None => root.clone(),
    };

    let axes = options
        .annotate
        .then_some(("Decoder timestep", "Encoder timestep"));
    draw_panel(&body, alignment, axes, None)?;

    root.present().map_err(plot_err)?;
    log::debug!("Saved alignment plot {:?} to {:?}", alignment.dim(), path.as_ref());
    Ok(())
}

/// Plot a predicted mel-spectrogram of shape `[frames, mel_channels]`
///
/// With a `target`, the target panel is drawn above the prediction. `max_len`
/// truncates frames of both. Time runs along x, mel channels up y.
pub fn plot_spectrogram<P: AsRef<Path>>(
    pred: ArrayView2<'_, f32>,
    path: P,
    options: &PlotOptions,
    target: Option<ArrayView2<'_, f32>>,
) -> crate::Result<()> {
    let pred = truncate_frames(pred, options.max_len);
    let target = target.map(|t| truncate_frames(t, options.max_len));
    check_non_empty(pred)?;
    if let Some(target) = target {
        check_non_empty(target)?;
    }

    let root = BitMapBackend::new(path.as_ref(), SPECTROGRAM_DIMS).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    // Title sits underneath the panels
    let panels = match options.title_text().filter(|_| options.annotate) {
        Some(title) => {
            let (_, height) = root.dim_in_pixel();
            let (panels, title_area) =
                root.split_vertically(height.saturating_sub(title_height(&title)));
            draw_title(&title_area, &title)?;
            panels
        }
        None => root.clone(),
    };

    let axes = options.annotate.then_some(("Frame", "Mel channel"));
    let caption = |name: &'static str| options.annotate.then_some(name);
    match target {
        Some(target) => {
            let halves = panels.split_evenly((2, 1));
            draw_panel(
                &halves[0],
                target.reversed_axes(),
                axes,
                caption("Target Mel-Spectrogram"),
            )?;
            draw_panel(
                &halves[1],
                pred.reversed_axes(),
                axes,
                caption("Predicted Mel-Spectrogram"),
            )?;
        }
        None => {
            draw_panel(
                &panels,
                pred.reversed_axes(),
                axes,
                caption("Predicted Mel-Spectrogram"),
            )?;
        }
    }

    root.present().map_err(plot_err)?;
    log::debug!("Saved spectrogram plot {:?} to {:?}", pred.dim(), path.as_ref());
    Ok(())
}

fn plot_err<E: std::fmt::Display>(e: E) -> SpeakerDataError {
    SpeakerDataError::Plot(e.to_string())
}

fn check_non_empty(data: ArrayView2<'_, f32>) -> crate::Result<()> {
    if data.is_empty() {
        return Err(SpeakerDataError::Plot(format!(
            "cannot plot an array of shape {:?}",
            data.shape()
        )));
    }
    Ok(())
}

fn truncate_frames(data: ArrayView2<'_, f32>, max_len: Option<usize>) -> ArrayView2<'_, f32> {
    match max_len {
        Some(max_len) => {
            let rows = max_len.min(data.nrows());
            data.slice_move(s![..rows, ..])
        }
        None => data,
    }
}

fn title_height(title: &str) -> u32 {
    let lines = title.lines().count().max(1) as i32;
    (lines * (TITLE_FONT_SIZE + LINE_SPACING) + 2 * MARGIN) as u32
}

fn draw_title(area: &Area<'_>, title: &str) -> crate::Result<()> {
    let (width, _) = area.dim_in_pixel();
    let style = TextStyle::from((FONT, TITLE_FONT_SIZE).into_font())
        .pos(Pos::new(HPos::Center, VPos::Top));

    for (i, line) in title.lines().enumerate() {
        let y = MARGIN + i as i32 * (TITLE_FONT_SIZE + LINE_SPACING);
        area.draw(&Text::new(line.to_string(), ((width / 2) as i32, y), style.clone()))
            .map_err(plot_err)?;
    }
    Ok(())
}

/// Heatmap of `data` (row 0 at the bottom) with a colour bar on the right
fn draw_panel(
    area: &Area<'_>,
    data: ArrayView2<'_, f32>,
    axes: Option<(&str, &str)>,
    caption: Option<&str>,
) -> crate::Result<()> {
    let (width, _) = area.dim_in_pixel();
    let (map_area, bar_area) = area.split_horizontally(width.saturating_sub(COLOUR_BAR_WIDTH));
    let (rows, cols) = data.dim();
    let (lo, hi) = value_range(data);

    let mut builder = ChartBuilder::on(&map_area);
    builder.margin(MARGIN);
    if let Some(caption) = caption {
        builder.caption(caption, (FONT, LABEL_FONT_SIZE));
    }
    if axes.is_some() {
        builder
            .x_label_area_size(X_LABEL_AREA_SIZE)
            .y_label_area_size(Y_LABEL_AREA_SIZE);
    }
    let mut chart = builder
        .build_cartesian_2d(0..cols, 0..rows)
        .map_err(plot_err)?;

    if let Some((x_desc, y_desc)) = axes {
        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc(x_desc)
            .y_desc(y_desc)
            .label_style((FONT, TICKS_FONT_SIZE).into_font())
            .axis_desc_style((FONT, LABEL_FONT_SIZE).into_font())
            .draw()
            .map_err(plot_err)?;
    }

    chart
        .draw_series(data.indexed_iter().map(|((r, c), &v)| {
            Rectangle::new([(c, r), (c + 1, r + 1)], colour(v as f64, lo, hi).filled())
        }))
        .map_err(plot_err)?;

    draw_colour_bar(&bar_area, lo, hi, axes.is_some(), caption.is_some())
}

fn draw_colour_bar(area: &Area<'_>, lo: f64, hi: f64, annotate: bool, captioned: bool) -> crate::Result<()> {
    let hi = if hi > lo { hi } else { lo + 1.0 };

    let mut builder = ChartBuilder::on(area);
    builder.margin(MARGIN);
    if captioned {
        // Keep the bar level with a captioned heatmap
        builder.margin_top(MARGIN + LABEL_FONT_SIZE + LINE_SPACING);
    }
    if annotate {
        builder
            .x_label_area_size(X_LABEL_AREA_SIZE)
            .y_label_area_size(Y_LABEL_AREA_SIZE);
    }
    let mut chart = builder
        .build_cartesian_2d(0.0..1.0, lo..hi)
        .map_err(plot_err)?;

    if annotate {
        chart
            .configure_mesh()
            .disable_mesh()
            .disable_x_axis()
            .y_labels(5)
            .label_style((FONT, TICKS_FONT_SIZE).into_font())
            .draw()
            .map_err(plot_err)?;
    }

    let step = (hi - lo) / COLOUR_BAR_STEPS as f64;
    chart
        .draw_series((0..COLOUR_BAR_STEPS).map(|i| {
            let v0 = lo + step * i as f64;
            Rectangle::new([(0.0, v0), (1.0, v0 + step)], colour(v0 + step / 2.0, lo, hi).filled())
        }))
        .map_err(plot_err)?;

    Ok(())
}

/// Finite min and max, `(0, 1)` when there are none
fn value_range(data: ArrayView2<'_, f32>) -> (f64, f64) {
    let (lo, hi) = data
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v as f64), hi.max(v as f64))
        });
    if lo > hi {
        (0.0, 1.0)
    } else {
        (lo, hi)
    }
}

fn colour(value: f64, lo: f64, hi: f64) -> RGBColor {
    let t = if hi > lo && value.is_finite() {
        ((value - lo) / (hi - lo)).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let pos = t * (VIRIDIS.len() - 1) as f64;
    let i = (pos.floor() as usize).min(VIRIDIS.len() - 2);
    let frac = pos - i as f64;
    let (a, b) = (VIRIDIS[i], VIRIDIS[i + 1]);
    let lerp = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * frac).round() as u8;

    RGBColor(lerp(a.0, b.0), lerp(a.1, b.1), lerp(a.2, b.2))
}
