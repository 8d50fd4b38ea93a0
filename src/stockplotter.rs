use std::{collections::BTreeSet, fmt, fs, iter, path::Path, str::FromStr, time::Duration};

use chrono::NaiveDate;
use plotters::{coord::Shift, prelude::*};
use tracing::debug;

use crate::{
    error::RenderError,
    export::FrameSink,
    frame::{FrameState, OverlayState},
    timeseries::PriceSeries,
};

/// Legend label of the price series itself.
pub const PRICE_LABEL: &str = "Stock Price";

const MOVING_AVERAGE: RGBColor = RGBColor(255, 165, 0);
const MARKER: RGBColor = RGBColor(0, 128, 0);
const ANNOTATION: RGBColor = RGBColor(220, 20, 20);
const COOLWARM: [RGBColor; 3] = [RGBColor(59, 76, 192), RGBColor(221, 221, 221), RGBColor(180, 4, 38)];
const PLASMA: [RGBColor; 5] = [
    RGBColor(13, 8, 135),
    RGBColor(126, 3, 168),
    RGBColor(204, 71, 120),
    RGBColor(248, 149, 64),
    RGBColor(240, 249, 33),
];
const AREA_ALPHA: f64 = 0.2;
const COLORBAR_WIDTH: i32 = 100;
const COLORBAR_STEPS: usize = 64;

fn draw_err<E: std::fmt::Display>(e: E) -> RenderError {
    RenderError::Draw(e.to_string())
}

/// Colour of the price line as a function of playback progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Palette {
    Coolwarm,
    Husl,
}

impl Palette {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "coolwarm" => Some(Palette::Coolwarm),
            "husl" => Some(Palette::Husl),
            _ => None,
        }
    }

    pub fn color_at(&self, progress: f64) -> RGBColor {
        let t = if progress.is_finite() { progress.clamp(0.0, 1.0) } else { 0.0 };
        match self {
            Palette::Coolwarm => DerivedColorMap::new(&COOLWARM).get_color(t),
            Palette::Husl => {
                // stop short of a full turn so the last frame differs from the first
                let (r, g, b) = HSLColor(t * 0.85, 0.65, 0.5).rgb();
                RGBColor(r, g, b)
            }
        }
    }
}

/// Colour scale of the close-coloured scatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colormap {
    Viridis,
    Plasma,
}

impl Colormap {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "viridis" => Some(Colormap::Viridis),
            "plasma" => Some(Colormap::Plasma),
            _ => None,
        }
    }

    fn scale(&self) -> Box<dyn ColorMap<RGBColor, f64>> {
        match self {
            Colormap::Viridis => Box::new(ViridisRGB),
            Colormap::Plasma => Box::new(DerivedColorMap::new(&PLASMA)),
        }
    }

    /// Colour of `value` on a `[low, high]` scale. A flat range maps to the low end.
    pub fn color_for(&self, value: f64, low: f64, high: f64) -> RGBColor {
        if !value.is_finite() || !(high > low) {
            return self.scale().get_color(0.0);
        }
        self.scale().get_color_normalized(value.clamp(low, high), low, high)
    }
}

/// How a still draws the price series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StillStyle {
    /// Palette-coloured line, as in the animation.
    #[default]
    Line,
    /// One dot per close, coloured by the close, with a colour bar.
    Scatter(Colormap),
    /// Line over a translucent fill down to the axis floor.
    Area,
}

impl FromStr for StillStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "line" => Ok(StillStyle::Line),
            "area" => Ok(StillStyle::Area),
            "scatter" => Ok(StillStyle::Scatter(Colormap::Viridis)),
            _ => s
                .strip_prefix("scatter-")
                .and_then(Colormap::from_name)
                .map(StillStyle::Scatter)
                .ok_or_else(|| format!("unknown style `{}` (line, area, scatter-viridis, scatter-plasma)", s)),
        }
    }
}

impl fmt::Display for StillStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StillStyle::Line => write!(f, "line"),
            StillStyle::Area => write!(f, "area"),
            StillStyle::Scatter(Colormap::Viridis) => write!(f, "scatter-viridis"),
            StillStyle::Scatter(Colormap::Plasma) => write!(f, "scatter-plasma"),
        }
    }
}

/// Fixed plot extent so every frame of one series shares its axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartAxes {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub low: f64,
    pub high: f64,
}

impl ChartAxes {
    pub fn for_series(series: &PriceSeries) -> Option<Self> {
        let mut start = series.first()?.date;
        let mut end = series.last()?.date;
        if start == end {
            start = start.pred_opt()?;
            end = end.succ_opt()?;
        }
        let min = series.get_min_close()?;
        let max = series.get_max_close()?;
        let padding = (max - min).max(max.abs() * 0.01).max(1e-8) * 0.1;
        Some(ChartAxes {
            start,
            end,
            low: (min - padding).max(0.0),
            high: max + padding,
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Free text pinned to a data point by the user.
#[derive(Debug, Clone, PartialEq)]
pub struct UserNote {
    pub text: String,
    pub date: NaiveDate,
    pub close: f64,
}

pub struct StockPlotter {
    img_width: u32,
    img_height: u32,
    palette: Palette,
    title: String,
    axes: ChartAxes,
    hidden: BTreeSet<String>,
}

impl StockPlotter {
    pub fn new(img_width: u32, img_height: u32, palette: Palette, title: &str, axes: ChartAxes) -> Self {
        StockPlotter {
            img_width,
            img_height,
            palette,
            title: String::from(title),
            axes,
            hidden: BTreeSet::new(),
        }
    }

    /// `None` for an empty series: there is nothing to scale the axes to.
    pub fn for_series(series: &PriceSeries, img_width: u32, img_height: u32, palette: Palette) -> Option<Self> {
        let axes = ChartAxes::for_series(series)?;
        let title = format!("{} Stock Price Evolution", series.equity_name);
        Some(StockPlotter::new(img_width, img_height, palette, &title, axes))
    }

    pub fn axes(&self) -> ChartAxes {
        self.axes
    }

    /// Whether the series with legend label `label` is drawn.
    pub fn is_visible(&self, label: &str) -> bool {
        !self.hidden.contains(label)
    }

    pub fn set_visible(&mut self, label: &str, visible: bool) {
        if visible {
            self.hidden.remove(label);
        } else {
            self.hidden.insert(String::from(label));
        }
    }

    /// Flips one series on or off; returns whether it is now visible.
    pub fn toggle(&mut self, label: &str) -> bool {
        let visible = !self.is_visible(label);
        self.set_visible(label, visible);
        visible
    }

    pub fn draw<DB: DrawingBackend>(
        &self,
        root: &DrawingArea<DB, Shift>,
        frame: &FrameState,
        style: StillStyle,
        annotation_opacity: f64,
        notes: &[UserNote],
    ) -> Result<(), RenderError> {
        let axes = self.axes;
        root.fill(&WHITE).map_err(draw_err)?;

        let plot_area = match style {
            StillStyle::Scatter(map) => {
                let width = root.dim_in_pixel().0 as i32;
                let (plot_area, bar_area) = root.split_horizontally((width - COLORBAR_WIDTH).max(1));
                draw_colorbar(&bar_area, map, axes.low, axes.high)?;
                plot_area
            }
            StillStyle::Line | StillStyle::Area => root.clone(),
        };

        let mut chart = ChartBuilder::on(&plot_area)
            .caption(&self.title, ("sans-serif", 30).into_font())
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(axes.start..axes.end, axes.low..axes.high)
            .map_err(draw_err)?;

        chart
            .configure_mesh()
            .x_desc("Date")
            .y_desc("Closing Price")
            .draw()
            .map_err(draw_err)?;

        if frame.is_empty() {
            return Ok(());
        }

        let mut labelled = 0;
        let color = self.palette.color_at(frame.progress());
        let prices = frame.visible.iter().map(|p| (p.date, p.close));
        if self.is_visible(PRICE_LABEL) {
            match style {
                StillStyle::Line => {
                    chart
                        .draw_series(LineSeries::new(prices, color.stroke_width(2)))
                        .map_err(draw_err)?
                        .label(PRICE_LABEL)
                        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
                }
                StillStyle::Area => {
                    chart
                        .draw_series(
                            AreaSeries::new(prices, axes.low, color.mix(AREA_ALPHA).filled())
                                .border_style(color.stroke_width(2)),
                        )
                        .map_err(draw_err)?
                        .label(PRICE_LABEL)
                        .legend(move |(x, y)| {
                            Rectangle::new([(x, y - 5), (x + 20, y + 5)], color.mix(AREA_ALPHA).filled())
                        });
                }
                StillStyle::Scatter(map) => {
                    let mid = map.color_for(0.5, 0.0, 1.0);
                    chart
                        .draw_series(
                            prices.map(|(date, close)| {
                                Circle::new((date, close), 4, map.color_for(close, axes.low, axes.high).filled())
                            }),
                        )
                        .map_err(draw_err)?
                        .label(PRICE_LABEL)
                        .legend(move |(x, y)| Rectangle::new([(x + 6, y - 4), (x + 14, y + 4)], mid.filled()));
                }
            }
            labelled += 1;
        }

        for overlay in frame.overlays.iter().filter(|o| self.is_visible(o.label())) {
            match overlay {
                OverlayState::TrailingMean { label, values, .. } => {
                    let points: Vec<(NaiveDate, f64)> = frame
                        .visible
                        .iter()
                        .zip(values)
                        .filter_map(|(p, v)| v.map(|v| (p.date, v)))
                        .collect();
                    if points.is_empty() {
                        continue;
                    }
                    chart
                        .draw_series(LineSeries::new(points, MOVING_AVERAGE.stroke_width(1)))
                        .map_err(draw_err)?
                        .label(label.as_str())
                        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], MOVING_AVERAGE.stroke_width(1)));
                    labelled += 1;
                }
                OverlayState::DateMarkers { label, dates } => {
                    let inside: Vec<NaiveDate> = dates.iter().copied().filter(|d| axes.contains(*d)).collect();
                    if inside.len() < dates.len() {
                        debug!(skipped = dates.len() - inside.len(), "markers outside the plotted range");
                    }
                    for (n, date) in inside.into_iter().enumerate() {
                        let anno = chart
                            .draw_series(LineSeries::new(
                                vec![(date, axes.low), (date, axes.high)],
                                MARKER.stroke_width(1),
                            ))
                            .map_err(draw_err)?;
                        if n == 0 {
                            anno.label(label.as_str())
                                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], MARKER.stroke_width(1)));
                            labelled += 1;
                        }
                    }
                }
            }
        }

        if let Some(annotation) = &frame.annotation {
            if annotation_opacity > 0.0 {
                let style = ("sans-serif", 16).into_font().color(&ANNOTATION.mix(annotation_opacity));
                chart
                    .draw_series(iter::once(Text::new(
                        annotation.text.clone(),
                        (annotation.date, annotation.close),
                        style,
                    )))
                    .map_err(draw_err)?;
            }
        }

        if let Some(last) = frame.last_visible() {
            for note in notes.iter().filter(|n| n.date <= last.date && axes.contains(n.date)) {
                chart
                    .draw_series(iter::once(Circle::new((note.date, note.close), 3, BLACK.filled())))
                    .map_err(draw_err)?;
                chart
                    .draw_series(iter::once(Text::new(
                        note.text.clone(),
                        (note.date, note.close),
                        ("sans-serif", 14).into_font(),
                    )))
                    .map_err(draw_err)?;
            }
        }

        if labelled > 0 {
            chart
                .configure_series_labels()
                .background_style(&WHITE.mix(0.8))
                .border_style(&BLACK)
                .draw()
                .map_err(draw_err)?;
        }
        Ok(())
    }

    pub fn save_png(&self, path: &Path, frame: &FrameState, notes: &[UserNote]) -> Result<(), RenderError> {
        self.save_still(path, frame, StillStyle::Line, notes)
    }

    pub fn save_still(
        &self,
        path: &Path,
        frame: &FrameState,
        style: StillStyle,
        notes: &[UserNote],
    ) -> Result<(), RenderError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let opacity = frame.annotation.as_ref().map_or(0.0, |a| a.fade.start_opacity);
        let root = BitMapBackend::new(path, (self.img_width, self.img_height)).into_drawing_area();
        self.draw(&root, frame, style, opacity, notes)?;
        root.present().map_err(draw_err)?;
        Ok(())
    }

    /// Direct animated GIF; plotters writes it looping forever.
    pub fn gif_recorder<'a>(&'a self, path: &'a Path, frame_delay: Duration) -> Result<GifRecorder<'a>, RenderError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let delay_ms = u32::try_from(frame_delay.as_millis()).unwrap_or(u32::MAX);
        let root = BitMapBackend::gif(path, (self.img_width, self.img_height), delay_ms)
            .map_err(draw_err)?
            .into_drawing_area();
        Ok(GifRecorder {
            plotter: self,
            root,
            frame_delay,
            frames: 0,
        })
    }
}

fn draw_colorbar<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    map: Colormap,
    low: f64,
    high: f64,
) -> Result<(), RenderError> {
    let mut bar = ChartBuilder::on(area)
        .margin_top(60)
        .margin_bottom(55)
        .margin_right(10)
        .y_label_area_size(55)
        .build_cartesian_2d(0.0..1.0, low..high)
        .map_err(draw_err)?;
    bar.configure_mesh()
        .disable_mesh()
        .disable_x_axis()
        .y_labels(6)
        .draw()
        .map_err(draw_err)?;

    let step = (high - low) / COLORBAR_STEPS as f64;
    bar.draw_series((0..COLORBAR_STEPS).map(|i| {
        let y0 = low + step * i as f64;
        Rectangle::new([(0.0, y0), (1.0, y0 + step)], map.color_for(y0 + step / 2.0, low, high).filled())
    }))
    .map_err(draw_err)?;
    Ok(())
}

impl FrameSink for StockPlotter {
    fn write_frame(&mut self, frame: &FrameState, path: &Path) -> Result<(), RenderError> {
        self.save_png(path, frame, &[])
    }
}

pub struct GifRecorder<'a> {
    plotter: &'a StockPlotter,
    root: DrawingArea<BitMapBackend<'a>, Shift>,
    frame_delay: Duration,
    frames: usize,
}

impl<'a> GifRecorder<'a> {
    /// Appends `frame`; a terminal frame is followed by its annotation fade.
    pub fn push(&mut self, frame: &FrameState) -> Result<(), RenderError> {
        match &frame.annotation {
            Some(annotation) => {
                self.present(frame, annotation.fade.start_opacity)?;
                for opacity in annotation.fade.steps(self.frame_delay) {
                    self.present(frame, opacity)?;
                }
            }
            None => self.present(frame, 0.0)?,
        }
        Ok(())
    }

    fn present(&mut self, frame: &FrameState, opacity: f64) -> Result<(), RenderError> {
        self.plotter.draw(&self.root, frame, StillStyle::Line, opacity, &[])?;
        self.root.present().map_err(draw_err)?;
        self.frames += 1;
        Ok(())
    }

    /// Number of GIF frames written, fade frames included.
    pub fn finish(self) -> usize {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use plotters::style::RGBColor;

    use std::time::Duration;

    use super::{ChartAxes, Colormap, Palette, StillStyle, StockPlotter, PRICE_LABEL};
    use crate::{
        export::FrameExporter,
        frame::{FadeSchedule, FrameRenderer},
        overlay::OverlaySpec,
        playback::Playback,
        timeseries::{PricePoint, PriceSeries},
    };

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn palettes() {
        assert_eq!(Palette::from_name("CoolWarm"), Some(Palette::Coolwarm));
        assert_eq!(Palette::from_name("husl"), Some(Palette::Husl));
        assert_eq!(Palette::from_name("viridis"), None);

        assert_eq!(Palette::Coolwarm.color_at(0.0), RGBColor(59, 76, 192));
        assert_eq!(Palette::Coolwarm.color_at(0.5), RGBColor(221, 221, 221));
        assert_eq!(Palette::Coolwarm.color_at(1.0), RGBColor(180, 4, 38));
        assert_eq!(Palette::Coolwarm.color_at(7.0), Palette::Coolwarm.color_at(1.0));
        assert_ne!(Palette::Husl.color_at(0.0), Palette::Husl.color_at(1.0));
    }

    #[test]
    fn axes_cover_the_series() {
        let ts = PriceSeries::from_points(
            "AAPL",
            vec![
                PricePoint::new(date("2023-10-02"), 100.0),
                PricePoint::new(date("2023-10-03"), 120.0),
                PricePoint::new(date("2023-10-04"), 110.0),
            ],
        );
        let axes = ChartAxes::for_series(&ts).unwrap();
        assert_eq!(axes.start, date("2023-10-02"));
        assert_eq!(axes.end, date("2023-10-04"));
        assert!(axes.low < 100.0 && axes.high > 120.0);
        assert!(axes.contains(date("2023-10-03")));
        assert!(!axes.contains(date("2023-01-10")));
    }

    #[test]
    fn single_day_gets_a_span() {
        let ts = PriceSeries::from_points("AAPL", vec![PricePoint::new(date("2023-10-02"), 50.0)]);
        let axes = ChartAxes::for_series(&ts).unwrap();
        assert_eq!(axes.start, date("2023-10-01"));
        assert_eq!(axes.end, date("2023-10-03"));
        assert!(axes.low < 50.0 && axes.high > 50.0);
        assert!(ChartAxes::for_series(&PriceSeries::empty("AAPL")).is_none());
    }

    fn week() -> PriceSeries {
        PriceSeries::from_points(
            "AAPL",
            (0..5).map(|i| PricePoint::new(date("2023-10-02") + chrono::Duration::days(i), 170.0 + i as f64)),
        )
    }

    fn renderer() -> FrameRenderer {
        FrameRenderer::new(vec![
            OverlaySpec::moving_average(3),
            OverlaySpec::split_markers(vec![date("2023-10-04"), date("2023-01-10")]),
        ])
        .with_annotation("Market Peak", FadeSchedule::new(1.0, Duration::from_secs(1)))
    }

    #[test]
    fn still_styles() {
        assert_eq!("line".parse::<StillStyle>(), Ok(StillStyle::Line));
        assert_eq!("Area".parse::<StillStyle>(), Ok(StillStyle::Area));
        assert_eq!("scatter".parse::<StillStyle>(), Ok(StillStyle::Scatter(Colormap::Viridis)));
        assert_eq!("scatter-plasma".parse::<StillStyle>(), Ok(StillStyle::Scatter(Colormap::Plasma)));
        assert!("scatter-jet".parse::<StillStyle>().is_err());
        assert!("pie".parse::<StillStyle>().is_err());
        assert_eq!(StillStyle::default(), StillStyle::Line);
        for style in [StillStyle::Line, StillStyle::Area, StillStyle::Scatter(Colormap::Plasma)] {
            assert_eq!(style.to_string().parse::<StillStyle>(), Ok(style));
        }
    }

    #[test]
    fn colormaps_span_the_close_range() {
        assert_eq!(Colormap::Viridis.color_for(100.0, 100.0, 200.0), RGBColor(68, 1, 84));
        assert_eq!(Colormap::Viridis.color_for(200.0, 100.0, 200.0), RGBColor(254, 232, 37));
        assert_eq!(Colormap::Plasma.color_for(100.0, 100.0, 200.0), RGBColor(13, 8, 135));
        assert_eq!(Colormap::Plasma.color_for(500.0, 100.0, 200.0), RGBColor(240, 249, 33));
        assert_eq!(Colormap::Plasma.color_for(7.0, 7.0, 7.0), RGBColor(13, 8, 135));
        assert_ne!(
            Colormap::Viridis.color_for(150.0, 100.0, 200.0),
            Colormap::Plasma.color_for(150.0, 100.0, 200.0)
        );
    }

    #[test]
    fn series_visibility() {
        let mut plotter = StockPlotter::for_series(&week(), 640, 480, Palette::Coolwarm).unwrap();
        assert!(plotter.is_visible(PRICE_LABEL));
        assert!(!plotter.toggle("3-Day MA"));
        assert!(!plotter.is_visible("3-Day MA"));
        assert!(plotter.is_visible("Split"));
        assert!(plotter.toggle("3-Day MA"));
        plotter.set_visible(PRICE_LABEL, false);
        assert!(!plotter.is_visible(PRICE_LABEL));
    }

    #[test]
    fn stills_in_every_style() {
        let dir = tempfile::tempdir().unwrap();
        let series = week();
        let renderer = renderer();
        let mut plotter = StockPlotter::for_series(&series, 640, 480, Palette::Husl).unwrap();
        let last = renderer.render(&series, series.len());
        let middle = renderer.render(&series, 2);

        let styles = [
            StillStyle::Line,
            StillStyle::Area,
            StillStyle::Scatter(Colormap::Viridis),
            StillStyle::Scatter(Colormap::Plasma),
        ];
        for (n, style) in styles.into_iter().enumerate() {
            let path = dir.path().join(format!("still_{}.png", n));
            plotter.save_still(&path, &last, style, &[]).unwrap();
            assert!(path.metadata().unwrap().len() > 0, "{} wrote nothing", style);
        }

        let nested = dir.path().join("out").join("mid.png");
        plotter.save_png(&nested, &middle, &[]).unwrap();
        assert!(nested.exists());

        for label in [PRICE_LABEL, "3-Day MA", "Split"] {
            plotter.set_visible(label, false);
        }
        let bare = dir.path().join("bare.png");
        plotter.save_png(&bare, &last, &[]).unwrap();
        assert!(bare.exists());
    }

    #[test]
    fn plotter_writes_exported_frames() {
        let dir = tempfile::tempdir().unwrap();
        let series = week();
        let mut plotter = StockPlotter::for_series(&series, 480, 320, Palette::Coolwarm).unwrap();
        let paths = FrameExporter::new(dir.path()).export(&renderer(), &series, &mut plotter).unwrap();
        assert_eq!(paths.len(), 5);
        assert!(paths.iter().all(|p| p.metadata().unwrap().len() > 0));
    }

    #[test]
    fn gif_appends_fade_after_the_terminal_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anim.gif");
        let series = week();
        let renderer = renderer();
        let plotter = StockPlotter::for_series(&series, 320, 240, Palette::Coolwarm).unwrap();
        let tick = Duration::from_millis(250);

        let mut recorder = plotter.gif_recorder(&path, tick).unwrap();
        let mut playback = Playback::new(&renderer, &series);
        while let Some(frame) = playback.tick() {
            recorder.push(&frame).unwrap();
        }
        let written = recorder.finish();

        assert_eq!(written, series.len() + renderer.fade().steps(tick).len());
        assert_eq!(written, 9);
        assert!(path.metadata().unwrap().len() > 0);
    }
}
