//! Heatmap drawing through an abstract 2D surface.
//!
//! The renderer repaints the whole frame on every call (clear, then draw in
//! order: background grid, route path, station markers, labels, legend, hover
//! ring). Hosts implement [`DrawSurface`] over their canvas API; the
//! [`CommandRecorder`] surface captures the frame as a list of commands, which
//! is what tests and remote canvases consume.

use serde::Serialize;

use crate::congestion::CongestionLevel;
use crate::layout::{CanvasSize, HeatmapConfig, StationPosition};
use crate::simulator::StationFlowSample;

/// Horizontal text anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

/// Vertical text anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextBaseline {
    Top,
    Middle,
    Bottom,
}

/// Font and anchoring for a text draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle<'a> {
    pub color: &'a str,
    pub size: f64,
    pub bold: bool,
    pub align: TextAlign,
    pub baseline: TextBaseline,
}

/// A 2D drawing surface sized to its container.
///
/// Colours are CSS colour strings. Every frame starts with [`DrawSurface::clear`].
pub trait DrawSurface {
    fn size(&self) -> CanvasSize;

    fn clear(&mut self);

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: &str);

    fn stroke_line(&mut self, from: (f64, f64), to: (f64, f64), color: &str, width: f64);

    /// Stroke one open path through `points` with round caps and joins.
    fn stroke_path(&mut self, points: &[(f64, f64)], color: &str, width: f64);

    fn fill_circle(&mut self, cx: f64, cy: f64, radius: f64, color: &str);

    fn stroke_circle(&mut self, cx: f64, cy: f64, radius: f64, color: &str, width: f64);

    fn fill_text(&mut self, text: &str, x: f64, y: f64, style: &TextStyle<'_>);
}

/// A recorded surface call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DrawCommand {
    Clear,
    FillRect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: String,
    },
    StrokeLine {
        from: (f64, f64),
        to: (f64, f64),
        color: String,
        width: f64,
    },
    StrokePath {
        points: Vec<(f64, f64)>,
        color: String,
        width: f64,
    },
    FillCircle {
        cx: f64,
        cy: f64,
        radius: f64,
        color: String,
    },
    StrokeCircle {
        cx: f64,
        cy: f64,
        radius: f64,
        color: String,
        width: f64,
    },
    FillText {
        text: String,
        x: f64,
        y: f64,
        color: String,
        size: f64,
        bold: bool,
        align: TextAlign,
        baseline: TextBaseline,
    },
}

/// Surface that records the current frame.
#[derive(Debug, Clone, Default)]
pub struct CommandRecorder {
    size: CanvasSize,
    commands: Vec<DrawCommand>,
}

impl CommandRecorder {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            size: CanvasSize::new(width, height),
            commands: Vec::new(),
        }
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.size = CanvasSize::new(width, height);
    }

    /// Commands of the most recent frame.
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Every string drawn with `fill_text`, in draw order.
    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::FillText { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl DrawSurface for CommandRecorder {
    fn size(&self) -> CanvasSize {
        self.size
    }

    fn clear(&mut self) {
        self.commands.clear();
        self.commands.push(DrawCommand::Clear);
    }

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: &str) {
        self.commands.push(DrawCommand::FillRect {
            x,
            y,
            width,
            height,
            color: color.to_string(),
        });
    }

    fn stroke_line(&mut self, from: (f64, f64), to: (f64, f64), color: &str, width: f64) {
        self.commands.push(DrawCommand::StrokeLine {
            from,
            to,
            color: color.to_string(),
            width,
        });
    }

    fn stroke_path(&mut self, points: &[(f64, f64)], color: &str, width: f64) {
        self.commands.push(DrawCommand::StrokePath {
            points: points.to_vec(),
            color: color.to_string(),
            width,
        });
    }

    fn fill_circle(&mut self, cx: f64, cy: f64, radius: f64, color: &str) {
        self.commands.push(DrawCommand::FillCircle {
            cx,
            cy,
            radius,
            color: color.to_string(),
        });
    }

    fn stroke_circle(&mut self, cx: f64, cy: f64, radius: f64, color: &str, width: f64) {
        self.commands.push(DrawCommand::StrokeCircle {
            cx,
            cy,
            radius,
            color: color.to_string(),
            width,
        });
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64, style: &TextStyle<'_>) {
        self.commands.push(DrawCommand::FillText {
            text: text.to_string(),
            x,
            y,
            color: style.color.to_string(),
            size: style.size,
            bold: style.bold,
            align: style.align,
            baseline: style.baseline,
        });
    }
}

/// Aggregate counts over every station of the line, scrolled into view or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FlowStats {
    pub total: u64,
    pub avg: u32,
    pub peak: u32,
}

impl FlowStats {
    pub fn from_samples(samples: &[StationFlowSample]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let total: u64 = samples.iter().map(|s| u64::from(s.passengers)).sum();
        Self {
            total,
            avg: (total as f64 / samples.len() as f64).round() as u32,
            peak: samples.iter().map(|s| s.passengers).max().unwrap_or(0),
        }
    }
}

/// Draws a heatmap frame.
#[derive(Debug, Clone, Default)]
pub struct HeatmapRenderer {
    config: HeatmapConfig,
}

impl HeatmapRenderer {
    pub fn new(config: HeatmapConfig) -> Self {
        Self { config }
    }

    /// Repaint `surface` and return stats over all `stations`.
    ///
    /// `line_color` is `None` when no line is selected; together with an empty
    /// station list that draws the placeholder instead of the chart.
    pub fn render(
        &self,
        surface: &mut dyn DrawSurface,
        stations: &[StationFlowSample],
        positions: &[StationPosition],
        line_color: Option<&str>,
        hovered: Option<usize>,
    ) -> FlowStats {
        surface.clear();

        let Some(line_color) = line_color.filter(|_| !stations.is_empty()) else {
            self.draw_placeholder(surface);
            return FlowStats::from_samples(stations);
        };

        let canvas = surface.size();
        let visible: Vec<&StationPosition> = positions
            .iter()
            .filter(|p| p.index < stations.len() && self.config.is_on_canvas(p.x, canvas.width))
            .collect();

        self.draw_background(surface, canvas);
        self.draw_route(surface, positions, line_color);
        self.draw_markers(surface, stations, &visible);
        self.draw_labels(surface, stations, &visible);
        self.draw_legend(surface, canvas);

        if let Some(pos) = visible.iter().find(|p| Some(p.index) == hovered) {
            surface.stroke_circle(
                pos.x,
                pos.y,
                self.config.station_radius + self.config.hover_ring_offset,
                &self.config.palette.hover_ring,
                2.0,
            );
        }

        FlowStats::from_samples(stations)
    }

    fn draw_placeholder(&self, surface: &mut dyn DrawSurface) {
        let canvas = surface.size();
        let palette = &self.config.palette;

        surface.fill_rect(0.0, 0.0, canvas.width, canvas.height, &palette.placeholder_background);
        surface.fill_text(
            &self.config.placeholder_message,
            canvas.width / 2.0,
            canvas.height / 2.0,
            &TextStyle {
                color: &palette.placeholder_text,
                size: 20.0,
                bold: true,
                align: TextAlign::Center,
                baseline: TextBaseline::Middle,
            },
        );
    }

    fn draw_background(&self, surface: &mut dyn DrawSurface, canvas: CanvasSize) {
        let palette = &self.config.palette;
        surface.fill_rect(0.0, 0.0, canvas.width, canvas.height, &palette.background);

        let step = self.config.grid_step;
        if step <= 0.0 {
            return;
        }

        let mut y = step;
        while y < canvas.height {
            surface.stroke_line((0.0, y), (canvas.width, y), &palette.grid_line, 1.0);
            y += step;
        }

        let mut x = step;
        while x < canvas.width {
            surface.stroke_line((x, 0.0), (x, canvas.height), &palette.grid_line, 1.0);
            x += step;
        }
    }

    fn draw_route(
        &self,
        surface: &mut dyn DrawSurface,
        positions: &[StationPosition],
        line_color: &str,
    ) {
        if positions.len() < 2 {
            return;
        }
        let color = if line_color.is_empty() {
            self.config.palette.default_line.as_str()
        } else {
            line_color
        };
        let points: Vec<(f64, f64)> = positions.iter().map(|p| (p.x, p.y)).collect();
        surface.stroke_path(&points, color, self.config.line_width);
    }

    fn draw_markers(
        &self,
        surface: &mut dyn DrawSurface,
        stations: &[StationFlowSample],
        visible: &[&StationPosition],
    ) {
        let radius = self.config.station_radius;
        for pos in visible {
            let color = stations[pos.index].congestion.color();
            surface.fill_circle(pos.x, pos.y, radius, color);
            surface.stroke_circle(pos.x, pos.y, radius, &self.config.palette.marker_border, 1.0);
        }
    }

    /// Names only; counts are in the tooltip.
    fn draw_labels(
        &self,
        surface: &mut dyn DrawSurface,
        stations: &[StationFlowSample],
        visible: &[&StationPosition],
    ) {
        for pos in visible {
            let baseline = if pos.label.is_above() {
                TextBaseline::Bottom
            } else {
                TextBaseline::Top
            };
            surface.fill_text(
                &stations[pos.index].station_name,
                pos.x,
                pos.y + pos.label.offset(),
                &TextStyle {
                    color: &self.config.palette.text,
                    size: self.config.label_font_size,
                    bold: false,
                    align: TextAlign::Center,
                    baseline,
                },
            );
        }
    }

    fn draw_legend(&self, surface: &mut dyn DrawSurface, canvas: CanvasSize) {
        let palette = &self.config.palette;
        let legend_y = canvas.height - 50.0;

        surface.fill_text(
            "客流等级:",
            20.0,
            legend_y,
            &TextStyle {
                color: &palette.text,
                size: 16.0,
                bold: true,
                align: TextAlign::Left,
                baseline: TextBaseline::Middle,
            },
        );

        for (i, level) in CongestionLevel::ALL.iter().enumerate() {
            let x = 100.0 + i as f64 * self.config.legend_item_spacing;
            surface.fill_circle(x + 6.0, legend_y - 2.0, 6.0, level.color());
            surface.fill_text(
                level.label(),
                x + 18.0,
                legend_y,
                &TextStyle {
                    color: &palette.legend_text,
                    size: 16.0,
                    bold: false,
                    align: TextAlign::Left,
                    baseline: TextBaseline::Middle,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::PassengerTrend;
    use crate::layout::{CanvasSize, HeatmapLayoutEngine};
    use chrono::NaiveDate;

    fn samples(counts: &[u32]) -> Vec<StationFlowSample> {
        let now = NaiveDate::from_ymd_opt(2025, 3, 12)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        counts
            .iter()
            .enumerate()
            .map(|(i, &passengers)| StationFlowSample {
                station_name: format!("S{}", i),
                line_name: "1号线".to_string(),
                passengers,
                congestion: CongestionLevel::classify(passengers),
                is_off_service: false,
                trend: PassengerTrend::at(now),
                updated_at: now,
            })
            .collect()
    }

    fn frame(counts: &[u32], scroll: f64, hovered: Option<usize>) -> (CommandRecorder, FlowStats) {
        let stations = samples(counts);
        let engine = HeatmapLayoutEngine::default();
        let positions = engine.layout(stations.len(), scroll, CanvasSize::new(800.0, 400.0));
        let mut surface = CommandRecorder::new(800.0, 400.0);
        let stats = HeatmapRenderer::default().render(
            &mut surface,
            &stations,
            &positions,
            Some("#00a650"),
            hovered,
        );
        (surface, stats)
    }

    #[test]
    fn test_stats_cover_every_station() {
        let counts: Vec<u32> = (0..40).map(|i| 100 + i * 10).collect();
        let (_, scrolled) = frame(&counts, 1500.0, None);
        let (_, unscrolled) = frame(&counts, 0.0, None);

        assert_eq!(scrolled, unscrolled);
        assert_eq!(scrolled.total, counts.iter().map(|&c| u64::from(c)).sum::<u64>());
        assert_eq!(scrolled.peak, 490);
        assert_eq!(scrolled.avg, 295);
    }

    #[test]
    fn test_draw_order() {
        let (surface, _) = frame(&[100, 700, 2500], 0.0, None);
        let commands = surface.commands();

        assert_eq!(commands[0], DrawCommand::Clear);
        assert!(matches!(
            commands[1],
            DrawCommand::FillRect { ref color, .. } if color == "#ffffff"
        ));

        let first = |pred: fn(&DrawCommand) -> bool| commands.iter().position(pred).unwrap();
        let path_at = first(|c| matches!(c, DrawCommand::StrokePath { .. }));
        let first_marker = first(|c| matches!(c, DrawCommand::FillCircle { .. }));
        let first_label = first(|c| matches!(c, DrawCommand::FillText { .. }));
        assert!(path_at < first_marker);
        assert!(first_marker < first_label);

        match &commands[path_at] {
            DrawCommand::StrokePath { points, color, .. } => {
                assert_eq!(points.len(), 3);
                assert_eq!(color, "#00a650");
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_markers_use_congestion_colors() {
        let (surface, _) = frame(&[100, 700, 2500], 0.0, None);
        let marker_colors: Vec<&str> = surface
            .commands()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::FillCircle { radius, color, .. } if *radius == 8.0 => {
                    Some(color.as_str())
                }
                _ => None,
            })
            .collect();
        assert_eq!(marker_colors, vec!["#10b981", "#f59e0b", "#dc2626"]);
    }

    #[test]
    fn test_labels_and_full_legend() {
        let (surface, _) = frame(&[100, 700], 0.0, None);
        let texts = surface.texts();

        assert!(texts.contains(&"S0"));
        assert!(texts.contains(&"S1"));
        assert!(texts.contains(&"客流等级:"));
        for level in CongestionLevel::ALL {
            assert!(texts.contains(&level.label()));
        }
        // Counts never appear as labels
        assert!(!texts.contains(&"700"));
    }

    #[test]
    fn test_hover_ring_only_when_hovered_is_drawn() {
        let ring = |s: &CommandRecorder| {
            s.commands()
                .iter()
                .filter(|c| {
                    matches!(c, DrawCommand::StrokeCircle { radius, .. } if *radius == 12.0)
                })
                .count()
        };

        let (surface, _) = frame(&[100, 700, 2500], 0.0, Some(1));
        assert_eq!(ring(&surface), 1);
        assert!(matches!(
            surface.commands().last(),
            Some(DrawCommand::StrokeCircle { cx, .. }) if *cx == 140.0
        ));

        let counts = vec![300; 40];
        let (surface, _) = frame(&counts, 0.0, Some(39));
        assert_eq!(ring(&surface), 0);
    }

    #[test]
    fn test_placeholder_without_line_or_data() {
        let mut surface = CommandRecorder::new(800.0, 400.0);
        let renderer = HeatmapRenderer::default();

        let stats = renderer.render(&mut surface, &[], &[], Some("#00a650"), None);
        assert_eq!(stats, FlowStats::default());
        assert_eq!(surface.texts(), vec!["请选择一条线路查看热力图"]);

        let stations = samples(&[100]);
        renderer.render(&mut surface, &stations, &[], None, None);
        assert_eq!(surface.texts(), vec!["请选择一条线路查看热力图"]);
        assert!(!surface.commands().iter().any(|c| matches!(c, DrawCommand::StrokePath { .. })));
    }

    #[test]
    fn test_offscreen_stations_are_culled() {
        let counts = vec![300; 60];
        let (surface, _) = frame(&counts, 0.0, None);
        let markers = surface
            .commands()
            .iter()
            .filter(|c| matches!(c, DrawCommand::FillCircle { radius, .. } if *radius == 8.0))
            .count();
        assert!(markers < 60);
        assert!(markers >= 10);
    }
}
