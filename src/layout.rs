//! Heatmap layout: stations on a horizontal timeline with drag-to-pan.
//!
//! Positions are a pure projection of station order and scroll offset. The
//! caller owns the scroll offset and keeps it inside
//! [`HeatmapLayoutEngine::max_scroll_offset`]; the layout never clamps it.

use serde::Serialize;

/// Space kept free around the plot, in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Padding {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

/// Colours used by the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapPalette {
    pub background: String,
    pub grid_line: String,
    pub text: String,
    pub legend_text: String,
    pub marker_border: String,
    pub hover_ring: String,
    pub placeholder_background: String,
    pub placeholder_text: String,
    /// Route colour when the line has none
    pub default_line: String,
}

impl Default for HeatmapPalette {
    fn default() -> Self {
        Self {
            background: "#ffffff".to_string(),
            grid_line: "rgba(0, 0, 0, 0.05)".to_string(),
            text: "#333333".to_string(),
            legend_text: "#666666".to_string(),
            marker_border: "#ffffff".to_string(),
            hover_ring: "rgba(0, 0, 0, 0.3)".to_string(),
            placeholder_background: "#f8f9fa".to_string(),
            placeholder_text: "#6c757d".to_string(),
            default_line: "#10b981".to_string(),
        }
    }
}

/// Configuration for heatmap layout and drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapConfig {
    /// Default: top 80, right 60, bottom 80, left 60
    pub padding: Padding,
    /// Horizontal distance between neighbouring stations. Default: 80px
    pub station_spacing: f64,
    /// Marker radius. Default: 8px
    pub station_radius: f64,
    /// Extra pointer slack around a marker. Default: 2px
    pub hit_tolerance: f64,
    /// Route stroke width. Default: 3px
    pub line_width: f64,
    /// Gap between a hovered marker and its outline ring. Default: 4px
    pub hover_ring_offset: f64,
    /// Background grid pitch. Default: 20px
    pub grid_step: f64,
    /// Station label font size. Default: 16px
    pub label_font_size: f64,
    /// Legend swatch pitch. Default: 80px
    pub legend_item_spacing: f64,
    pub palette: HeatmapPalette,
    /// Message drawn when there is nothing to show
    pub placeholder_message: String,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            padding: Padding {
                top: 80.0,
                right: 60.0,
                bottom: 80.0,
                left: 60.0,
            },
            station_spacing: 80.0,
            station_radius: 8.0,
            hit_tolerance: 2.0,
            line_width: 3.0,
            hover_ring_offset: 4.0,
            grid_step: 20.0,
            label_font_size: 16.0,
            legend_item_spacing: 80.0,
            palette: HeatmapPalette::default(),
            placeholder_message: "请选择一条线路查看热力图".to_string(),
        }
    }
}

impl HeatmapConfig {
    /// Pointer distance at which a marker counts as hit.
    pub fn hit_radius(&self) -> f64 {
        self.station_radius + self.hit_tolerance
    }

    /// Whether a marker at `x` touches a canvas `canvas_width` wide.
    pub fn is_on_canvas(&self, x: f64, canvas_width: f64) -> bool {
        // Labels are wider than markers
        let margin = self.station_spacing;
        x >= -margin && x <= canvas_width + margin
    }
}

/// Drawing surface dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

impl CanvasSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Where a station's label sits relative to its marker.
///
/// Assigned round-robin by station index so that short spacing does not stack
/// neighbouring labels on one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LabelPlacement {
    Above,
    Below,
    FarAbove,
    FarBelow,
}

impl LabelPlacement {
    pub fn for_index(index: usize) -> Self {
        match index % 4 {
            0 => LabelPlacement::Above,
            1 => LabelPlacement::Below,
            2 => LabelPlacement::FarAbove,
            _ => LabelPlacement::FarBelow,
        }
    }

    /// Vertical offset from the marker centre.
    pub fn offset(&self) -> f64 {
        match self {
            LabelPlacement::Above => -20.0,
            LabelPlacement::Below => 20.0,
            LabelPlacement::FarAbove => -30.0,
            LabelPlacement::FarBelow => 30.0,
        }
    }

    pub fn is_above(&self) -> bool {
        matches!(self, LabelPlacement::Above | LabelPlacement::FarAbove)
    }
}

/// On-canvas position of one station.
///
/// `index` refers back into the sample slice the layout was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StationPosition {
    pub x: f64,
    pub y: f64,
    pub index: usize,
    pub label: LabelPlacement,
}

impl StationPosition {
    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        (self.x - x).hypot(self.y - y)
    }
}

/// Computes station positions for the heatmap.
#[derive(Debug, Clone, Default)]
pub struct HeatmapLayoutEngine {
    config: HeatmapConfig,
}

impl HeatmapLayoutEngine {
    pub fn new(config: HeatmapConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HeatmapConfig {
        &self.config
    }

    /// Lay out `station_count` stations for the given scroll offset.
    ///
    /// `x[i] = left + i * spacing - scroll_offset_x`, all on the plot's centre line.
    pub fn layout(
        &self,
        station_count: usize,
        scroll_offset_x: f64,
        canvas: CanvasSize,
    ) -> Vec<StationPosition> {
        let y = self.center_y(canvas.height);
        (0..station_count)
            .map(|index| StationPosition {
                x: self.config.padding.left + index as f64 * self.config.station_spacing
                    - scroll_offset_x,
                y,
                index,
                label: LabelPlacement::for_index(index),
            })
            .collect()
    }

    /// Vertical centre of the plot area.
    pub fn center_y(&self, canvas_height: f64) -> f64 {
        let padding = &self.config.padding;
        let plot_height = canvas_height - padding.top - padding.bottom;
        padding.top + plot_height / 2.0
    }

    /// Full width of the unscrolled timeline.
    pub fn content_width(&self, station_count: usize) -> f64 {
        let padding = &self.config.padding;
        let gaps = station_count.saturating_sub(1) as f64;
        padding.left + padding.right + gaps * self.config.station_spacing
    }

    /// Largest valid scroll offset; 0 when the timeline fits.
    pub fn max_scroll_offset(&self, station_count: usize, canvas_width: f64) -> f64 {
        (self.content_width(station_count) - canvas_width).max(0.0)
    }

    /// Whether a marker at `position` touches the visible canvas.
    pub fn is_visible(&self, position: &StationPosition, canvas: CanvasSize) -> bool {
        self.config.is_on_canvas(position.x, canvas.width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_preserves_order_and_count() {
        let engine = HeatmapLayoutEngine::default();
        let positions = engine.layout(12, 0.0, CanvasSize::new(800.0, 400.0));

        assert_eq!(positions.len(), 12);
        assert!(positions.windows(2).all(|w| w[0].x < w[1].x));
        assert_eq!(positions[0].x, 60.0);
        assert_eq!(positions[3].x, 60.0 + 3.0 * 80.0);
        assert!(positions.iter().all(|p| p.y == 200.0));
        assert!(positions.iter().enumerate().all(|(i, p)| p.index == i));
    }

    #[test]
    fn test_scroll_shifts_every_station() {
        let engine = HeatmapLayoutEngine::default();
        let canvas = CanvasSize::new(800.0, 400.0);
        let base = engine.layout(5, 0.0, canvas);
        let scrolled = engine.layout(5, 130.0, canvas);

        for (a, b) in base.iter().zip(&scrolled) {
            assert_eq!(a.x - 130.0, b.x);
        }
    }

    #[test]
    fn test_layout_does_not_clamp_offset() {
        let engine = HeatmapLayoutEngine::default();
        let positions = engine.layout(2, -500.0, CanvasSize::new(800.0, 400.0));
        assert_eq!(positions[0].x, 560.0);
    }

    #[test]
    fn test_scroll_range() {
        let engine = HeatmapLayoutEngine::default();
        // 60 + 60 + 29 * 80 = 2440
        assert_eq!(engine.content_width(30), 2440.0);
        assert_eq!(engine.max_scroll_offset(30, 800.0), 1640.0);
        assert_eq!(engine.max_scroll_offset(3, 800.0), 0.0);
        assert_eq!(engine.max_scroll_offset(0, 800.0), 0.0);
    }

    #[test]
    fn test_label_round_robin() {
        let placements: Vec<LabelPlacement> = (0..6).map(LabelPlacement::for_index).collect();
        assert_eq!(
            placements,
            vec![
                LabelPlacement::Above,
                LabelPlacement::Below,
                LabelPlacement::FarAbove,
                LabelPlacement::FarBelow,
                LabelPlacement::Above,
                LabelPlacement::Below,
            ]
        );
        assert!(LabelPlacement::FarAbove.is_above());
        assert_eq!(LabelPlacement::FarBelow.offset(), 30.0);
    }

    #[test]
    fn test_visibility_culling() {
        let engine = HeatmapLayoutEngine::default();
        let canvas = CanvasSize::new(800.0, 400.0);
        let positions = engine.layout(40, 0.0, canvas);
        let visible = positions.iter().filter(|p| engine.is_visible(p, canvas)).count();
        assert!(visible < 40);
        assert!(engine.is_visible(&positions[0], canvas));
    }
}
