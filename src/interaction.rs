//! Pointer and touch handling for the heatmap.
//!
//! A small state machine decides between hover, click and drag-to-pan. Mouse and
//! touch share the same transitions:
//!
//! | State | down (hit) | down (miss) | move | up | leave |
//! |-------|------------|-------------|------|----|-------|
//! | Idle / Hovering | click, tooltip | start drag | hit-test | hide | hide |
//! | Dragging | - | - | pan | end drag | end drag |
//!
//! A touch that lands between stations starts a drag instead of a tooltip.

use serde::Serialize;

use crate::congestion::CongestionLevel;
use crate::layout::{CanvasSize, StationPosition};
use crate::simulator::StationFlowSample;

/// Where the pointer machine currently is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerState {
    Idle,
    /// Pointer is over the station with this index
    Hovering(usize),
    /// Drag-to-pan in progress
    Dragging { start_x: f64, start_offset: f64 },
}

/// What the host should do after an input event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InteractionOutcome {
    None,
    /// Show or move the tooltip for a station, anchored at the pointer.
    ShowTooltip { index: usize, x: f64, y: f64 },
    HideTooltip,
    /// A station was pressed; its tooltip is shown as well.
    StationClicked { index: usize, x: f64, y: f64 },
    DragStarted,
    /// Scroll offset changed; relayout and redraw.
    Scrolled(f64),
    DragEnded,
}

/// Hit-testing and drag-to-pan over cached station positions.
#[derive(Debug, Clone)]
pub struct PointerInteractionResolver {
    state: PointerState,
    scroll_offset: f64,
    max_scroll: f64,
    hit_radius: f64,
}

impl PointerInteractionResolver {
    pub fn new(hit_radius: f64) -> Self {
        Self {
            state: PointerState::Idle,
            scroll_offset: 0.0,
            max_scroll: 0.0,
            hit_radius,
        }
    }

    pub fn state(&self) -> PointerState {
        self.state
    }

    pub fn scroll_offset(&self) -> f64 {
        self.scroll_offset
    }

    pub fn max_scroll(&self) -> f64 {
        self.max_scroll
    }

    pub fn hit_radius(&self) -> f64 {
        self.hit_radius
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, PointerState::Dragging { .. })
    }

    /// Station under the pointer, if any.
    pub fn hovered(&self) -> Option<usize> {
        match self.state {
            PointerState::Hovering(index) => Some(index),
            _ => None,
        }
    }

    /// Set the scroll range and pull the current offset back inside it.
    pub fn set_scroll_range(&mut self, max_scroll: f64) {
        self.max_scroll = if max_scroll.is_finite() { max_scroll.max(0.0) } else { 0.0 };
        self.scroll_offset = self.clamp(self.scroll_offset);
    }

    /// Back to idle at offset 0, e.g. when the line changes.
    pub fn reset(&mut self) {
        self.state = PointerState::Idle;
        self.scroll_offset = 0.0;
    }

    /// First position within the hit radius of the pointer.
    ///
    /// Positions are in station order, so overlapping targets favour the
    /// earliest station.
    pub fn hit_test<'a>(
        &self,
        x: f64,
        y: f64,
        positions: &'a [StationPosition],
    ) -> Option<&'a StationPosition> {
        positions
            .iter()
            .find(|p| p.distance_to(x, y) <= self.hit_radius)
    }

    /// Scroll by a horizontal drag delta. Returns the clamped offset.
    pub fn on_drag_delta(&mut self, delta_x: f64) -> f64 {
        if delta_x.is_finite() {
            self.scroll_offset = self.clamp(self.scroll_offset - delta_x);
        }
        self.scroll_offset
    }

    pub fn pointer_down(
        &mut self,
        x: f64,
        y: f64,
        positions: &[StationPosition],
    ) -> InteractionOutcome {
        if let Some(hit) = self.hit_test(x, y, positions) {
            self.state = PointerState::Hovering(hit.index);
            return InteractionOutcome::StationClicked {
                index: hit.index,
                x,
                y,
            };
        }

        self.state = PointerState::Dragging {
            start_x: x,
            start_offset: self.scroll_offset,
        };
        InteractionOutcome::DragStarted
    }

    pub fn pointer_move(
        &mut self,
        x: f64,
        y: f64,
        positions: &[StationPosition],
    ) -> InteractionOutcome {
        if let PointerState::Dragging {
            start_x,
            start_offset,
        } = self.state
        {
            let offset = self.clamp(start_offset - (x - start_x));
            if offset == self.scroll_offset {
                return InteractionOutcome::None;
            }
            self.scroll_offset = offset;
            return InteractionOutcome::Scrolled(offset);
        }

        match self.hit_test(x, y, positions) {
            Some(hit) => {
                self.state = PointerState::Hovering(hit.index);
                InteractionOutcome::ShowTooltip {
                    index: hit.index,
                    x,
                    y,
                }
            }
            None => self.leave_station(),
        }
    }

    pub fn pointer_up(&mut self) -> InteractionOutcome {
        self.end_drag().unwrap_or_else(|| self.leave_station())
    }

    pub fn pointer_leave(&mut self) -> InteractionOutcome {
        self.end_drag().unwrap_or_else(|| self.leave_station())
    }

    pub fn touch_start(
        &mut self,
        x: f64,
        y: f64,
        positions: &[StationPosition],
    ) -> InteractionOutcome {
        self.pointer_down(x, y, positions)
    }

    pub fn touch_move(
        &mut self,
        x: f64,
        y: f64,
        positions: &[StationPosition],
    ) -> InteractionOutcome {
        self.pointer_move(x, y, positions)
    }

    pub fn touch_end(&mut self) -> InteractionOutcome {
        self.pointer_up()
    }

    fn end_drag(&mut self) -> Option<InteractionOutcome> {
        if self.is_dragging() {
            self.state = PointerState::Idle;
            Some(InteractionOutcome::DragEnded)
        } else {
            None
        }
    }

    fn leave_station(&mut self) -> InteractionOutcome {
        match std::mem::replace(&mut self.state, PointerState::Idle) {
            PointerState::Hovering(_) => InteractionOutcome::HideTooltip,
            _ => InteractionOutcome::None,
        }
    }

    fn clamp(&self, offset: f64) -> f64 {
        offset.clamp(0.0, self.max_scroll)
    }
}

// ============================================================================
// Tooltip
// ============================================================================

/// Text and colours for a station tooltip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TooltipContent {
    pub station_name: String,
    /// Passenger count with thousands separators, e.g. `12,345`
    pub passengers_text: String,
    pub level: CongestionLevel,
    pub congestion_color: String,
    /// Line colour, or the congestion colour when the line has none
    pub accent_color: String,
}

impl TooltipContent {
    pub fn from_sample(sample: &StationFlowSample, line_color: &str) -> Self {
        let congestion_color = sample.congestion.color().to_string();
        let accent_color = if line_color.is_empty() {
            congestion_color.clone()
        } else {
            line_color.to_string()
        };

        Self {
            station_name: sample.station_name.clone(),
            passengers_text: group_thousands(sample.passengers),
            level: sample.congestion,
            congestion_color,
            accent_color,
        }
    }

    pub fn level_label(&self) -> &'static str {
        self.level.label()
    }
}

fn group_thousands(value: u32) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Top-left corner for a tooltip of `size` next to the pointer.
///
/// Sits 20px right of and below the pointer; flips left or above when it would
/// leave the viewport. The left edge stays inside the viewport and the top
/// edge never starts closer than 10px to the top.
pub fn place_tooltip(
    pointer: (f64, f64),
    size: CanvasSize,
    viewport: CanvasSize,
) -> (f64, f64) {
    let (x, y) = pointer;
    let mut left = x + 20.0;
    let mut top = y + 20.0;

    if left + size.width > viewport.width {
        left = x - size.width - 15.0;
    }
    if top + size.height > viewport.height {
        top = y - size.height - 15.0;
    }

    let left = left.min(viewport.width - size.width).max(0.0);
    (left, top.max(10.0))
}
