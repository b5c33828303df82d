//! Heatmap component state: samples, layout, scroll and hover in one place.

use log::{debug, warn};

use crate::interaction::{InteractionOutcome, PointerInteractionResolver, TooltipContent};
use crate::layout::{CanvasSize, HeatmapConfig, HeatmapLayoutEngine, StationPosition};
use crate::render::{DrawSurface, FlowStats, HeatmapRenderer};
use crate::simulator::StationFlowSample;
use crate::{placeholder_station_name, Line};

#[derive(Debug, Clone, PartialEq)]
struct ActiveLine {
    id: i64,
    name: String,
    color: String,
}

/// A heatmap for one line.
///
/// Every input handler updates the state fully before returning; hosts redraw
/// after any outcome other than [`InteractionOutcome::None`].
#[derive(Debug, Clone)]
pub struct HeatmapView {
    engine: HeatmapLayoutEngine,
    renderer: HeatmapRenderer,
    interaction: PointerInteractionResolver,
    canvas: CanvasSize,
    line: Option<ActiveLine>,
    samples: Vec<StationFlowSample>,
    positions: Vec<StationPosition>,
    tooltip: Option<(TooltipContent, (f64, f64))>,
}

impl HeatmapView {
    pub fn new(config: HeatmapConfig, canvas: CanvasSize) -> Self {
        Self {
            interaction: PointerInteractionResolver::new(config.hit_radius()),
            renderer: HeatmapRenderer::new(config.clone()),
            engine: HeatmapLayoutEngine::new(config),
            canvas,
            line: None,
            samples: Vec::new(),
            positions: Vec::new(),
            tooltip: None,
        }
    }

    /// Replace the displayed samples.
    ///
    /// Switching to another line resets the scroll offset; refreshing the same
    /// line keeps it.
    pub fn set_data(&mut self, line: &Line, samples: Vec<StationFlowSample>) {
        let next = ActiveLine {
            id: line.id,
            name: line.name.clone(),
            color: line.color.clone(),
        };
        if self.line.as_ref().map(|l| l.id) != Some(line.id) {
            debug!("[HeatmapView] Switching to {}", line.name);
            self.interaction.reset();
            self.tooltip = None;
        }
        self.line = Some(next);
        self.samples = repair_names(samples);
        self.relayout();
    }

    /// Drop the line and samples; the next draw shows the placeholder.
    pub fn clear_data(&mut self) {
        self.line = None;
        self.samples.clear();
        self.tooltip = None;
        self.interaction.reset();
        self.relayout();
    }

    /// Follow a container size change.
    pub fn resize(&mut self, width: f64, height: f64) {
        if self.canvas == CanvasSize::new(width, height) {
            return;
        }
        debug!("[HeatmapView] Canvas resized to {}x{}", width, height);
        self.canvas = CanvasSize::new(width, height);
        self.relayout();
    }

    /// Paint the current state.
    ///
    /// A missing surface is logged and skipped; stats are still returned.
    pub fn draw(&self, surface: Option<&mut dyn DrawSurface>) -> FlowStats {
        let Some(surface) = surface else {
            warn!("[HeatmapView] No drawing surface, skipping frame");
            return FlowStats::from_samples(&self.samples);
        };

        self.renderer.render(
            surface,
            &self.samples,
            &self.positions,
            self.line.as_ref().map(|l| l.color.as_str()),
            self.interaction.hovered(),
        )
    }

    pub fn pointer_down(&mut self, x: f64, y: f64) -> InteractionOutcome {
        let outcome = self.interaction.pointer_down(x, y, &self.positions);
        self.apply(outcome)
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) -> InteractionOutcome {
        let outcome = self.interaction.pointer_move(x, y, &self.positions);
        self.apply(outcome)
    }

    pub fn pointer_up(&mut self) -> InteractionOutcome {
        let outcome = self.interaction.pointer_up();
        self.apply(outcome)
    }

    pub fn pointer_leave(&mut self) -> InteractionOutcome {
        let outcome = self.interaction.pointer_leave();
        self.apply(outcome)
    }

    pub fn touch_start(&mut self, x: f64, y: f64) -> InteractionOutcome {
        let outcome = self.interaction.touch_start(x, y, &self.positions);
        self.apply(outcome)
    }

    pub fn touch_move(&mut self, x: f64, y: f64) -> InteractionOutcome {
        let outcome = self.interaction.touch_move(x, y, &self.positions);
        self.apply(outcome)
    }

    pub fn touch_end(&mut self) -> InteractionOutcome {
        let outcome = self.interaction.touch_end();
        self.apply(outcome)
    }

    /// Scroll by a drag delta outside a pointer gesture (wheel, keys).
    pub fn scroll_by(&mut self, delta_x: f64) -> f64 {
        let offset = self.interaction.on_drag_delta(delta_x);
        self.relayout();
        offset
    }

    pub fn hovered(&self) -> Option<&StationFlowSample> {
        self.interaction.hovered().and_then(|i| self.samples.get(i))
    }

    /// Tooltip content and the pointer it is anchored at.
    pub fn tooltip(&self) -> Option<(&TooltipContent, (f64, f64))> {
        self.tooltip.as_ref().map(|(content, at)| (content, *at))
    }

    pub fn samples(&self) -> &[StationFlowSample] {
        &self.samples
    }

    pub fn positions(&self) -> &[StationPosition] {
        &self.positions
    }

    pub fn scroll_offset(&self) -> f64 {
        self.interaction.scroll_offset()
    }

    pub fn canvas(&self) -> CanvasSize {
        self.canvas
    }

    pub fn line_name(&self) -> Option<&str> {
        self.line.as_ref().map(|l| l.name.as_str())
    }

    fn apply(&mut self, outcome: InteractionOutcome) -> InteractionOutcome {
        match outcome {
            InteractionOutcome::ShowTooltip { index, x, y }
            | InteractionOutcome::StationClicked { index, x, y } => {
                let color = self.line.as_ref().map(|l| l.color.as_str()).unwrap_or("");
                self.tooltip = self
                    .samples
                    .get(index)
                    .map(|sample| (TooltipContent::from_sample(sample, color), (x, y)));
            }
            InteractionOutcome::HideTooltip | InteractionOutcome::DragStarted => {
                self.tooltip = None;
            }
            InteractionOutcome::Scrolled(_) => self.relayout(),
            InteractionOutcome::None | InteractionOutcome::DragEnded => {}
        }
        outcome
    }

    fn relayout(&mut self) {
        let count = self.samples.len();
        self.interaction
            .set_scroll_range(self.engine.max_scroll_offset(count, self.canvas.width));
        self.positions = self
            .engine
            .layout(count, self.interaction.scroll_offset(), self.canvas);
    }
}

fn repair_names(mut samples: Vec<StationFlowSample>) -> Vec<StationFlowSample> {
    for (i, sample) in samples.iter_mut().enumerate() {
        let trimmed = sample.station_name.trim();
        if trimmed.is_empty() {
            warn!("[HeatmapView] Sample #{} has no station name", i + 1);
            sample.station_name = placeholder_station_name(i);
        } else if trimmed.len() != sample.station_name.len() {
            sample.station_name = trimmed.to_string();
        }
    }
    samples
}
