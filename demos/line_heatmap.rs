//! Simulate a line for a few ticks and write its heatmap as SVG.
//!
//! ```sh
//! cargo run --example line_heatmap -- heatmap.svg
//! ```

use std::cell::Cell;
use std::fmt::Write as _;

use chrono::{Local, NaiveDate};
use metro_flow::{
    place_tooltip, CanvasSize, DrawSurface, FlowService, HeatmapConfig, HeatmapView, LineTicker,
    OfflineTransport, SimulatorConfig, TextAlign, TextBaseline, TextStyle, TickerConfig,
};

const LINES: &str = r##"[
    {"id": 1, "name": "1号线", "color": "#00a650",
     "stations": ["罗湖", "国贸", "老街", "大剧院", "科学馆", "华强路", "岗厦", "会展中心",
                  "购物公园", "香蜜湖", "车公庙", "竹子林", "侨城东", "华侨城", "世界之窗"]},
    {"id": 2, "name": "2号线", "color": "#f7941d",
     "stations": ["赤湾", "蛇口港", "海上世界", "世界之窗", "侨城北", "深康", "车公庙", "大剧院"]},
    {"id": 7, "name": "7号线", "color": "#1f4e9d",
     "stations": ["西丽湖", "西丽", "车公庙", {"name": "华强北"}, "黄贝岭"]}
]"##;

/// Accumulates an SVG document.
struct SvgSurface {
    size: CanvasSize,
    body: String,
}

impl SvgSurface {
    fn new(width: f64, height: f64) -> Self {
        Self {
            size: CanvasSize::new(width, height),
            body: String::new(),
        }
    }

    fn finish(&self) -> String {
        format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}">{}</svg>"#,
            self.size.width, self.size.height, self.body
        )
    }
}

impl DrawSurface for SvgSurface {
    fn size(&self) -> CanvasSize {
        self.size
    }

    fn clear(&mut self) {
        self.body.clear();
    }

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: &str) {
        let _ = write!(
            self.body,
            r#"<rect x="{x}" y="{y}" width="{width}" height="{height}" fill="{color}"/>"#
        );
    }

    fn stroke_line(&mut self, from: (f64, f64), to: (f64, f64), color: &str, width: f64) {
        let _ = write!(
            self.body,
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{color}" stroke-width="{width}"/>"#,
            from.0, from.1, to.0, to.1
        );
    }

    fn stroke_path(&mut self, points: &[(f64, f64)], color: &str, width: f64) {
        let points: Vec<String> = points.iter().map(|(x, y)| format!("{x},{y}")).collect();
        let _ = write!(
            self.body,
            r#"<polyline points="{}" fill="none" stroke="{color}" stroke-width="{width}" stroke-linecap="round" stroke-linejoin="round"/>"#,
            points.join(" ")
        );
    }

    fn fill_circle(&mut self, cx: f64, cy: f64, radius: f64, color: &str) {
        let _ = write!(self.body, r#"<circle cx="{cx}" cy="{cy}" r="{radius}" fill="{color}"/>"#);
    }

    fn stroke_circle(&mut self, cx: f64, cy: f64, radius: f64, color: &str, width: f64) {
        let _ = write!(
            self.body,
            r#"<circle cx="{cx}" cy="{cy}" r="{radius}" fill="none" stroke="{color}" stroke-width="{width}"/>"#
        );
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64, style: &TextStyle<'_>) {
        let anchor = match style.align {
            TextAlign::Left => "start",
            TextAlign::Center => "middle",
            TextAlign::Right => "end",
        };
        let baseline = match style.baseline {
            TextBaseline::Top => "hanging",
            TextBaseline::Middle => "middle",
            TextBaseline::Bottom => "text-after-edge",
        };
        let weight = if style.bold { "bold" } else { "normal" };
        let _ = write!(
            self.body,
            r#"<text x="{x}" y="{y}" fill="{}" font-size="{}" font-weight="{weight}" text-anchor="{anchor}" dominant-baseline="{baseline}">{text}</text>"#,
            style.color, style.size
        );
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let output = std::env::args().nth(1).unwrap_or_else(|| "heatmap.svg".to_string());
    let lines = metro_flow::parse_lines(LINES)?;
    let line = lines[0].clone();

    let mut service = FlowService::new(lines, OfflineTransport, SimulatorConfig::default());
    let mut view = HeatmapView::new(HeatmapConfig::default(), CanvasSize::new(900.0, 420.0));

    // Pin the clock to a weekday morning peak so the output is reproducible
    let start = NaiveDate::from_ymd_opt(2025, 3, 12)
        .and_then(|d| d.and_hms_opt(8, 15, 0))
        .unwrap_or_else(|| Local::now().naive_local());

    let ticker = LineTicker::new(TickerConfig::default());
    let guard = ticker.activate();
    let stopper = ticker.clone();
    let tick = Cell::new(0);
    let mut latest = Vec::new();

    ticker
        .run(
            &mut service,
            line.id,
            guard,
            || {
                tick.set(tick.get() + 1);
                start + chrono::Duration::seconds(tick.get())
            },
            |samples| {
                latest = samples;
                if tick.get() >= 3 {
                    stopper.cancel();
                }
            },
        )
        .await?;

    view.set_data(&line, latest);
    if let Some(pos) = view.positions().get(3).copied() {
        view.pointer_move(pos.x, pos.y);
    }

    let mut surface = SvgSurface::new(900.0, 420.0);
    let stats = view.draw(Some(&mut surface));
    std::fs::write(&output, surface.finish())?;

    println!(
        "{}: total {} / avg {} / peak {} -> {}",
        line.name, stats.total, stats.avg, stats.peak, output
    );
    if let Some((tooltip, pointer)) = view.tooltip() {
        let (left, top) = place_tooltip(pointer, CanvasSize::new(180.0, 90.0), view.canvas());
        println!(
            "tooltip at ({left}, {top}): {} {} 人 {}",
            tooltip.station_name,
            tooltip.passengers_text,
            tooltip.level_label()
        );
    }

    let info = service.line_operation_info(line.id, start)?;
    println!("{} {}", info.status.label(), info.next_train);
    Ok(())
}
