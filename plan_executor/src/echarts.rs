//! ECharts page renderer with an external headless snapshot command.
//!
//! Each frame becomes a standalone HTML page that loads `echarts.min.js` from
//! the configured host and draws a kline + Bollinger grid over a volume grid.
//! The page is rasterized by running a command template such as
//! `chromium --headless --screenshot={image} --window-size={width},{height} file://{html}`.

use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use serde_json::{Value, json};
use snafu::{ResultExt, ensure};
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::{
    chart_frame::{ChartFrame, VolumePoint},
    errors::{ClosedSnafu, CommandSnafu, SessionError, SessionIoSnafu, UnavailableSnafu},
    renderer::{ChartRenderer, RenderSession},
};

const RISE_COLOR: &str = "#ef232a";
const FALL_COLOR: &str = "#14b143";
const RISE_FADED: &str = "rgba(239, 35, 42, 0.2)";
const FALL_FADED: &str = "rgba(20, 177, 67, 0.2)";

#[derive(Debug, Clone, PartialEq)]
pub struct EchartsSettings {
    pub width: u32,
    pub height: u32,
    /// Base URL (with trailing slash) that serves `echarts.min.js`.
    pub js_host: String,
    pub pixel_ratio: u32,
    /// Program and arguments; `{html}`, `{image}`, `{width}`, `{height}` and
    /// `{pixel_ratio}` are substituted per frame.
    pub snapshot_command: Vec<String>,
}

pub struct EchartsRenderer {
    settings: EchartsSettings,
}

impl EchartsRenderer {
    pub fn new(settings: EchartsSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ChartRenderer for EchartsRenderer {
    async fn open_session(&self) -> Result<Arc<dyn RenderSession>, SessionError> {
        ensure!(
            !self.settings.snapshot_command.is_empty(),
            UnavailableSnafu {
                message: "snapshot command is empty",
            }
        );
        Ok(Arc::new(EchartsSession {
            settings: self.settings.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

pub struct EchartsSession {
    settings: EchartsSettings,
    closed: AtomicBool,
}

impl EchartsSession {
    fn ensure_open(&self) -> Result<(), SessionError> {
        ensure!(!self.closed.load(Ordering::Acquire), ClosedSnafu);
        Ok(())
    }

    /// The snapshot argv for one frame.
    pub fn snapshot_args(&self, document: &Path, image: &Path) -> Vec<String> {
        let html = document.display().to_string();
        let image = image.display().to_string();
        let width = self.settings.width.to_string();
        let height = self.settings.height.to_string();
        let ratio = self.settings.pixel_ratio.to_string();
        self.settings
            .snapshot_command
            .iter()
            .map(|arg| {
                arg.replace("{html}", &html)
                    .replace("{image}", &image)
                    .replace("{width}", &width)
                    .replace("{height}", &height)
                    .replace("{pixel_ratio}", &ratio)
            })
            .collect()
    }
}

#[async_trait]
impl RenderSession for EchartsSession {
    async fn render_document(&self, frame: &ChartFrame, document: &Path) -> Result<(), SessionError> {
        self.ensure_open()?;
        let page = html_page(frame, &self.settings);
        tokio::fs::write(document, page)
            .await
            .context(SessionIoSnafu { path: document })
    }

    #[instrument(skip_all, fields(image = %image.display()))]
    async fn snapshot(&self, document: &Path, image: &Path) -> Result<(), SessionError> {
        self.ensure_open()?;
        let args = self.snapshot_args(document, image);
        let command_line = args.join(" ");
        let Some((program, rest)) = args.split_first() else {
            return UnavailableSnafu {
                message: "snapshot command is empty",
            }
            .fail();
        };

        let output = Command::new(program)
            .args(rest)
            .kill_on_drop(true)
            .output()
            .await
            .context(SessionIoSnafu { path: program })?;

        ensure!(
            output.status.success(),
            CommandSnafu {
                command: command_line,
                message: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            }
        );

        let written = tokio::fs::metadata(image)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        ensure!(
            written > 0,
            CommandSnafu {
                command: command_line,
                message: "no image was written",
            }
        );
        debug!(bytes = written, "snapshot written");
        Ok(())
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Standalone page drawing `frame`. Animation is off so the first paint is final.
pub fn html_page(frame: &ChartFrame, settings: &EchartsSettings) -> String {
    // `</` inside a script block would end it early.
    let option = chart_option(frame).to_string().replace("</", "<\\/");
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8">
<title>{title}</title>
<script type="text/javascript" src="{host}echarts.min.js"></script>
</head>
<body style="margin:0">
<div id="chart" style="width:{width}px;height:{height}px;"></div>
<script type="text/javascript">
var chart = echarts.init(document.getElementById('chart'), null, {{renderer: 'canvas'}});
chart.setOption({option});
</script>
</body>
</html>
"#,
        title = escape_html(&frame.title),
        host = settings.js_host,
        width = settings.width,
        height = settings.height,
    )
}

fn candle_style(faded: bool) -> Value {
    if faded {
        json!({
            "color": RISE_FADED,
            "color0": FALL_FADED,
            "borderColor": "rgba(239, 35, 42, 0.3)",
            "borderColor0": "rgba(20, 177, 67, 0.3)",
        })
    } else {
        json!({
            "color": RISE_COLOR,
            "color0": FALL_COLOR,
            "borderColor": RISE_COLOR,
            "borderColor0": FALL_COLOR,
        })
    }
}

fn axis_bound(bound: Option<f64>, fallback: &str) -> Value {
    bound.map_or_else(|| json!(fallback), |v| json!(v))
}

/// The ECharts option object for one frame.
pub fn chart_option(frame: &ChartFrame) -> Value {
    let mut series = vec![
        json!({
            "name": "Boll Lower", "type": "line", "data": frame.boll_lower, "smooth": true,
            "showSymbol": false, "stack": "Boll", "lineStyle": {"opacity": 0},
        }),
        json!({
            "name": "Boll Upper", "type": "line", "data": frame.boll_width, "smooth": true,
            "showSymbol": false, "stack": "Boll", "lineStyle": {"opacity": 0},
            "areaStyle": {"color": "#ccc", "opacity": 0.2},
        }),
        json!({
            "name": "Boll Middle", "type": "line", "data": frame.boll_mid, "smooth": true,
            "showSymbol": false, "lineStyle": {"opacity": 0.2}, "itemStyle": {"color": "#999"},
        }),
    ];
    if let Some(backdrop) = &frame.backdrop {
        series.push(json!({
            "type": "candlestick", "data": backdrop.candles, "itemStyle": candle_style(true),
        }));
    }
    series.push(json!({
        "type": "candlestick", "data": frame.candles, "itemStyle": candle_style(false),
    }));
    // Volume points carry their index as x so a shorter prefix lines up with the backdrop.
    let volume_series = |data: &[VolumePoint]| {
        json!({
            "name": "volume", "type": "bar", "data": data, "xAxisIndex": 1, "yAxisIndex": 1,
            "barWidth": "50%", "barGap": "-100%", "label": {"show": false},
        })
    };
    if let Some(backdrop) = &frame.backdrop {
        series.push(volume_series(&backdrop.volumes));
    }
    series.push(volume_series(&frame.volumes));

    let mut visual_maps = vec![json!({
        "show": false, "seriesIndex": series.len() - 1, "dimension": 2,
        "pieces": [{"value": 1, "color": RISE_COLOR}, {"value": -1, "color": FALL_COLOR}],
    })];
    if frame.backdrop.is_some() {
        visual_maps.push(json!({
            "show": false, "seriesIndex": series.len() - 2, "dimension": 2,
            "pieces": [{"value": 1, "color": RISE_FADED}, {"value": -1, "color": FALL_FADED}],
        }));
    }

    json!({
        "animation": false,
        "backgroundColor": "#fff",
        "title": {"text": frame.title, "subtext": frame.subtitle, "top": "1%", "left": "center"},
        "legend": {"show": false},
        "tooltip": {"trigger": "axis", "axisPointer": {"type": "cross"}},
        "axisPointer": {"link": [{"xAxisIndex": "all"}]},
        "visualMap": visual_maps,
        "grid": [
            {"left": "10%", "top": "8%", "right": "8%", "height": "50%"},
            {"left": "10%", "top": "60%", "right": "8%", "height": "16%"},
        ],
        "xAxis": [
            {"type": "category", "data": frame.dates, "scale": true, "gridIndex": 0},
            {
                "type": "category", "data": frame.dates, "scale": true, "gridIndex": 1,
                "boundaryGap": true, "axisLine": {"onZero": false}, "axisTick": {"show": false},
                "splitLine": {"show": false}, "axisLabel": {"show": false},
                "min": "dataMin", "max": "dataMax",
            },
        ],
        "yAxis": [
            {
                "scale": true, "gridIndex": 0,
                "min": axis_bound(frame.price_axis.map(|a| a.min), "dataMin"),
                "max": axis_bound(frame.price_axis.map(|a| a.max), "dataMax"),
                "splitArea": {"show": true, "areaStyle": {"opacity": 1}},
            },
            {
                "scale": true, "gridIndex": 1, "splitNumber": 2,
                "min": axis_bound(frame.volume_axis.map(|a| a.min), "dataMin"),
                "max": axis_bound(frame.volume_axis.map(|a| a.max), "dataMax"),
                "axisLabel": {"show": false}, "axisLine": {"show": false},
                "axisTick": {"show": false}, "splitLine": {"show": false},
            },
        ],
        "series": series,
    })
}
