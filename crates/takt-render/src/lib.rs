//! # takt-render
//!
//! SVG Gantt rendering for solved schedules.
//!
//! One row per machine, one bar per operation coloured by its order, grey
//! blocks for non-zero changeovers and a red outline on late operations.
//! The input is the flat timeline the materialiser emits, so the renderer
//! knows nothing about the solver.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use svg::node::element::{Group, Line, Rectangle, Text};
use svg::Document;

use takt_core::{RenderError, TimelineRecord, TimelineRenderer, CHANGEOVER_ORDER_NO};

/// Bar colours cycled per order, first-seen order of appearance.
const PALETTE: [&str; 10] = [
    "#3498db", "#2ecc71", "#9b59b6", "#e67e22", "#1abc9c", "#f1c40f", "#34495e", "#e84393",
    "#16a085", "#d35400",
];

const CHANGEOVER_COLOR: &str = "#808080";

/// SVG Gantt chart renderer configuration.
#[derive(Clone, Debug)]
pub struct SvgGantt {
    /// Width of the chart area (excluding labels) in pixels
    pub chart_width: u32,
    /// Height per machine row in pixels
    pub row_height: u32,
    /// Width of the machine label column in pixels
    pub label_width: u32,
    /// Header height in pixels
    pub header_height: u32,
    /// Padding around the chart
    pub padding: u32,
    pub background_color: String,
    pub grid_color: String,
    pub text_color: String,
    pub late_color: String,
    pub font_family: String,
    pub font_size: u32,
}

impl Default for SvgGantt {
    fn default() -> Self {
        Self {
            chart_width: 960,
            row_height: 32,
            label_width: 160,
            header_height: 40,
            padding: 20,
            background_color: "#ffffff".into(),
            grid_color: "#ecf0f1".into(),
            text_color: "#2c3e50".into(),
            late_color: "#e74c3c".into(),
            font_family: "system-ui, -apple-system, sans-serif".into(),
            font_size: 12,
        }
    }
}

impl SvgGantt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chart_width(mut self, width: u32) -> Self {
        self.chart_width = width;
        self
    }

    fn total_width(&self) -> u32 {
        self.padding * 2 + self.label_width + self.chart_width
    }

    fn total_height(&self, rows: usize) -> u32 {
        self.padding * 2 + self.header_height + rows as u32 * self.row_height
    }

    fn time_to_x(&self, t: NaiveDateTime, origin: NaiveDateTime, px_per_minute: f64) -> f64 {
        let minutes = (t - origin).num_minutes() as f64;
        f64::from(self.padding + self.label_width) + minutes * px_per_minute
    }
}

impl TimelineRenderer for SvgGantt {
    type Output = String;

    fn render(&self, timeline: &[TimelineRecord]) -> Result<String, RenderError> {
        if timeline.is_empty() {
            return Err(RenderError::InvalidData("empty timeline".into()));
        }

        let origin = timeline
            .iter()
            .map(|r| r.start_time)
            .min()
            .expect("timeline is non-empty");
        let end = timeline
            .iter()
            .map(|r| r.end_time)
            .max()
            .expect("timeline is non-empty");
        let total_minutes = (end - origin).num_minutes().max(1) as f64;
        let px_per_minute = f64::from(self.chart_width) / total_minutes;

        // Row per machine ordered by name; colours by order of appearance
        // so identical inputs render identically
        let rows: BTreeMap<&str, usize> = {
            let names: std::collections::BTreeSet<&str> =
                timeline.iter().map(|r| r.resource_name.as_str()).collect();
            names.into_iter().enumerate().map(|(row, name)| (name, row)).collect()
        };
        let mut colors: BTreeMap<&str, &str> = BTreeMap::new();
        let mut next_color = 0usize;
        for record in timeline {
            if record.order_no == CHANGEOVER_ORDER_NO {
                continue;
            }
            colors.entry(record.color_key.as_str()).or_insert_with(|| {
                let color = PALETTE[next_color % PALETTE.len()];
                next_color += 1;
                color
            });
        }

        let width = self.total_width();
        let height = self.total_height(rows.len());
        let mut document = Document::new()
            .set("viewBox", (0, 0, width, height))
            .set("width", width)
            .set("height", height)
            .set("xmlns", "http://www.w3.org/2000/svg");

        let background = Rectangle::new()
            .set("x", 0)
            .set("y", 0)
            .set("width", width)
            .set("height", height)
            .set("fill", self.background_color.as_str());
        document = document.add(background);

        document = document.add(self.render_grid(origin, end, px_per_minute, rows.len()));
        document = document.add(self.render_labels(&rows));

        let mut bars = Group::new().set("class", "bars");
        for record in timeline {
            let row = rows[record.resource_name.as_str()];
            let x = self.time_to_x(record.start_time, origin, px_per_minute);
            let x_end = self.time_to_x(record.end_time, origin, px_per_minute);
            let bar_width = (x_end - x).max(1.0);
            let y = f64::from(self.padding + self.header_height)
                + f64::from(row as u32 * self.row_height)
                + 4.0;
            let bar_height = f64::from(self.row_height) - 8.0;

            let is_changeover = record.order_no == CHANGEOVER_ORDER_NO;
            let fill = if is_changeover {
                CHANGEOVER_COLOR
            } else {
                colors[record.color_key.as_str()]
            };

            let mut bar = Rectangle::new()
                .set("x", x)
                .set("y", y)
                .set("width", bar_width)
                .set("height", bar_height)
                .set("rx", 3)
                .set("fill", fill);
            if record.is_late {
                bar = bar
                    .set("stroke", self.late_color.as_str())
                    .set("stroke-width", 2);
            }
            bars = bars.add(bar);

            // label the bar when there is room, the way wide bars carry
            // their order number and narrow ones stay clean
            let label = if is_changeover {
                String::new()
            } else {
                format!("{}-{}", record.order_no, record.op_no)
            };
            if !label.is_empty() && bar_width > label.len() as f64 * 7.0 {
                let text = Text::new(label)
                    .set("x", x + bar_width / 2.0)
                    .set("y", y + bar_height / 2.0 + f64::from(self.font_size) / 3.0)
                    .set("text-anchor", "middle")
                    .set("fill", "#ffffff")
                    .set("font-family", self.font_family.as_str())
                    .set("font-size", self.font_size);
                bars = bars.add(text);
            }
        }
        document = document.add(bars);

        Ok(document.to_string())
    }
}

impl SvgGantt {
    fn render_grid(
        &self,
        origin: NaiveDateTime,
        end: NaiveDateTime,
        px_per_minute: f64,
        rows: usize,
    ) -> Group {
        let mut group = Group::new().set("class", "grid");
        let chart_top = self.padding + self.header_height;
        let chart_bottom = chart_top + rows as u32 * self.row_height;

        // one line per day boundary, labelled in the header
        let mut day = origin.date();
        while day <= end.date() {
            let at = day.and_hms_opt(0, 0, 0).expect("midnight is a valid time");
            if at >= origin {
                let x = self.time_to_x(at, origin, px_per_minute);
                let line = Line::new()
                    .set("x1", x)
                    .set("y1", chart_top)
                    .set("x2", x)
                    .set("y2", chart_bottom)
                    .set("stroke", self.grid_color.as_str())
                    .set("stroke-width", 1);
                group = group.add(line);
                let label = Text::new(day.format("%m-%d").to_string())
                    .set("x", x + 2.0)
                    .set("y", f64::from(self.padding) + f64::from(self.header_height) / 2.0)
                    .set("fill", self.text_color.as_str())
                    .set("font-family", self.font_family.as_str())
                    .set("font-size", self.font_size);
                group = group.add(label);
            }
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
        group
    }

    fn render_labels(&self, rows: &BTreeMap<&str, usize>) -> Group {
        let mut group = Group::new().set("class", "labels");
        for (&name, &row) in rows {
            let y = f64::from(self.padding + self.header_height)
                + f64::from(row as u32 * self.row_height)
                + f64::from(self.row_height) / 2.0
                + f64::from(self.font_size) / 3.0;
            let text = Text::new(name)
                .set("x", self.padding)
                .set("y", y)
                .set("fill", self.text_color.as_str())
                .set("font-family", self.font_family.as_str())
                .set("font-size", self.font_size);
            group = group.add(text);
        }
        group
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn record(order: &str, resource: &str, start: NaiveDateTime, end: NaiveDateTime) -> TimelineRecord {
        TimelineRecord {
            order_no: order.into(),
            op_no: 10,
            op_name: "Op".into(),
            resource_name: resource.into(),
            start_time: start,
            end_time: end,
            is_late: false,
            color_key: order.into(),
            changeover_minutes: 0,
        }
    }

    #[test]
    fn renders_rows_and_bars() {
        let timeline = vec![
            record("WO-1", "Mill-1", at(5, 8, 0), at(5, 12, 0)),
            record("WO-2", "Mill-2", at(5, 8, 0), at(5, 10, 0)),
        ];
        let svg = SvgGantt::new().render(&timeline).unwrap();

        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("Mill-1"));
        assert!(svg.contains("Mill-2"));
        assert!(svg.contains("WO-1-10"));
    }

    #[test]
    fn changeover_blocks_are_grey() {
        let mut block = record(CHANGEOVER_ORDER_NO, "Mill-1", at(5, 8, 0), at(5, 9, 0));
        block.changeover_minutes = 60;
        block.color_key = CHANGEOVER_ORDER_NO.into();
        let timeline = vec![
            block,
            record("WO-1", "Mill-1", at(5, 9, 0), at(5, 12, 0)),
        ];
        let svg = SvgGantt::new().render(&timeline).unwrap();

        assert!(svg.contains(CHANGEOVER_COLOR));
    }

    #[test]
    fn late_operations_are_outlined() {
        let mut late = record("WO-1", "Mill-1", at(5, 8, 0), at(5, 12, 0));
        late.is_late = true;
        let svg = SvgGantt::new().render(&[late]).unwrap();

        assert!(svg.contains("stroke"));
        assert!(svg.contains(&SvgGantt::default().late_color));
    }

    #[test]
    fn empty_timeline_fails() {
        let err = SvgGantt::new().render(&[]).unwrap_err();
        assert!(matches!(err, RenderError::InvalidData(_)));
    }

    #[test]
    fn colors_are_stable_per_order() {
        let timeline = vec![
            record("WO-1", "Mill-1", at(5, 8, 0), at(5, 10, 0)),
            record("WO-1", "Mill-1", at(5, 10, 0), at(5, 12, 0)),
            record("WO-2", "Mill-1", at(5, 12, 0), at(5, 14, 0)),
        ];
        let svg = SvgGantt::new().render(&timeline).unwrap();

        // first two bars share WO-1's colour, the third differs
        assert_eq!(svg.matches(PALETTE[0]).count(), 2);
        assert_eq!(svg.matches(PALETTE[1]).count(), 1);
    }
}
