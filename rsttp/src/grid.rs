use crate::config::{Calendar, LayoutParams};
use crate::models::{BoundingBox, TimeRow, WeekColumn};
use chrono::{Duration, NaiveTime};

/// Label of the header column that holds the "Week" caption instead of data.
pub const HEADER_COLUMN_LABEL: &str = "Week";

/// Splits the week header into equal columns.
///
/// Each column loses `shrink_ratio / 2` of its width on both sides. Column 0 is
/// labelled `"Week"` and the following columns take the calendar's week labels in order.
///
/// # Arguments
///
/// * `week_header` - The refined week header box.
/// * `calendar` - Supplies the week labels.
/// * `params` - Supplies the column count and shrink ratio.
pub fn get_weeks(week_header: &BoundingBox, calendar: &Calendar, params: &LayoutParams) -> Vec<WeekColumn> {
    let count = params.week_columns;
    let col_width = week_header.width() / count as f32;

    let mut columns = Vec::with_capacity(count);
    for i in 0..count {
        let label = if i == 0 {
            HEADER_COLUMN_LABEL.to_string()
        } else {
            calendar.weeks.get(i - 1).cloned().unwrap_or_else(|| i.to_string())
        };
        let x1 = week_header.x1 + i as f32 * col_width;
        let x2 = week_header.x1 + (i + 1) as f32 * col_width;
        let pad = (x2 - x1) * params.shrink_ratio / 2.0;
        columns.push(WeekColumn {
            label: label,
            x1: x1 + pad,
            x2: x2 - pad,
            index: i,
        });
    }
    return columns;
}

/// Start and end labels (`HHMM`) of every row of the time grid.
pub fn row_bounds(params: &LayoutParams) -> Vec<(String, String)> {
    let start = NaiveTime::parse_from_str(&params.grid_start, "%H%M")
        .unwrap_or_else(|_| NaiveTime::from_hms_opt(8, 30, 0).unwrap_or_default());
    let step = Duration::minutes(params.row_minutes);

    (0..params.time_rows)
        .map(|i| {
            let row_start = start + step * i as i32;
            let row_end = row_start + step;
            (row_start.format("%H%M").to_string(), row_end.format("%H%M").to_string())
        })
        .collect()
}

/// Splits the time axis into contiguous rows of `row_minutes` starting at `grid_start`.
pub fn get_time_rows(time_axis: &BoundingBox, params: &LayoutParams) -> Vec<TimeRow> {
    let row_height = time_axis.height() / params.time_rows as f32;

    row_bounds(params)
        .into_iter()
        .enumerate()
        .map(|(i, (start, end))| TimeRow {
            label: format!("{}-{}", start, end),
            y1: time_axis.y1 + i as f32 * row_height,
            y2: time_axis.y1 + (i + 1) as f32 * row_height,
        })
        .collect()
}
