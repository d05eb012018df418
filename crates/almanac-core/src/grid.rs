use anyhow::{Context, anyhow};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::classify::{DayClassifier, DayType, StatusLabels};
use crate::day::{Bounds, Day};
use crate::selection::{Selection, SelectionMode};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DayRecord {
    pub date: Day,
    #[serde(rename = "type")]
    pub day_type: DayType,
    pub ordinal: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_label: Option<String>,
}

/// Lazy-render stand-in for one grid row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placeholder {
    pub row: usize,
    #[serde(rename = "type")]
    pub day_type: DayType,
}

impl Placeholder {
    pub fn new(row: usize) -> Self {
        Self {
            row,
            day_type: DayType::Placeholder,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridLayout {
    pub weekday_offset: u32,
    pub total_days: u32,
    pub placeholder_row_count: usize,
}

/// Everything a month build depends on. Two equal inputs always produce
/// equal grids, so this doubles as the memoization key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonthInput {
    pub anchor: Day,
    pub bounds: Bounds,
    pub mode: SelectionMode,
    pub selection: Option<Selection>,
    pub allow_same_day: bool,
    /// 0 = Sunday through 6 = Saturday.
    pub first_day_of_week: u32,
    pub labels: StatusLabels,
    pub lazy_render: bool,
}

impl MonthInput {
    pub fn new(anchor: Day, bounds: Bounds, mode: SelectionMode) -> Self {
        Self {
            anchor,
            bounds,
            mode,
            selection: None,
            allow_same_day: false,
            first_day_of_week: 0,
            labels: StatusLabels::default(),
            lazy_render: true,
        }
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    pub fn with_allow_same_day(mut self, allow: bool) -> Self {
        self.allow_same_day = allow;
        self
    }

    pub fn with_first_day_of_week(mut self, first_day_of_week: u32) -> Self {
        self.first_day_of_week = first_day_of_week;
        self
    }

    pub fn with_labels(mut self, labels: StatusLabels) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_lazy_render(mut self, lazy: bool) -> Self {
        self.lazy_render = lazy;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthGrid {
    pub year: i32,
    pub month: u32,
    pub layout: GridLayout,
    pub days: Vec<DayRecord>,
    pub placeholders: Vec<Placeholder>,
}

impl MonthGrid {
    pub fn day(&self, ordinal: u32) -> Option<&DayRecord> {
        self.days.iter().find(|record| record.ordinal == ordinal)
    }

    /// 1-based grid row holding the given day of month.
    pub fn row_of(&self, ordinal: u32) -> usize {
        (ordinal + self.layout.weekday_offset).div_ceil(7) as usize
    }
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month >= 12 {
        (year.saturating_add(1), 1)
    } else {
        (year, month + 1)
    };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(31)
}

/// Leading blank cells before day 1 once `first_day_of_week` is column 0.
/// Values past 6 wrap around the week.
pub fn weekday_offset(first_of_month: Day, first_day_of_week: u32) -> u32 {
    let real = first_of_month.date().weekday().num_days_from_sunday();
    let first_day_of_week = first_day_of_week % 7;
    if first_day_of_week == 0 {
        real
    } else {
        (real + 7 - first_day_of_week) % 7
    }
}

/// One entry per grid row, not per cell.
pub fn placeholder_rows(total_days: u32, weekday_offset: u32) -> usize {
    (total_days + weekday_offset).div_ceil(7) as usize
}

pub fn layout_for(anchor: Day, first_day_of_week: u32) -> GridLayout {
    let total_days = days_in_month(anchor.year(), anchor.month());
    let weekday_offset = weekday_offset(anchor.first_of_month(), first_day_of_week);
    GridLayout {
        weekday_offset,
        total_days,
        placeholder_row_count: placeholder_rows(total_days, weekday_offset),
    }
}

/// Builds the classified grid for the month containing `input.anchor`.
///
/// `transform` sees every record in ordinal order and may rewrite it
/// wholesale. The first error it returns aborts the build.
#[tracing::instrument(skip(input, transform), fields(anchor = %input.anchor, mode = input.mode.as_key()))]
pub fn build_month<F>(input: &MonthInput, mut transform: Option<F>) -> anyhow::Result<MonthGrid>
where
    F: FnMut(DayRecord) -> anyhow::Result<DayRecord>,
{
    if input.first_day_of_week > 6 {
        return Err(anyhow!(
            "first_day_of_week must be 0-6 (0 = Sunday), got {}",
            input.first_day_of_week
        ));
    }

    if let Some(selection) = &input.selection {
        if selection.mode() != input.mode {
            warn!(
                mode = input.mode.as_key(),
                selection = selection.mode().as_key(),
                "selection does not match mode; no day will be selected"
            );
        } else if selection.is_empty() {
            debug!("selection is empty");
        }
    }

    let year = input.anchor.year();
    let month = input.anchor.month();
    let layout = layout_for(input.anchor, input.first_day_of_week);

    let classifier = DayClassifier::new(
        input.mode,
        input.bounds,
        input.selection.as_ref(),
        input.allow_same_day,
        &input.labels,
    );

    let mut days = Vec::with_capacity(layout.total_days as usize);
    for ordinal in 1..=layout.total_days {
        let date = Day::from_ymd(year, month, ordinal)
            .ok_or_else(|| anyhow!("invalid calendar day {year}-{month:02}-{ordinal:02}"))?;
        let day_type = classifier.classify(date);
        let record = DayRecord {
            date,
            day_type,
            ordinal,
            status_label: classifier.status_label(day_type),
        };

        let record = match transform.as_mut() {
            Some(transform) => transform(record)
                .with_context(|| format!("day transform failed for {date}"))?,
            None => record,
        };
        days.push(record);
    }

    let placeholders = (0..layout.placeholder_row_count)
        .map(Placeholder::new)
        .collect();

    debug!(
        total_days = layout.total_days,
        weekday_offset = layout.weekday_offset,
        rows = layout.placeholder_row_count,
        "built month grid"
    );

    Ok(MonthGrid {
        year,
        month,
        layout,
        days,
        placeholders,
    })
}

/// Type hint for callers that build without a transform.
pub type NoTransform = fn(DayRecord) -> anyhow::Result<DayRecord>;

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::{
        DayRecord, MonthInput, NoTransform, build_month, days_in_month, layout_for,
        placeholder_rows, weekday_offset,
    };
    use crate::classify::DayType;
    use crate::day::{Bounds, Day};
    use crate::selection::{Selection, SelectionMode};

    fn day(y: i32, m: u32, d: u32) -> Day {
        Day::from_ymd(y, m, d).expect("valid day")
    }

    fn feb_2024(mode: SelectionMode) -> MonthInput {
        MonthInput::new(
            day(2024, 2, 1),
            Bounds::new(day(2024, 1, 1), day(2024, 12, 31)),
            mode,
        )
    }

    #[test]
    fn month_lengths_are_leap_aware() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(1900, 2), 28);
        assert_eq!(days_in_month(2000, 2), 29);
        assert_eq!(days_in_month(2024, 4), 30);
        assert_eq!(days_in_month(2024, 12), 31);
    }

    #[test]
    fn offset_rotates_with_first_day_of_week() {
        let thursday = day(2024, 2, 1);
        assert_eq!(weekday_offset(thursday, 0), 4);
        assert_eq!(weekday_offset(thursday, 1), 3);
        assert_eq!(weekday_offset(thursday, 4), 0);
        assert_eq!(weekday_offset(thursday, 6), 5);
    }

    #[test]
    fn offset_wraps_first_day_of_week_past_saturday() {
        let thursday = day(2024, 2, 1);
        assert_eq!(weekday_offset(thursday, 7), 4);
        assert_eq!(weekday_offset(thursday, 20), 5);
        assert_eq!(weekday_offset(thursday, u32::MAX), weekday_offset(thursday, u32::MAX % 7));
        assert_eq!(layout_for(thursday, 13).weekday_offset, 5);
    }

    #[test]
    fn placeholders_are_typed_rows() {
        let grid = build_month(&feb_2024(SelectionMode::Single), None::<NoTransform>)
            .expect("build february");
        assert!(
            grid.placeholders
                .iter()
                .enumerate()
                .all(|(idx, p)| p.row == idx && p.day_type == DayType::Placeholder)
        );
        let value = serde_json::to_value(grid.placeholders[0]).expect("serialize placeholder");
        assert_eq!(value, serde_json::json!({ "row": 0, "type": "placeholder" }));
    }

    #[test]
    fn selection_of_another_mode_selects_nothing() {
        let single = Selection::single(day(2024, 2, 14));
        assert_eq!(single.mode(), SelectionMode::Single);
        let input = feb_2024(SelectionMode::Range).with_selection(single);
        let grid = build_month(&input, None::<NoTransform>).expect("build february");
        assert!(grid.days.iter().all(|r| r.day_type == DayType::Empty));

        let empty = Selection::multiple(Vec::new());
        assert!(empty.is_empty());
        let input = feb_2024(SelectionMode::Multiple).with_selection(empty);
        let grid = build_month(&input, None::<NoTransform>).expect("build february");
        assert!(grid.days.iter().all(|r| r.day_type == DayType::Empty));
    }

    #[test]
    fn placeholders_count_rows_not_cells() {
        assert_eq!(placeholder_rows(29, 4), 5);
        assert_eq!(placeholder_rows(28, 0), 4);
        assert_eq!(placeholder_rows(31, 6), 6);
    }

    #[test]
    fn builds_feb_2024_layout() {
        let grid = build_month(&feb_2024(SelectionMode::Single), None::<NoTransform>)
            .expect("build february");

        assert_eq!(grid.layout.total_days, 29);
        assert_eq!(grid.layout.weekday_offset, 4);
        assert_eq!(grid.layout.placeholder_row_count, 5);
        assert_eq!(grid.placeholders.len(), 5);
        assert_eq!(grid.days.len(), 29);
        assert!(grid.days.iter().all(|r| r.day_type == DayType::Empty));
        assert_eq!(grid.row_of(1), 1);
        assert_eq!(grid.row_of(29), 5);
    }

    #[test]
    fn anchor_day_of_month_is_ignored() {
        let a = build_month(&feb_2024(SelectionMode::Single), None::<NoTransform>)
            .expect("build from first");
        let mut input = feb_2024(SelectionMode::Single);
        input.anchor = day(2024, 2, 17);
        let b = build_month(&input, None::<NoTransform>).expect("build from mid-month");
        assert_eq!(a, b);
    }

    #[test]
    fn transform_runs_once_per_day_in_order() {
        let mut seen = Vec::new();
        let input = feb_2024(SelectionMode::Range)
            .with_selection(Selection::range(Some(day(2024, 2, 10)), Some(day(2024, 2, 12))));
        let grid = build_month(
            &input,
            Some(|mut record: DayRecord| {
                seen.push(record.ordinal);
                if record.ordinal == 11 {
                    record.status_label = Some("Holiday".to_string());
                    record.day_type = DayType::Disabled;
                }
                Ok(record)
            }),
        )
        .expect("build with transform");

        assert_eq!(seen, (1..=29).collect::<Vec<_>>());
        let eleventh = grid.day(11).expect("day 11");
        assert_eq!(eleventh.day_type, DayType::Disabled);
        assert_eq!(eleventh.status_label.as_deref(), Some("Holiday"));
        assert_eq!(grid.day(10).and_then(|r| r.status_label.clone()).as_deref(), Some("Start"));
    }

    #[test]
    fn transform_error_aborts_build() {
        let mut calls = 0;
        let result = build_month(
            &feb_2024(SelectionMode::Single),
            Some(|record: DayRecord| {
                calls += 1;
                if record.ordinal == 3 {
                    Err(anyhow!("boom"))
                } else {
                    Ok(record)
                }
            }),
        );

        let err = result.expect_err("transform failure propagates");
        assert!(format!("{err:#}").contains("boom"));
        assert_eq!(calls, 3);
    }

    #[test]
    fn rejects_out_of_range_first_day_of_week() {
        let input = feb_2024(SelectionMode::Single).with_first_day_of_week(7);
        assert!(build_month(&input, None::<NoTransform>).is_err());
    }
}
