use std::fmt::Write as _;

use anyhow::anyhow;
use chrono::NaiveDate;
use chrono::format::{Item, StrftimeItems};
use tracing::{debug, trace, warn};

use crate::classify::DayType;
use crate::day::Day;
use crate::grid::{DayRecord, MonthGrid, MonthInput, Placeholder, build_month};

pub const DEFAULT_TITLE_FORMAT: &str = "%Y/%-m";

/// Rejects strftime strings chrono cannot render.
pub fn validate_title_format(format: &str) -> anyhow::Result<()> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(anyhow!("invalid title format: {format}"));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub top: f64,
    pub height: f64,
}

/// Geometry of one rendered month, supplied by the host.
pub trait MonthMeasure {
    /// The whole month block, title included.
    fn month_rect(&self) -> Rect;
    /// The day grid only.
    fn days_rect(&self) -> Rect;
}

/// A scrollable element that holds rendered months.
pub trait ScrollContainer {
    fn rect(&self) -> Rect;
    fn scroll_top(&self) -> f64;
    fn set_scroll_top(&mut self, value: f64);
}

/// Fixed-size geometry for hosts without a layout engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowMetrics {
    pub top: f64,
    pub title_height: f64,
    pub row_height: f64,
    pub rows: usize,
}

impl MonthMeasure for RowMetrics {
    fn month_rect(&self) -> Rect {
        Rect {
            top: self.top,
            height: self.title_height + self.row_height * self.rows as f64,
        }
    }

    fn days_rect(&self) -> Rect {
        Rect {
            top: self.top + self.title_height,
            height: self.row_height * self.rows as f64,
        }
    }
}

pub enum Rendered<'a> {
    Days(&'a [DayRecord]),
    Placeholders(&'a [Placeholder]),
}

impl Rendered<'_> {
    pub fn len(&self) -> usize {
        match self {
            Self::Days(days) => days.len(),
            Self::Placeholders(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One month as seen by a host: the built grid plus the visibility latch
/// and the title/height/scroll/click capabilities.
#[derive(Debug, Clone)]
pub struct MonthView {
    input: MonthInput,
    grid: MonthGrid,
    title_format: String,
    visible: bool,
}

impl MonthView {
    #[tracing::instrument(skip_all, fields(anchor = %input.anchor))]
    pub fn new<F>(input: MonthInput, transform: Option<F>) -> anyhow::Result<Self>
    where
        F: FnMut(DayRecord) -> anyhow::Result<DayRecord>,
    {
        let grid = build_month(&input, transform)?;
        Ok(Self {
            input,
            grid,
            title_format: DEFAULT_TITLE_FORMAT.to_string(),
            visible: false,
        })
    }

    pub fn with_title_format(mut self, format: impl Into<String>) -> Self {
        self.title_format = format.into();
        self
    }

    /// Rebuilds when `input` differs from the last build or a transform is
    /// supplied; closures cannot be compared, so passing one always counts
    /// as a change. Returns whether a rebuild happened. A failed rebuild
    /// leaves the previous grid in place.
    #[tracing::instrument(skip_all, fields(anchor = %input.anchor))]
    pub fn refresh<F>(&mut self, input: MonthInput, transform: Option<F>) -> anyhow::Result<bool>
    where
        F: FnMut(DayRecord) -> anyhow::Result<DayRecord>,
    {
        if input == self.input && transform.is_none() {
            trace!("month input unchanged; keeping grid");
            return Ok(false);
        }

        let grid = build_month(&input, transform)?;
        debug!("rebuilt month grid");
        self.input = input;
        self.grid = grid;
        Ok(true)
    }

    pub fn input(&self) -> &MonthInput {
        &self.input
    }

    pub fn grid(&self) -> &MonthGrid {
        &self.grid
    }

    /// Falls back to the default format when the configured one cannot be
    /// rendered.
    pub fn title(&self) -> String {
        let Some(first) = NaiveDate::from_ymd_opt(self.grid.year, self.grid.month, 1) else {
            return format!("{}/{}", self.grid.year, self.grid.month);
        };

        let mut title = String::new();
        if write!(title, "{}", first.format(&self.title_format)).is_ok() {
            return title;
        }

        warn!(format = %self.title_format, "title format failed; using default");
        first.format(DEFAULT_TITLE_FORMAT).to_string()
    }

    pub fn height(&self, measure: &dyn MonthMeasure) -> f64 {
        measure.month_rect().height
    }

    /// Once shown, a month stays shown.
    pub fn set_visible(&mut self, visible: bool) {
        if visible {
            if !self.visible {
                debug!(title = %self.title(), "month became visible");
            }
            self.visible = true;
        } else if self.visible {
            warn!(title = %self.title(), "ignoring request to hide a month already shown");
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn should_render(&self) -> bool {
        self.visible || !self.input.lazy_render
    }

    pub fn rendered(&self) -> Rendered<'_> {
        if self.should_render() {
            Rendered::Days(&self.grid.days)
        } else {
            Rendered::Placeholders(&self.grid.placeholders)
        }
    }

    /// Scrolls `container` so this month starts at its top edge. With a
    /// sticky subtitle the day grid is aligned instead of the title.
    pub fn scroll_into_view(
        &self,
        container: &mut dyn ScrollContainer,
        measure: &dyn MonthMeasure,
        show_subtitle: bool,
    ) {
        let target = if show_subtitle {
            measure.days_rect()
        } else {
            measure.month_rect()
        };
        let scroll_top = target.top - container.rect().top + container.scroll_top();
        trace!(scroll_top, "scrolling month into view");
        container.set_scroll_top(scroll_top);
    }

    /// Scrolls to the grid row holding `day`. Days from other months are
    /// ignored.
    pub fn scroll_to_date(
        &self,
        container: &mut dyn ScrollContainer,
        measure: &dyn MonthMeasure,
        day: Day,
    ) {
        if day.year() != self.grid.year || day.month() != self.grid.month {
            debug!(%day, "scroll target outside month; ignoring");
            return;
        }

        let days_rect = measure.days_rect();
        let total_rows = self.grid.placeholders.len().max(1) as f64;
        let current_row = self.grid.row_of(day.ordinal()) as f64;
        let row_offset = (current_row - 1.0) * days_rect.height / total_rows;
        let scroll_top =
            days_rect.top + row_offset + container.scroll_top() - container.rect().top;
        trace!(scroll_top, row = current_row, "scrolling to date");
        container.set_scroll_top(scroll_top);
    }

    /// The record to report upward for a click, if the day is clickable.
    pub fn click(&self, ordinal: u32) -> Option<DayRecord> {
        let record = self.grid.day(ordinal)?;
        if record.day_type == DayType::Disabled {
            debug!(ordinal, "click on disabled day ignored");
            return None;
        }
        debug!(ordinal, day_type = record.day_type.as_key(), "day clicked");
        Some(record.clone())
    }
}
