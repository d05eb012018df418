use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::day::{Bounds, Day};
use crate::selection::{Selection, SelectionMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DayType {
    #[default]
    #[serde(rename = "")]
    Empty,
    Disabled,
    Selected,
    Start,
    End,
    StartEnd,
    Middle,
    MultipleSelected,
    MultipleMiddle,
    Placeholder,
}

impl DayType {
    pub fn as_key(self) -> &'static str {
        match self {
            Self::Empty => "",
            Self::Disabled => "disabled",
            Self::Selected => "selected",
            Self::Start => "start",
            Self::End => "end",
            Self::StartEnd => "start-end",
            Self::Middle => "middle",
            Self::MultipleSelected => "multiple-selected",
            Self::MultipleMiddle => "multiple-middle",
            Self::Placeholder => "placeholder",
        }
    }

    pub fn is_empty(self) -> bool {
        self == Self::Empty
    }
}

pub fn classify_single(day: Day, selected: Option<Day>) -> DayType {
    match selected {
        Some(selected) if selected == day => DayType::Selected,
        _ => DayType::Empty,
    }
}

/// Shapes runs of consecutive selected days. A day whose following day is
/// also selected is tagged `Start`, one whose preceding day is selected is
/// tagged `End`.
pub fn classify_multiple(day: Day, is_selected: impl Fn(Day) -> bool) -> DayType {
    if !is_selected(day) {
        return DayType::Empty;
    }

    let prev_selected = day.pred().is_some_and(&is_selected);
    let next_selected = day.succ().is_some_and(&is_selected);

    match (prev_selected, next_selected) {
        (true, true) => DayType::MultipleMiddle,
        (true, false) => DayType::End,
        (false, true) => DayType::Start,
        (false, false) => DayType::MultipleSelected,
    }
}

/// `start-end` is checked before the plain endpoints so a zero-length range
/// can render as one cell. An inverted range never yields `Middle`.
pub fn classify_range(
    day: Day,
    start: Option<Day>,
    end: Option<Day>,
    allow_same_day: bool,
) -> DayType {
    let Some(start) = start else {
        return DayType::Empty;
    };

    let Some(end) = end else {
        return if day == start {
            DayType::Start
        } else {
            DayType::Empty
        };
    };

    let cs = day.compare(start);
    let ce = day.compare(end);

    if allow_same_day && cs.is_eq() && ce.is_eq() {
        DayType::StartEnd
    } else if cs.is_eq() {
        DayType::Start
    } else if ce.is_eq() {
        DayType::End
    } else if cs.is_gt() && ce.is_lt() {
        DayType::Middle
    } else {
        DayType::Empty
    }
}

/// Localized words shown under range endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusLabels {
    pub start: String,
    pub end: String,
    pub start_end: String,
}

impl Default for StatusLabels {
    fn default() -> Self {
        Self {
            start: "Start".to_string(),
            end: "End".to_string(),
            start_end: "Start/End".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DayClassifier<'a> {
    mode: SelectionMode,
    bounds: Bounds,
    selection: Option<&'a Selection>,
    allow_same_day: bool,
    labels: &'a StatusLabels,
    multiple: BTreeSet<Day>,
}

impl<'a> DayClassifier<'a> {
    pub fn new(
        mode: SelectionMode,
        bounds: Bounds,
        selection: Option<&'a Selection>,
        allow_same_day: bool,
        labels: &'a StatusLabels,
    ) -> Self {
        let multiple = match selection {
            Some(Selection::Multiple { days }) => days.iter().copied().collect(),
            _ => BTreeSet::new(),
        };

        Self {
            mode,
            bounds,
            selection,
            allow_same_day,
            labels,
            multiple,
        }
    }

    pub fn classify(&self, day: Day) -> DayType {
        if self.bounds.is_out_of_bounds(day) {
            return DayType::Disabled;
        }

        let Some(selection) = self.selection else {
            return DayType::Empty;
        };

        match (self.mode, selection) {
            (SelectionMode::Multiple, Selection::Multiple { .. }) => {
                classify_multiple(day, |d| self.multiple.contains(&d))
            }
            (SelectionMode::Range, Selection::Range { start, end }) => {
                classify_range(day, *start, *end, self.allow_same_day)
            }
            (SelectionMode::Single, Selection::Single { day: selected }) => {
                classify_single(day, *selected)
            }
            _ => DayType::Empty,
        }
    }

    /// Only range mode carries labels.
    pub fn status_label(&self, day_type: DayType) -> Option<String> {
        if self.mode != SelectionMode::Range {
            return None;
        }

        match day_type {
            DayType::Start => Some(self.labels.start.clone()),
            DayType::End => Some(self.labels.end.clone()),
            DayType::StartEnd => Some(self.labels.start_end.clone()),
            _ => None,
        }
    }
}
