use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::day::Day;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    #[default]
    Single,
    Multiple,
    Range,
}

impl SelectionMode {
    pub fn all() -> [Self; 3] {
        [Self::Single, Self::Multiple, Self::Range]
    }

    pub fn as_key(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Multiple => "multiple",
            Self::Range => "range",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "single" => Some(Self::Single),
            "multiple" | "multi" => Some(Self::Multiple),
            "range" => Some(Self::Range),
            _ => None,
        }
    }
}

impl std::str::FromStr for SelectionMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s).ok_or_else(|| {
            let known = Self::all().map(Self::as_key).join(", ");
            anyhow!("unknown selection mode '{s}' (expected one of: {known})")
        })
    }
}

/// The current selection, shaped by mode.
///
/// Nothing here checks that a range has `start <= end`; an inverted range is
/// classified as given.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Selection {
    Single {
        day: Option<Day>,
    },
    Multiple {
        days: Vec<Day>,
    },
    Range {
        start: Option<Day>,
        end: Option<Day>,
    },
}

impl Selection {
    pub fn single(day: Day) -> Self {
        Self::Single { day: Some(day) }
    }

    pub fn multiple(days: impl IntoIterator<Item = Day>) -> Self {
        Self::Multiple {
            days: days.into_iter().collect(),
        }
    }

    pub fn range(start: Option<Day>, end: Option<Day>) -> Self {
        Self::Range { start, end }
    }

    pub fn mode(&self) -> SelectionMode {
        match self {
            Self::Single { .. } => SelectionMode::Single,
            Self::Multiple { .. } => SelectionMode::Multiple,
            Self::Range { .. } => SelectionMode::Range,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Single { day } => day.is_none(),
            Self::Multiple { days } => days.is_empty(),
            Self::Range { start, .. } => start.is_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Selection, SelectionMode};
    use crate::day::Day;

    #[test]
    fn mode_keys_round_trip_through_parse() {
        for mode in SelectionMode::all() {
            let parsed: SelectionMode = mode.as_key().parse().expect("known key");
            assert_eq!(parsed, mode);
        }
        assert_eq!(SelectionMode::from_key(" Range "), Some(SelectionMode::Range));
    }

    #[test]
    fn unknown_mode_lists_the_choices() {
        let err = "week"
            .parse::<SelectionMode>()
            .expect_err("week is not a mode");
        assert!(err.to_string().contains("single, multiple, range"));
    }

    #[test]
    fn range_without_start_is_empty() {
        let end = Day::from_ymd(2024, 2, 12);
        assert!(Selection::range(None, end).is_empty());
        assert!(!Selection::range(end, None).is_empty());
        assert_eq!(Selection::multiple([]).mode(), SelectionMode::Multiple);
    }
}
