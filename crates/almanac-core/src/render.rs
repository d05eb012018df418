use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::classify::DayType;
use crate::config::Settings;
use crate::grid::DayRecord;
use crate::month::{MonthView, Rendered};

const WEEKDAY_LABELS: [&str; 7] = ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"];
const CELL_WIDTH: usize = 4;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    first_day_of_week: u32,
}

impl Renderer {
    pub fn new(settings: &Settings) -> Self {
        Self {
            color: settings.color && io::stdout().is_terminal(),
            first_day_of_week: settings.first_day_of_week,
        }
    }

    pub fn plain(first_day_of_week: u32) -> Self {
        Self {
            color: false,
            first_day_of_week,
        }
    }

    #[tracing::instrument(skip_all)]
    pub fn write_month<W: Write>(&self, mut out: W, view: &MonthView) -> anyhow::Result<()> {
        let grid = view.grid();
        writeln!(out, "{}", view.title())?;

        for idx in 0..7 {
            let label = WEEKDAY_LABELS[(idx + self.first_day_of_week as usize) % 7];
            write!(out, "{label:>width$}", width = CELL_WIDTH)?;
        }
        writeln!(out)?;

        match view.rendered() {
            Rendered::Placeholders(rows) => {
                for placeholder in rows {
                    let cell = self.paint(" ...", type_color(placeholder.day_type));
                    writeln!(out, "{}", cell.repeat(7))?;
                }
            }
            Rendered::Days(days) => {
                let offset = grid.layout.weekday_offset as usize;
                write!(out, "{}", " ".repeat(offset * CELL_WIDTH))?;
                for (idx, record) in days.iter().enumerate() {
                    write!(out, "{}", self.cell(record))?;
                    if (offset + idx + 1) % 7 == 0 {
                        writeln!(out)?;
                    }
                }
                if (offset + days.len()) % 7 != 0 {
                    writeln!(out)?;
                }

                let rows = days
                    .iter()
                    .filter(|r| !matches!(r.day_type, DayType::Empty | DayType::Disabled))
                    .map(|r| {
                        vec![
                            r.date.to_string(),
                            self.paint(r.day_type.as_key(), type_color(r.day_type)),
                            r.status_label.clone().unwrap_or_default(),
                        ]
                    })
                    .collect::<Vec<_>>();
                if !rows.is_empty() {
                    writeln!(out)?;
                    write_table(
                        &mut out,
                        vec!["Date".to_string(), "Type".to_string(), "Label".to_string()],
                        rows,
                    )?;
                }
            }
        }

        Ok(())
    }

    #[tracing::instrument(skip_all)]
    pub fn write_json<W: Write>(&self, mut out: W, view: &MonthView) -> anyhow::Result<()> {
        let value = serde_json::json!({
            "title": view.title(),
            "visible": view.is_visible(),
            "should_render": view.should_render(),
            "grid": view.grid(),
        });
        serde_json::to_writer_pretty(&mut out, &value)?;
        writeln!(out)?;
        Ok(())
    }

    pub fn write_click<W: Write>(
        &self,
        mut out: W,
        record: Option<&DayRecord>,
    ) -> anyhow::Result<()> {
        match record {
            Some(record) => {
                serde_json::to_writer_pretty(&mut out, record)?;
                writeln!(out)?;
            }
            None => writeln!(out, "no click reported")?,
        }
        Ok(())
    }

    fn cell(&self, record: &DayRecord) -> String {
        let n = record.ordinal;
        let text = match record.day_type {
            DayType::Empty => format!(" {n:>2} "),
            DayType::Disabled if !self.color => " -- ".to_string(),
            DayType::Disabled => format!(" {n:>2} "),
            DayType::Selected | DayType::MultipleSelected | DayType::StartEnd => {
                format!("[{n:>2}]")
            }
            DayType::Start => format!("[{n:>2} "),
            DayType::End => format!(" {n:>2}]"),
            DayType::Middle | DayType::MultipleMiddle => format!("={n:>2}="),
            DayType::Placeholder => " ...".to_string(),
        };
        self.paint(&text, type_color(record.day_type))
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || code.is_empty() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn type_color(day_type: DayType) -> &'static str {
    match day_type {
        DayType::Empty => "",
        DayType::Disabled | DayType::Placeholder => "2",
        DayType::Selected | DayType::MultipleSelected | DayType::StartEnd => "1;37;41",
        DayType::Start | DayType::End => "1;31",
        DayType::Middle | DayType::MultipleMiddle => "31",
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
