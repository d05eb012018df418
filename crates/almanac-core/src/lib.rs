pub mod classify;
pub mod cli;
pub mod config;
pub mod datetime;
pub mod day;
pub mod grid;
pub mod month;
pub mod render;
pub mod selection;

use std::ffi::OsString;
use std::io::{self, Write};

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info,
  trace,
  warn
};

pub use classify::{
  DayClassifier,
  DayType,
  StatusLabels
};
pub use day::{
  Bounds,
  Day
};
pub use grid::{
  DayRecord,
  GridLayout,
  MonthGrid,
  MonthInput,
  NoTransform,
  Placeholder,
  build_month
};
pub use month::{
  MonthMeasure,
  MonthView,
  Rect,
  Rendered,
  RowMetrics,
  ScrollContainer
};
pub use selection::{
  Selection,
  SelectionMode
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting almanac"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.almanacrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre
      .rc_overrides
      .into_iter()
      .chain(
        cli.rc_overrides.iter().map(
          |kv| {
            (
              kv.key.clone(),
              kv.value.clone()
            )
          }
        )
      )
      .chain(flag_overrides(&cli))
  );
  for (key, value) in cfg.iter() {
    trace!(%key, %value, "effective config");
  }

  let today = datetime::today();
  let settings =
    config::Settings::from_config(
      &cfg, today
    )
    .context("invalid configuration")?;
  let anchor = datetime::parse_day_expr(
    &cli.month, today
  )
  .context("invalid --month")?;
  let selection =
    selection_from_cli(
      &cli,
      settings.mode,
      today
    )?;

  let mut input = MonthInput::new(
    anchor,
    settings.bounds,
    settings.mode
  )
  .with_allow_same_day(
    settings.allow_same_day
  )
  .with_first_day_of_week(
    settings.first_day_of_week
  )
  .with_labels(settings.labels.clone())
  .with_lazy_render(
    settings.lazy_render
  );
  input.selection = selection;

  let mut view = MonthView::new(
    input,
    None::<NoTransform>
  )?
  .with_title_format(
    settings.title_format.clone()
  );
  if !cli.hidden {
    view.set_visible(true);
  }

  let metrics = RowMetrics {
    top:          0.0,
    title_height: settings.title_height,
    row_height:   settings.row_height,
    rows:         view
      .grid()
      .layout
      .placeholder_row_count
  };
  debug!(
    title = %view.title(),
    height = view.height(&metrics),
    "month ready"
  );

  let renderer =
    render::Renderer::new(&settings);
  let mut out = io::stdout().lock();
  match cli.click {
    | Some(ordinal) => {
      let record = view.click(ordinal);
      renderer
        .write_click(&mut out, record.as_ref())?;
    }
    | None => {
      match cli.format {
        | cli::OutputFormat::Text => {
          renderer
            .write_month(&mut out, &view)?
        }
        | cli::OutputFormat::Json => {
          renderer
            .write_json(&mut out, &view)?
        }
      }
    }
  }
  out.flush()?;

  info!("done");
  Ok(())
}

/// Command-line flags win over every
/// config source.
pub(crate) fn flag_overrides(
  cli: &cli::GlobalCli
) -> Vec<(String, String)> {
  let mut overrides = Vec::new();
  let mut push =
    |key: &str, value: String| {
      overrides
        .push((key.to_string(), value))
    };

  if let Some(mode) = &cli.mode {
    push("mode", mode.clone());
  }
  if let Some(first) =
    &cli.first_day_of_week
  {
    push(
      "first_day_of_week",
      first.clone()
    );
  }
  if let Some(min) = &cli.min {
    push("min_date", min.clone());
  }
  if let Some(max) = &cli.max {
    push("max_date", max.clone());
  }
  if cli.allow_same_day {
    push(
      "allow_same_day",
      "on".to_string()
    );
  }
  if cli.lazy {
    push(
      "lazy_render",
      "on".to_string()
    );
  } else if cli.no_lazy {
    push(
      "lazy_render",
      "off".to_string()
    );
  }

  overrides
}

fn selection_from_cli(
  cli: &cli::GlobalCli,
  mode: SelectionMode,
  today: Day
) -> anyhow::Result<Option<Selection>> {
  let parse = |raw: &String| {
    datetime::parse_day_expr(raw, today)
      .with_context(|| {
        format!(
          "invalid selected date: {raw}"
        )
      })
  };

  let selected = cli
    .select
    .iter()
    .map(parse)
    .collect::<anyhow::Result<Vec<_>>>()?;
  let start =
    cli.start.as_ref().map(parse).transpose()?;
  let end =
    cli.end.as_ref().map(parse).transpose()?;

  if mode != SelectionMode::Range
    && (start.is_some()
      || end.is_some())
  {
    warn!(
      mode = mode.as_key(),
      "--start/--end only apply to \
       range mode; ignoring"
    );
  }

  let selection = match mode {
    | SelectionMode::Single => {
      if selected.len() > 1 {
        warn!(
          count = selected.len(),
          "single mode takes one \
           --select; using the first"
        );
      }
      selected
        .first()
        .copied()
        .map(Selection::single)
    }
    | SelectionMode::Multiple => {
      (!selected.is_empty()).then(|| {
        Selection::multiple(selected)
      })
    }
    | SelectionMode::Range => {
      if !selected.is_empty() {
        warn!(
          "--select does not apply to \
           range mode; use \
           --start/--end"
        );
      }
      (start.is_some() || end.is_some())
        .then(|| {
          Selection::range(start, end)
        })
    }
  };

  Ok(selection)
}

#[cfg(test)]
mod tests {
  use std::ffi::OsString;

  use clap::Parser;

  use super::flag_overrides;
  use crate::cli::GlobalCli;

  fn overrides_for(
    raw: &[&str]
  ) -> Vec<(String, String)> {
    let args = raw
      .iter()
      .map(OsString::from)
      .collect::<Vec<_>>();
    flag_overrides(
      &GlobalCli::parse_from(args)
    )
  }

  #[test]
  fn no_lazy_turns_lazy_render_off() {
    assert_eq!(
      overrides_for(&[
        "almanac",
        "--no-lazy"
      ]),
      vec![(
        "lazy_render".to_string(),
        "off".to_string()
      )]
    );
    assert!(
      overrides_for(&["almanac"])
        .is_empty()
    );
  }
}
