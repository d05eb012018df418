use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::classify::StatusLabels;
use crate::datetime::parse_day_expr;
use crate::day::{
  Bounds,
  Day
};
use crate::month::{
  DEFAULT_TITLE_FORMAT,
  validate_title_format
};
use crate::selection::SelectionMode;

const RC_ENV_VAR: &str = "ALMANACRC";
const RC_FILE_NAME: &str =
  ".almanacrc";

#[derive(Debug, Clone)]
pub struct Config {
  map:              HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Config {
  /// Built-in defaults with no file
  /// loaded.
  pub fn defaults() -> Self {
    let mut cfg = Config {
      map:          HashMap::new(),
      loaded_files: vec![]
    };

    for (key, value) in [
      ("mode", "single"),
      ("first_day_of_week", "0"),
      ("allow_same_day", "off"),
      ("lazy_render", "on"),
      ("color", "on"),
      ("title.format", DEFAULT_TITLE_FORMAT),
      ("row_height", "64"),
      ("title_height", "44")
    ] {
      cfg.map.insert(
        key.to_string(),
        value.to_string()
      );
    }

    cfg
  }

  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Self::defaults();

    let rc =
      resolve_rc_path(rc_override)?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading almanacrc");
      cfg.load_file(&path, &mut vec![])?;
    } else {
      debug!(
        "no almanacrc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> anyhow::Result<Option<bool>> {
    self
      .map
      .get(key)
      .map(|v| {
        parse_bool(v).ok_or_else(|| {
          anyhow!(
            "invalid boolean for \
             {key}: {v}"
          )
        })
      })
      .transpose()
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&String, &String)>
  {
    self.map.iter()
  }

  /// `including` holds the canonical
  /// paths of the files currently being
  /// read, outermost first.
  #[tracing::instrument(skip(
    self, including
  ))]
  fn load_file(
    &mut self,
    path: &Path,
    including: &mut Vec<PathBuf>
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    let canonical =
      fs::canonicalize(&path)
        .unwrap_or_else(|_| path.clone());
    if including.contains(&canonical) {
      let chain = including
        .iter()
        .chain(std::iter::once(
          &canonical
        ))
        .map(|p| {
          p.display().to_string()
        })
        .collect::<Vec<_>>()
        .join(" -> ");
      return Err(anyhow!(
        "include cycle: {chain}"
      ));
    }
    including.push(canonical);

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if line.is_empty()
        || line.starts_with('#')
      {
        continue;
      }

      if let Some((before, _)) =
        line.split_once('#')
      {
        line = before.trim();
      }

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self.load_file(
            &include_path,
            including
          )?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    including.pop();
    Ok(())
  }
}

/// Typed view of the string map.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
  pub mode:              SelectionMode,
  pub first_day_of_week: u32,
  pub allow_same_day:    bool,
  pub lazy_render:       bool,
  pub bounds:            Bounds,
  pub labels:            StatusLabels,
  pub title_format:      String,
  pub color:             bool,
  pub row_height:        f64,
  pub title_height:      f64
}

impl Settings {
  #[tracing::instrument(skip(cfg))]
  pub fn from_config(
    cfg: &Config,
    today: Day
  ) -> anyhow::Result<Self> {
    let mode = cfg
      .get("mode")
      .map(|raw| {
        raw.parse::<SelectionMode>()
      })
      .transpose()?
      .unwrap_or_default();

    let first_day_of_week = cfg
      .get("first_day_of_week")
      .map(|raw| {
        parse_first_day_of_week(&raw)
      })
      .transpose()?
      .unwrap_or(0);

    let defaults =
      Bounds::from_today(today);
    let min = cfg
      .get("min_date")
      .map(|raw| {
        parse_day_expr(&raw, today)
          .context("invalid min_date")
      })
      .transpose()?
      .unwrap_or(defaults.min);
    let max = cfg
      .get("max_date")
      .map(|raw| {
        parse_day_expr(&raw, today)
          .context("invalid max_date")
      })
      .transpose()?
      .unwrap_or(defaults.max);
    if min > max {
      warn!(
        %min,
        %max,
        "min_date is after max_date; \
         every day will be disabled"
      );
    }

    let title_format = cfg
      .get("title.format")
      .unwrap_or_else(|| {
        DEFAULT_TITLE_FORMAT.to_string()
      });
    validate_title_format(
      &title_format
    )
    .context("invalid title.format")?;

    let fallback =
      StatusLabels::default();
    let labels = StatusLabels {
      start:     cfg
        .get("label.start")
        .unwrap_or(fallback.start),
      end:       cfg
        .get("label.end")
        .unwrap_or(fallback.end),
      start_end: cfg
        .get("label.start_end")
        .unwrap_or(fallback.start_end)
    };

    Ok(Self {
      mode,
      first_day_of_week,
      allow_same_day: cfg
        .get_bool("allow_same_day")?
        .unwrap_or(false),
      lazy_render: cfg
        .get_bool("lazy_render")?
        .unwrap_or(true),
      bounds: Bounds::new(min, max),
      labels,
      title_format,
      color: cfg
        .get_bool("color")?
        .unwrap_or(true),
      row_height: parse_length(
        cfg,
        "row_height",
        64.0
      )?,
      title_height: parse_length(
        cfg,
        "title_height",
        44.0
      )?
    })
  }
}

/// Accepts 0-6 or a weekday name.
pub fn parse_first_day_of_week(
  raw: &str
) -> anyhow::Result<u32> {
  let trimmed =
    raw.trim().to_ascii_lowercase();
  let value = match trimmed.as_str() {
    | "sunday" | "sun" => 0,
    | "monday" | "mon" => 1,
    | "tuesday" | "tue" => 2,
    | "wednesday" | "wed" => 3,
    | "thursday" | "thu" => 4,
    | "friday" | "fri" => 5,
    | "saturday" | "sat" => 6,
    | other => {
      other.parse::<u32>().with_context(
        || {
          format!(
            "invalid first_day_of_week: \
             {raw}"
          )
        }
      )?
    }
  };

  if value > 6 {
    return Err(anyhow!(
      "first_day_of_week must be \
       0-6 (0 = Sunday), got {value}"
    ));
  }
  Ok(value)
}

fn parse_length(
  cfg: &Config,
  key: &str,
  default: f64
) -> anyhow::Result<f64> {
  let Some(raw) = cfg.get(key) else {
    return Ok(default);
  };
  let value =
    raw.trim().parse::<f64>().with_context(
      || format!("invalid {key}: {raw}")
    )?;
  if !value.is_finite() || value < 0.0 {
    return Err(anyhow!(
      "{key} must be a non-negative \
       number, got {raw}"
    ));
  }
  Ok(value)
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var(RC_ENV_VAR)
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping \
       almanacrc"
    );
    return Ok(None);
  };
  let candidate = home.join(RC_FILE_NAME);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> Option<bool> {
  match s
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "1" | "y" | "yes" | "on"
    | "true" => Some(true),
    | "0" | "n" | "no" | "off"
    | "false" => Some(false),
    | _ => None
  }
}

#[cfg(test)]
mod tests {
  use std::fs;

  use tempfile::tempdir;

  use super::{
    Config,
    Settings,
    parse_first_day_of_week
  };
  use crate::day::Day;
  use crate::selection::SelectionMode;

  fn today() -> Day {
    Day::from_ymd(2024, 2, 1)
      .expect("valid today")
  }

  #[test]
  fn defaults_produce_single_mode_settings()
   {
    let settings = Settings::from_config(
      &Config::defaults(),
      today()
    )
    .expect("default settings");
    assert_eq!(
      settings.mode,
      SelectionMode::Single
    );
    assert!(settings.lazy_render);
    assert!(!settings.allow_same_day);
    assert_eq!(
      settings.bounds.max.to_string(),
      "2024-08-01"
    );
    assert_eq!(
      settings.labels.start_end,
      "Start/End"
    );
  }

  #[test]
  fn loads_file_with_include_and_overrides()
   {
    let dir =
      tempdir().expect("tempdir");
    let labels = dir.path().join("labels.rc");
    fs::write(
      &labels,
      "label.start = Check-in\nlabel.end = Check-out\n"
    )
    .expect("write labels");
    let rc = dir.path().join("almanacrc");
    fs::write(
      &rc,
      "# stay planner\nmode = range\nallow_same_day = yes # inline\ninclude labels.rc\nfirst_day_of_week = monday\n"
    )
    .expect("write rc");

    let mut cfg = Config::load(Some(rc.as_path()))
      .expect("load rc");
    assert_eq!(cfg.loaded_files.len(), 2);
    cfg.apply_overrides([(
      "rc.min_date".to_string(),
      "2024-02-05".to_string()
    )]);

    let settings =
      Settings::from_config(&cfg, today())
        .expect("settings");
    assert_eq!(
      settings.mode,
      SelectionMode::Range
    );
    assert!(settings.allow_same_day);
    assert_eq!(
      settings.first_day_of_week,
      1
    );
    assert_eq!(
      settings.labels.start,
      "Check-in"
    );
    assert_eq!(
      settings.labels.end,
      "Check-out"
    );
    assert_eq!(
      settings.bounds.min.to_string(),
      "2024-02-05"
    );
  }

  #[test]
  fn rejects_bad_values() {
    let mut cfg = Config::defaults();
    cfg.apply_overrides([(
      "mode".to_string(),
      "week".to_string()
    )]);
    assert!(
      Settings::from_config(&cfg, today())
        .is_err()
    );

    let mut cfg = Config::defaults();
    cfg.apply_overrides([(
      "lazy_render".to_string(),
      "sometimes".to_string()
    )]);
    assert!(
      Settings::from_config(&cfg, today())
        .is_err()
    );

    assert!(
      parse_first_day_of_week("7")
        .is_err()
    );
    assert_eq!(
      parse_first_day_of_week("Sat")
        .expect("weekday name"),
      6
    );
  }

  #[test]
  fn rejects_self_include() {
    let dir =
      tempdir().expect("tempdir");
    let rc = dir.path().join("a.rc");
    fs::write(&rc, "include a.rc\n")
      .expect("write rc");
    let err = Config::load(Some(rc.as_path()))
      .expect_err("self include");
    assert!(
      err
        .to_string()
        .contains("include cycle")
    );
  }

  #[test]
  fn rejects_mutual_include_but_allows_repeats()
   {
    let dir =
      tempdir().expect("tempdir");
    let a = dir.path().join("a.rc");
    let b = dir.path().join("b.rc");
    fs::write(&a, "mode = range\ninclude b.rc\n")
      .expect("write a");
    fs::write(&b, "include a.rc\n")
      .expect("write b");
    let err = Config::load(Some(a.as_path()))
      .expect_err("mutual include");
    assert!(
      err
        .to_string()
        .contains("include cycle")
    );

    let shared = dir.path().join("shared.rc");
    let top = dir.path().join("top.rc");
    fs::write(&shared, "color = off\n")
      .expect("write shared");
    fs::write(
      &top,
      "include shared.rc\ninclude shared.rc\n"
    )
    .expect("write top");
    let cfg = Config::load(Some(top.as_path()))
      .expect("repeated include is fine");
    assert_eq!(cfg.loaded_files.len(), 3);
  }

  #[test]
  fn rejects_unrenderable_title_format() {
    let mut cfg = Config::defaults();
    cfg.apply_overrides([(
      "rc.title.format".to_string(),
      "%Q".to_string()
    )]);
    let err =
      Settings::from_config(&cfg, today())
        .expect_err("bad title format");
    assert!(
      format!("{err:#}")
        .contains("title.format")
    );
  }

  #[test]
  fn rejects_line_without_equals() {
    let dir =
      tempdir().expect("tempdir");
    let rc = dir.path().join("almanacrc");
    fs::write(&rc, "mode range\n")
      .expect("write rc");
    let err = Config::load(Some(rc.as_path()))
      .expect_err("malformed line");
    assert!(
      err
        .to_string()
        .contains("invalid config line")
    );
  }
}
