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

use crate::task::Priority;

const RC_ENV_VAR: &str = "ZENTASKRC";
const RC_FILE_NAME: &str = ".zentaskrc";
const DATA_DIR_NAME: &str = ".zentask";

#[derive(Debug, Clone)]
pub struct Config {
  map:              HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Config {
  /// Built-in defaults only, no
  /// file lookup.
  pub fn empty() -> Self {
    let mut cfg = Config {
      map:          HashMap::new(),
      loaded_files: vec![]
    };

    for (key, value) in [
      ("data.location", "~/.zentask"),
      ("default.command", "list"),
      ("default.priority", "medium"),
      ("color", "on"),
      ("sync.auto", "off")
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
    let mut cfg = Config::empty();

    let rc = resolve_rc_path(
      rc_override
    )?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading zentaskrc");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no zentaskrc found; using \
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
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  pub fn default_priority(
    &self
  ) -> anyhow::Result<Priority> {
    match self.get("default.priority")
    {
      | Some(raw) => {
        raw.parse::<Priority>().with_context(|| {
          "invalid default.priority"
            .to_string()
        })
      }
      | None => Ok(Priority::default())
    }
  }

  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    self.load_file_nested(
      path,
      &mut Vec::new()
    )
  }

  /// `chain` holds the canonical
  /// paths of the files currently
  /// being read, outermost first.
  #[tracing::instrument(skip(
    self, chain
  ))]
  fn load_file_nested(
    &mut self,
    path: &Path,
    chain: &mut Vec<PathBuf>
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
        .unwrap_or_else(|_| {
          path.clone()
        });
    if chain.contains(&canonical) {
      let cycle = chain
        .iter()
        .chain([&canonical])
        .map(|p| {
          p.display().to_string()
        })
        .collect::<Vec<_>>()
        .join(" -> ");
      return Err(anyhow!(
        "include cycle: {cycle}"
      ));
    }

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

      // URLs carry '#', so only a
      // '#' after whitespace starts a
      // trailing comment.
      if let Some(idx) = line.find(" #")
      {
        line = line[..idx].trim();
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
          chain.push(canonical.clone());
          let loaded = self
            .load_file_nested(
              &include_path,
              chain
            );
          chain.pop();
          loaded?;
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

    Ok(())
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.get("data.location")
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    default_data_dir()?
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
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
       zentaskrc lookup"
    );
    return Ok(None);
  };
  let candidate =
    home.join(RC_FILE_NAME);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home.join(DATA_DIR_NAME))
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

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}

#[cfg(test)]
mod tests {
  use std::fs;

  use tempfile::tempdir;

  use super::{
    Config,
    resolve_data_dir
  };
  use crate::task::Priority;

  #[test]
  fn defaults_are_present() {
    let cfg = Config::empty();
    assert_eq!(
      cfg.get("default.command")
        .as_deref(),
      Some("list")
    );
    assert_eq!(
      cfg.get_bool("sync.auto"),
      Some(false)
    );
    assert_eq!(
      cfg
        .default_priority()
        .expect("priority"),
      Priority::Medium
    );
  }

  #[test]
  fn loads_file_with_comments_and_includes()
  {
    let temp =
      tempdir().expect("tempdir");
    let extra =
      temp.path().join("extra.rc");
    fs::write(
      &extra,
      "default.priority = high\n"
    )
    .expect("write include");

    let rc = temp.path().join("main.rc");
    fs::write(
      &rc,
      "# zentask settings\n\
       sync.auto = yes # always push\n\
       calendar.embed = https://example.com/embed?src=a%23b#frag\n\
       include extra.rc\n\
       include missing.rc\n"
    )
    .expect("write rc");

    let cfg = Config::load(Some(&rc))
      .expect("load config");
    assert_eq!(
      cfg.get_bool("sync.auto"),
      Some(true)
    );
    assert_eq!(
      cfg.get("calendar.embed")
        .as_deref(),
      Some(
        "https://example.com/embed?src=a%23b#frag"
      )
    );
    assert_eq!(
      cfg
        .default_priority()
        .expect("priority"),
      Priority::High
    );
    assert_eq!(cfg.loaded_files.len(), 2);
  }

  #[test]
  fn self_include_is_a_cycle_error() {
    let temp =
      tempdir().expect("tempdir");
    let rc = temp.path().join("a.rc");
    fs::write(&rc, "include a.rc\n")
      .expect("write rc");

    let err = Config::load(Some(&rc))
      .expect_err("cycle");
    assert!(
      format!("{err:#}")
        .contains("include cycle")
    );
  }

  #[test]
  fn include_chain_cycle_is_an_error()
  {
    let temp =
      tempdir().expect("tempdir");
    let a = temp.path().join("a.rc");
    let b = temp.path().join("b.rc");
    fs::write(
      &a,
      "color = off\ninclude b.rc\n"
    )
    .expect("write a");
    fs::write(
      &b,
      "include ./a.rc\n"
    )
    .expect("write b");

    assert!(
      Config::load(Some(&a)).is_err()
    );
  }

  #[test]
  fn same_file_may_be_included_twice()
  {
    let temp =
      tempdir().expect("tempdir");
    fs::write(
      temp.path().join("shared.rc"),
      "sync.auto = on\n"
    )
    .expect("write shared");
    let rc = temp.path().join("main.rc");
    fs::write(
      &rc,
      "include shared.rc\n\
       include shared.rc\n"
    )
    .expect("write rc");

    let cfg = Config::load(Some(&rc))
      .expect("load config");
    assert_eq!(
      cfg.get_bool("sync.auto"),
      Some(true)
    );
    assert_eq!(cfg.loaded_files.len(), 3);
  }

  #[test]
  fn rejects_lines_without_equals() {
    let temp =
      tempdir().expect("tempdir");
    let rc = temp.path().join("bad.rc");
    fs::write(&rc, "just words\n")
      .expect("write rc");
    assert!(
      Config::load(Some(&rc)).is_err()
    );
  }

  #[test]
  fn overrides_strip_rc_prefix() {
    let mut cfg = Config::empty();
    cfg.apply_overrides([
      (
        "rc.color".to_string(),
        "off".to_string()
      ),
      (
        "default.priority".to_string(),
        "soon".to_string()
      )
    ]);
    assert_eq!(
      cfg.get_bool("color"),
      Some(false)
    );
    assert!(
      cfg.default_priority().is_err()
    );
  }

  #[test]
  fn data_dir_override_is_created() {
    let temp =
      tempdir().expect("tempdir");
    let target =
      temp.path().join("nested/data");
    let dir = resolve_data_dir(
      &Config::empty(),
      Some(&target)
    )
    .expect("resolve");
    assert_eq!(dir, target);
    assert!(target.is_dir());
  }
}
