
use anyhow::{Context as _, Result};
use rebook_core::config::RebookConfig;
use rebook_core::db;
use serde::Serialize;

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Debug, Serialize)]
struct InitSummary {
    staging: String,
    output: String,
    schema_version: u32,
}

/// Execute `rebook init`: create the staging tables in the source database
/// and migrate the output database. Both steps are idempotent.
///
/// # Errors
///
/// Returns an error if either database cannot be created or migrated.
pub fn run_init(config: &RebookConfig, output: OutputMode) -> Result<()> {
    db::init_staging(&config.source.path).with_context(|| {
        format!(
            "Failed to initialize staging store {}",
            config.source.path.display()
        )
    })?;

    let conn = db::open_output(&config.output.path).with_context(|| {
        format!(
            "Failed to initialize output database {}",
            config.output.path.display()
        )
    })?;
    let schema_version = db::migrations::current_schema_version(&conn)?;

    let summary = InitSummary {
        staging: config.source.path.display().to_string(),
        output: config.output.path.display().to_string(),
        schema_version,
    };

    render_mode(
        output,
        &summary,
        |s, w| {
            writeln!(w, "staging={}", s.staging)?;
            writeln!(w, "output={}", s.output)?;
            writeln!(w, "schema_version={}", s.schema_version)
        },
        |s, w| {
            pretty_section(w, "Initialized")?;
            pretty_kv(w, "staging", &s.staging)?;
            pretty_kv(w, "output", &s.output)?;
            pretty_kv(w, "schema", format!("v{}", s.schema_version))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_creates_both_databases_and_is_repeatable() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut config = RebookConfig::default();
        config.source.path = dir.path().join("staging.sqlite3");
        config.output.path = dir.path().join("out").join("rebook.sqlite3");

        run_init(&config, OutputMode::Json).expect("first init");
        run_init(&config, OutputMode::Json).expect("second init");

        assert!(config.source.path.exists());
        assert!(config.output.path.exists());
    }
}
