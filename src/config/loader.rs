// Configuration loader
// Layers defaults, ~/.mindcare/config.toml (or an explicit path) and
// MINDCARE__* environment variables

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use super::settings::Config;

const ENV_PREFIX: &str = "MINDCARE";

/// Default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".mindcare/config.toml"))
}

/// Load configuration
///
/// An explicit path must exist; the default path is optional.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut builder = config::Config::builder();

    match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            builder = builder.add_source(
                config::File::new(&path.to_string_lossy(), config::FileFormat::Toml)
                    .required(true),
            );
        }
        None => {
            if let Some(default_path) = default_config_path() {
                builder = builder.add_source(
                    config::File::new(&default_path.to_string_lossy(), config::FileFormat::Toml)
                        .required(false),
                );
            }
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__"),
    );

    let mut config: Config = builder
        .build()
        .context("Failed to read configuration sources")?
        .try_deserialize()
        .context("Failed to parse configuration")?;

    apply_legacy_env(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Honour the flat variables older deployments set, when the layered value is absent
pub fn apply_legacy_env(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if config.generative.api_key.is_none() {
        config.generative.api_key = non_empty("GEMINI_API_KEY");
    }
    if config.notifications.admin_email.is_none() {
        config.notifications.admin_email = non_empty("ADMIN_EMAIL");
    }
    if config.notifications.default_responder_email.is_none() {
        config.notifications.default_responder_email = non_empty("DEFAULT_COUNSELOR_EMAIL");
    }
}

/// Write a default config file, refusing to overwrite unless `force`
pub fn write_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let body = toml::to_string_pretty(&Config::default())
        .context("Failed to serialize default config")?;
    let contents = format!(
        "# MindCare configuration\n\
         # Every value can also be set through MINDCARE__<SECTION>__<KEY> variables,\n\
         # e.g. MINDCARE__GENERATIVE__API_KEY.\n\n{}",
        body
    );

    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
