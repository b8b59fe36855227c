//! docsearch config - Show the effective configuration

use clap::Args;
use serde_json::Value;

use crate::app::AppContext;
use crate::cli::output;
use crate::config::Config;
use crate::error::{DocsError, Result};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Dotted key to print (e.g. `ranking.match_threshold`)
    pub key: Option<String>,

    /// Print the config file search order instead
    #[arg(long)]
    pub paths: bool,
}

pub fn run(ctx: &AppContext, args: &ConfigArgs) -> Result<()> {
    if args.paths {
        return emit_paths(ctx);
    }

    let value = redacted(&ctx.config)?;
    match &args.key {
        Some(key) => emit_key(ctx, &value, key),
        None if ctx.json => output::emit_json(&value),
        None => {
            let config: Config = serde_json::from_value(value)?;
            let rendered = toml::to_string_pretty(&config)
                .map_err(|err| DocsError::Config(format!("render config: {err}")))?;
            println!("{rendered}");
            Ok(())
        }
    }
}

/// The config as JSON with the anon key masked.
fn redacted(config: &Config) -> Result<Value> {
    let mut value = serde_json::to_value(config)?;
    if let Some(key) = value.pointer_mut("/remote/anon_key") {
        if key.as_str().is_some_and(|k| !k.is_empty()) {
            *key = Value::String("********".to_string());
        }
    }
    Ok(value)
}

fn emit_key(ctx: &AppContext, value: &Value, key: &str) -> Result<()> {
    let pointer = format!("/{}", key.replace('.', "/"));
    let found = value
        .pointer(&pointer)
        .ok_or_else(|| DocsError::NotFound(format!("config key '{key}'")))?;

    if ctx.json {
        return output::emit_json(&serde_json::json!({ "key": key, "value": found }));
    }
    match found {
        Value::String(s) => println!("{s}"),
        other => println!("{other}"),
    }
    Ok(())
}

fn emit_paths(ctx: &AppContext) -> Result<()> {
    let global = dirs::config_dir().map(|dir| dir.join("docsearch/config.toml"));
    let project = ctx.project_root.join(".docsearch/config.toml");

    if ctx.json {
        return output::emit_json(&serde_json::json!({
            "explicit": ctx.config_path,
            "global": global,
            "project": project,
        }));
    }

    if let Some(path) = &ctx.config_path {
        println!("explicit: {}", path.display());
    }
    if let Some(path) = &global {
        println!("global:   {}", path.display());
    }
    println!("project:  {}", project.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacted_masks_anon_key() {
        let mut config = Config::default();
        config.remote.anon_key = "secret".to_string();

        let value = redacted(&config).unwrap();
        assert_eq!(value.pointer("/remote/anon_key"), Some(&Value::from("********")));
    }

    #[test]
    fn redacted_leaves_empty_key_alone() {
        let value = redacted(&Config::default()).unwrap();
        assert_eq!(value.pointer("/remote/anon_key"), Some(&Value::from("")));
    }
}
