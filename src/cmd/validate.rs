//! `traceability validate` — check a configuration file for errors.
//!
//! Parses the config file and reports the result in either
//! human-readable text or machine-readable JSON format.

use crate::cli::{ValidateArgs, ValidateFormat};
use crate::config::sources::parse_config_str;
use crate::error::TraceabilityError;

pub fn execute(args: &ValidateArgs) -> Result<(), TraceabilityError> {
    let path = &args.config;

    if !path.exists() {
        return Err(TraceabilityError::ConfigFileNotFound { path: path.clone() });
    }

    let content = std::fs::read_to_string(path)?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let config = match parse_config_str(ext, &content, &path.display().to_string()) {
        Ok(config) => config,
        Err(e) => {
            match args.format {
                ValidateFormat::Text => eprintln!("\u{2717} {} is invalid\n", path.display()),
                ValidateFormat::Json => println!(
                    "{}",
                    serde_json::json!({
                        "valid": false,
                        "error": e.to_string(),
                    })
                ),
            }
            return Err(e);
        }
    };

    match args.format {
        ValidateFormat::Text => {
            let state = if config.enabled { "enabled" } else { "disabled" };
            println!("\u{2713} {} is valid (traceability {state})", path.display());
        }
        ValidateFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "valid": true,
                    "enabled": config.enabled,
                })
            );
        }
    }

    Ok(())
}
