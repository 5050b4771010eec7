use pr_domain::config::{Config, ConfigSeverity};

const MASK: &str = "********";

/// Parse and validate the config, printing any issues.
///
/// Returns `false` when errors were found.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();

    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    let warning_count = issues.len() - error_count;

    for issue in &issues {
        println!("{issue}");
    }

    println!(
        "\n{} error(s), {} warning(s) in {config_path}",
        error_count, warning_count,
    );

    error_count == 0
}

/// Dump the resolved config as TOML with secrets masked.
pub fn show(config: &Config) {
    match render(config) {
        Ok(output) => print!("{output}"),
        Err(e) => {
            eprintln!("Failed to serialize config: {e}");
            std::process::exit(1);
        }
    }
}

fn render(config: &Config) -> Result<String, toml::ser::Error> {
    let mut masked = config.clone();
    if masked.telegram.token.is_some() {
        masked.telegram.token = Some(MASK.into());
    }
    if masked.inference.auth.key.is_some() {
        masked.inference.auth.key = Some(MASK.into());
    }
    toml::to_string_pretty(&masked)
}
