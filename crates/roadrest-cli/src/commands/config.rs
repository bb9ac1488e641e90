use clap::Subcommand;

use roadrest_core::Config;

use crate::common::CliError;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Set a configuration value (dotted key, e.g. scheduler.lead_window_secs)
    Set {
        key: String,
        value: String,
    },
    /// Print the config file path
    Path,
}

pub async fn run(action: ConfigAction) -> Result<(), CliError> {
    match action {
        ConfigAction::Show => {
            let config = Config::load()?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            apply(&mut config, &key, &value)?;
            config.save()?;
            println!("{key} = {value}");
        }
        ConfigAction::Path => {
            println!("{}", Config::path()?.display());
        }
    }
    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<(), CliError> {
    match key {
        "scheduler.monitor_period_secs" => config.scheduler.monitor_period_secs = value.parse()?,
        "scheduler.lead_window_secs" => config.scheduler.lead_window_secs = value.parse()?,
        "scheduler.break_duration_secs" => config.scheduler.break_duration_secs = value.parse()?,
        "scheduler.default_interval_secs" => config.scheduler.default_interval_secs = value.parse()?,
        "routing.average_speed_kmh" => config.routing.average_speed_kmh = value.parse()?,
        "places.endpoint" => config.places.endpoint = value.to_string(),
        "places.radius_m" => config.places.radius_m = value.parse()?,
        "notifications.enabled" => config.notifications.enabled = value.parse()?,
        other => return Err(format!("unknown config key '{other}'").into()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sets_known_keys() {
        let mut config = Config::default();
        apply(&mut config, "scheduler.lead_window_secs", "600").unwrap();
        assert_eq!(config.scheduler.lead_window_secs, 600);
        apply(&mut config, "notifications.enabled", "false").unwrap();
        assert!(!config.notifications.enabled);
    }

    #[test]
    fn rejects_unknown_keys_and_bad_values() {
        let mut config = Config::default();
        assert!(apply(&mut config, "scheduler.bogus", "1").is_err());
        assert!(apply(&mut config, "scheduler.lead_window_secs", "soon").is_err());
    }
}
