//! Small CLI-side session state: the active route id, so `trip watch`
//! can pick up where `route activate` left off.

use serde::{Deserialize, Serialize};

use roadrest_core::storage::data_dir;

use crate::common::CliError;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    active_route_id: Option<String>,
}

fn load() -> StateFile {
    let Ok(dir) = data_dir() else {
        return StateFile::default();
    };
    let path = dir.join("state.toml");
    std::fs::read_to_string(path)
        .ok()
        .and_then(|raw| toml::from_str(&raw).ok())
        .unwrap_or_default()
}

fn save(state: &StateFile) -> Result<(), CliError> {
    let path = data_dir()?.join("state.toml");
    std::fs::write(path, toml::to_string_pretty(state)?)?;
    Ok(())
}

pub fn active_route_id() -> Option<String> {
    load().active_route_id
}

pub fn set_active_route_id(id: Option<&str>) -> Result<(), CliError> {
    let mut state = load();
    state.active_route_id = id.map(String::from);
    save(&state)
}
