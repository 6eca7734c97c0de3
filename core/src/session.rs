use std::{fs, path::Path};

use anyhow::{Context, Result};
use plugin_api::Instance;
use serde::Deserialize;

use crate::scene::SceneSnapshot;

fn default_host() -> String {
    "houdini".into()
}

/// Everything a publish run needs: the scene to query and the instances to process.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PublishRequest {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default)]
    pub scene: SceneSnapshot,
    #[serde(default)]
    pub instances: Vec<Instance>,
}

/// Read a publish request from a JSON file.
pub fn load_request(path: &Path) -> Result<PublishRequest> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading publish request {}", path.display()))?;
    let request = serde_json::from_str(&text)
        .with_context(|| format!("parsing publish request {}", path.display()))?;
    Ok(request)
}
