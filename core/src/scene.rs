use std::collections::BTreeMap;

use plugin_api::{OutputResolver, ParameterHandle};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A node of the exported scene together with its evaluated parameters.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct SceneNode {
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub parms: BTreeMap<String, Value>,
}

impl SceneNode {
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            parms: BTreeMap::new(),
        }
    }

    pub fn with_parm(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.parms.insert(name.to_string(), value.into());
        self
    }

    fn toggle(&self, name: &str) -> bool {
        match self.parms.get(name) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
            Some(Value::String(s)) => matches!(s.as_str(), "1" | "on" | "true"),
            _ => false,
        }
    }

    /// Name of the parameter holding this node's output path.
    pub fn output_parm_name(&self) -> Option<&'static str> {
        let name = match self.node_type.as_str() {
            "geometry" | "filmboxfbx" => "sopoutput",
            "alembic" => "filename",
            "comp" => "copoutput",
            "opengl" | "flipbook" | "karma" => "picture",
            "arnold" if self.toggle("ar_ass_export_enable") => "ar_ass_file",
            "arnold" => "ar_picture",
            "ifd" if self.toggle("soho_outputmode") => "soho_diskfile",
            "ifd" => "vm_picture",
            "Redshift_Proxy_Output" => "RS_archive_file",
            "Redshift_ROP" => "RS_outputFileNamePrefix",
            "usd" => "lopoutput",
            "usdrender" => "outputimage",
            "vray_renderer" => "SettingsOutput_img_file_path",
            _ => return None,
        };
        Some(name)
    }
}

/// Offline snapshot of a host scene's output nodes, keyed by node path.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(transparent)]
pub struct SceneSnapshot {
    nodes: BTreeMap<String, SceneNode>,
}

impl SceneSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, node: SceneNode) {
        self.nodes.insert(path.into(), node);
    }

    pub fn node(&self, path: &str) -> Option<&SceneNode> {
        self.nodes.get(path)
    }
}

impl OutputResolver for SceneSnapshot {
    fn node_type(&self, node: &str) -> Option<String> {
        self.node(node).map(|n| n.node_type.clone())
    }

    fn output_parameter(&self, node: &str) -> Option<ParameterHandle> {
        let name = self.node(node)?.output_parm_name()?;
        Some(ParameterHandle {
            node: node.to_string(),
            name: name.to_string(),
        })
    }

    fn evaluate(&self, parm: &ParameterHandle) -> Option<String> {
        match self.node(&parm.node)?.parms.get(&parm.name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(u8::from(*b).to_string()),
            _ => None,
        }
    }
}
