use std::{fmt, path::PathBuf};

use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};

/// Order band of collector plugins. Plugins with a lower order run first.
pub const COLLECTOR_ORDER: f64 = 0.0;

/// Frame set of a single exported element, relative to its staging directory.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Frames {
    Single(String),
    Sequence(Vec<String>),
}

impl Frames {
    /// Frame filenames in order.
    pub fn names(&self) -> Vec<&str> {
        match self {
            Frames::Single(name) => vec![name.as_str()],
            Frames::Sequence(names) => names.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Frames::Single(name) => name.is_empty(),
            Frames::Sequence(names) => names.is_empty(),
        }
    }
}

/// Files of a multi-channel render, keyed by channel (AOV) name.
///
/// Channels keep the order in which they were declared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelMap(Vec<(String, Vec<String>)>);

impl ChannelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a channel. An existing channel with the same name is replaced in place.
    pub fn insert(&mut self, channel: impl Into<String>, files: Vec<String>) {
        let channel = channel.into();
        match self.0.iter_mut().find(|(name, _)| *name == channel) {
            Some(entry) => entry.1 = files,
            None => self.0.push((channel, files)),
        }
    }

    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    /// All files of all channels, channel by channel.
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .flat_map(|(_, files)| files.iter().map(String::as_str))
    }
}

impl<K: Into<String>> FromIterator<(K, Vec<String>)> for ChannelMap {
    fn from_iter<T: IntoIterator<Item = (K, Vec<String>)>>(iter: T) -> Self {
        let mut map = ChannelMap::new();
        for (channel, files) in iter {
            map.insert(channel, files);
        }
        map
    }
}

impl Serialize for ChannelMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (channel, files) in &self.0 {
            map.serialize_entry(channel, files)?;
        }
        map.end()
    }
}

struct ChannelMapVisitor;

impl<'de> Visitor<'de> for ChannelMapVisitor {
    type Value = ChannelMap;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of channel names to file lists")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut map = ChannelMap::new();
        while let Some((channel, files)) = access.next_entry::<String, Vec<String>>()? {
            map.insert(channel, files);
        }
        Ok(map)
    }
}

impl<'de> Deserialize<'de> for ChannelMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ChannelMapVisitor)
    }
}

/// One publishable unit of production output.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Instance {
    #[serde(default)]
    pub name: String,
    /// Path of the node producing this instance's output.
    #[serde(alias = "instance_node")]
    pub node: String,
    #[serde(alias = "product_type", alias = "productType")]
    pub family: String,
    #[serde(default)]
    pub frames: Option<Frames>,
    #[serde(default, alias = "expectedFiles")]
    pub expected_files: Vec<ChannelMap>,
    /// Intermediate render-description file, e.g. an IFD.
    #[serde(default, alias = "ifdFile")]
    pub intermediate_file: Option<String>,
}

/// Shared state of one publish run.
///
/// The cleanup lists only ever grow; whoever performs the deletion decides
/// how to deduplicate them.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Context {
    pub host: String,
    #[serde(default)]
    cleanup_full_paths: Vec<PathBuf>,
    #[serde(default)]
    cleanup_empty_dirs: Vec<PathBuf>,
}

impl Context {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    /// Files to delete once publishing is done.
    pub fn cleanup_full_paths(&self) -> &[PathBuf] {
        &self.cleanup_full_paths
    }

    /// Directories to delete when they are empty after file deletion.
    pub fn cleanup_empty_dirs(&self) -> &[PathBuf] {
        &self.cleanup_empty_dirs
    }

    pub fn add_cleanup_dir(&mut self, dir: impl Into<PathBuf>) {
        self.cleanup_empty_dirs.push(dir.into());
    }

    pub fn add_cleanup_files<I, P>(&mut self, files: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.cleanup_full_paths
            .extend(files.into_iter().map(Into::into));
    }

    /// Consume the context, returning `(full_paths, empty_dirs)`.
    pub fn into_cleanup(self) -> (Vec<PathBuf>, Vec<PathBuf>) {
        (self.cleanup_full_paths, self.cleanup_empty_dirs)
    }
}

/// Metadata a plugin declares to the publish host.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PluginMetadata {
    pub id: String,
    pub label: String,
    pub order: f64,
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub families: Vec<String>,
}

fn accepts(list: &[String], value: &str) -> bool {
    list.is_empty() || list.iter().any(|v| v == "*" || v == value)
}

impl PluginMetadata {
    pub fn accepts_family(&self, family: &str) -> bool {
        accepts(&self.families, family)
    }

    pub fn accepts_host(&self, host: &str) -> bool {
        accepts(&self.hosts, host)
    }
}

/// Handle to a node parameter holding an output location.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct ParameterHandle {
    pub node: String,
    pub name: String,
}

/// Query layer of the host application's node graph.
pub trait OutputResolver {
    /// Type name of the node, `None` if the node does not exist.
    fn node_type(&self, node: &str) -> Option<String>;

    /// Parameter holding the node's configured output path, if its type has one.
    fn output_parameter(&self, node: &str) -> Option<ParameterHandle>;

    /// Evaluate a parameter to a string.
    fn evaluate(&self, parm: &ParameterHandle) -> Option<String>;
}

/// A publish plugin processing one instance at a time.
pub trait InstancePlugin {
    fn metadata(&self) -> &PluginMetadata;

    fn process(
        &self,
        instance: &Instance,
        context: &mut Context,
        resolver: &dyn OutputResolver,
    ) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn instance_accepts_host_keys() {
        let value = json!({
            "instance_node": "/out/render1",
            "family": "redshift_rop",
            "frames": ["a.0001.exr", "a.0002.exr"],
            "expectedFiles": [{"beauty": ["/r/beauty.0001.exr"]}],
            "ifdFile": "/r/ifd/render1.0000.rs"
        });
        let instance: Instance = serde_json::from_value(value).unwrap();
        assert_eq!(instance.node, "/out/render1");
        assert_eq!(
            instance.frames,
            Some(Frames::Sequence(vec!["a.0001.exr".into(), "a.0002.exr".into()]))
        );
        assert_eq!(instance.expected_files.len(), 1);
        assert_eq!(
            instance.intermediate_file.as_deref(),
            Some("/r/ifd/render1.0000.rs")
        );
    }

    #[test]
    fn single_frame_is_a_string() {
        let instance: Instance = serde_json::from_value(json!({
            "node": "/out/geo1",
            "product_type": "pointcache",
            "frames": "out.0001.bgeo.sc"
        }))
        .unwrap();
        assert_eq!(instance.family, "pointcache");
        assert_eq!(instance.frames.unwrap().names(), vec!["out.0001.bgeo.sc"]);
        assert!(instance.expected_files.is_empty());
        assert!(instance.intermediate_file.is_none());
    }

    #[test]
    fn channel_map_keeps_declared_order() {
        let text = r#"{"spec": ["/r/spec.1.exr"], "beauty": ["/r/beauty.1.exr", "/r/beauty.2.exr"], "albedo": []}"#;
        let map: ChannelMap = serde_json::from_str(text).unwrap();
        assert_eq!(map.channels().collect::<Vec<_>>(), ["spec", "beauty", "albedo"]);
        assert_eq!(
            map.files().collect::<Vec<_>>(),
            ["/r/spec.1.exr", "/r/beauty.1.exr", "/r/beauty.2.exr"]
        );
        let back = serde_json::to_string(&map).unwrap();
        assert_eq!(back, r#"{"spec":["/r/spec.1.exr"],"beauty":["/r/beauty.1.exr","/r/beauty.2.exr"],"albedo":[]}"#);
    }

    #[test]
    fn context_only_appends() {
        let mut ctx = Context::new("houdini");
        ctx.add_cleanup_dir("/show/shot");
        ctx.add_cleanup_dir("/show/shot");
        ctx.add_cleanup_files(["/show/shot/a.exr"]);
        ctx.add_cleanup_files(vec![PathBuf::from("/show/shot/b.exr")]);
        assert_eq!(ctx.cleanup_empty_dirs().len(), 2);
        assert_eq!(
            ctx.cleanup_full_paths(),
            [PathBuf::from("/show/shot/a.exr"), PathBuf::from("/show/shot/b.exr")]
        );
    }

    #[test]
    fn metadata_filters() {
        let meta = PluginMetadata {
            id: "p".into(),
            label: "P".into(),
            order: COLLECTOR_ORDER,
            hosts: vec!["houdini".into()],
            families: vec!["usd".into(), "camera".into()],
        };
        assert!(meta.accepts_family("usd"));
        assert!(!meta.accepts_family("workfile"));
        assert!(meta.accepts_host("houdini"));
        assert!(!meta.accepts_host("maya"));

        let any = PluginMetadata {
            families: vec!["*".into()],
            hosts: vec![],
            ..meta
        };
        assert!(any.accepts_family("workfile"));
        assert!(any.accepts_host("maya"));
    }
}
