//! Collects the files a publish leaves behind in its staging directory so
//! they can be removed once the published copies are registered.
//!
//! Artists are free to point a ROP anywhere, so the collected directory is
//! only ever scheduled for removal when it ends up empty.

use std::path::PathBuf;

use anyhow::Result;
use plugin_api::{
    Context, Instance, InstancePlugin, OutputResolver, PluginMetadata, COLLECTOR_ORDER,
};
use serde::Serialize;
use tracing::{debug, warn};

pub const PLUGIN_ID: &str = "collect_files_for_cleaning_up";

/// Product types whose outputs are collected.
pub const FAMILIES: &[&str] = &[
    "camera",
    "ass",
    "pointcache",
    "imagesequence",
    "mantraifd",
    "redshiftproxy",
    "review",
    "staticMesh",
    "usd",
    "vdbcache",
    "redshift_rop",
];

/// Files and staging directory collected for one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupCandidates {
    pub staging_dir: PathBuf,
    pub files: Vec<PathBuf>,
}

/// Directory component of `filepath`, taken from the raw string.
///
/// Everything before the last `/`, without trailing slashes unless the
/// directory is the root. A trailing `/` or `/.` stays inside the directory.
pub fn staging_dir(filepath: &str) -> PathBuf {
    let Some(idx) = filepath.rfind('/') else {
        return PathBuf::new();
    };
    let head = &filepath[..=idx];
    let trimmed = head.trim_end_matches('/');
    if trimmed.is_empty() {
        PathBuf::from(head)
    } else {
        PathBuf::from(trimmed)
    }
}

/// Compute the cleanup candidates of `instance` whose output parameter
/// evaluated to `filepath`.
///
/// Frame names are joined onto the staging directory, channel map entries
/// are taken as they are. When neither frames nor channel maps yield a file,
/// `filepath` itself is the candidate. The intermediate file is collected
/// as a single path even if it was written once per frame.
///
/// Frame names are not validated: an empty name joins to the staging
/// directory itself.
pub fn resolve_cleanup(
    instance: &Instance,
    filepath: &str,
    include_intermediate_files: bool,
) -> CleanupCandidates {
    let staging_dir = staging_dir(filepath);

    // non render products with frames
    let mut files: Vec<PathBuf> = match &instance.frames {
        Some(frames) if !frames.is_empty() => frames
            .names()
            .into_iter()
            .map(|name| staging_dir.join(name))
            .collect(),
        _ => Vec::new(),
    };

    // render products
    for channels in &instance.expected_files {
        files.extend(channels.files().map(PathBuf::from));
    }

    let found_outputs = !files.is_empty();

    if include_intermediate_files {
        if let Some(ifd) = instance.intermediate_file.as_deref().filter(|f| !f.is_empty()) {
            files.push(PathBuf::from(ifd));
        }
    }

    // non render products without frames
    if !found_outputs {
        files.push(PathBuf::from(filepath));
    }

    CleanupCandidates { staging_dir, files }
}

/// Publish plugin adding an instance's exported files to the cleanup lists.
#[derive(Debug, Clone)]
pub struct CollectFilesForCleaningUp {
    metadata: PluginMetadata,
    pub include_intermediate_files: bool,
}

impl CollectFilesForCleaningUp {
    pub fn new(include_intermediate_files: bool) -> Self {
        Self {
            metadata: PluginMetadata {
                id: PLUGIN_ID.into(),
                label: "Collect Files For Cleaning Up".into(),
                // after frames are collected
                order: COLLECTOR_ORDER + 0.2,
                hosts: vec!["houdini".into()],
                families: FAMILIES.iter().map(|f| f.to_string()).collect(),
            },
            include_intermediate_files,
        }
    }

    /// Resolve the candidates of an instance without touching any context.
    ///
    /// Returns `None` when the node has no output parameter or its path is empty.
    pub fn candidates(
        &self,
        instance: &Instance,
        resolver: &dyn OutputResolver,
    ) -> Option<CleanupCandidates> {
        let Some(parm) = resolver.output_parameter(&instance.node) else {
            let node_type = resolver
                .node_type(&instance.node)
                .unwrap_or_else(|| "<missing>".into());
            debug!("ROP node type '{node_type}' is not supported for cleaning up.");
            return None;
        };

        let filepath = resolver.evaluate(&parm).unwrap_or_default();
        if filepath.is_empty() {
            warn!(node = %instance.node, parm = %parm.name, "No filepath value to collect.");
            return None;
        }

        Some(resolve_cleanup(
            instance,
            &filepath,
            self.include_intermediate_files,
        ))
    }
}

impl Default for CollectFilesForCleaningUp {
    fn default() -> Self {
        Self::new(false)
    }
}

impl InstancePlugin for CollectFilesForCleaningUp {
    fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    fn process(
        &self,
        instance: &Instance,
        context: &mut Context,
        resolver: &dyn OutputResolver,
    ) -> Result<()> {
        let Some(CleanupCandidates { staging_dir, files }) = self.candidates(instance, resolver)
        else {
            return Ok(());
        };

        debug!("Add directories to 'cleanupEmptyDir': {}", staging_dir.display());
        context.add_cleanup_dir(staging_dir);

        debug!("Add files to 'cleanupFullPaths': {:?}", files);
        context.add_cleanup_files(files);
        Ok(())
    }
}
