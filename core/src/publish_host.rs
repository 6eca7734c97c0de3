use std::path::PathBuf;

use collect_cleanup::CollectFilesForCleaningUp;
use plugin_api::{Context, Instance, InstancePlugin, OutputResolver, PluginMetadata};
use serde::Serialize;
use tracing::{debug, error, info, info_span};
use uuid::Uuid;

use crate::config::Config;

/// A plugin that failed on one instance. The run carries on without it.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct PluginFailure {
    pub plugin: String,
    pub instance: String,
    pub error: String,
}

/// Outcome of a publish run, handed to the cleanup executor.
#[derive(Debug, Serialize, Clone)]
pub struct PublishReport {
    pub run_id: Uuid,
    pub cleanup_full_paths: Vec<PathBuf>,
    pub cleanup_empty_dirs: Vec<PathBuf>,
    pub failures: Vec<PluginFailure>,
}

/// Host responsible for running registered plugins against instances.
#[derive(Default)]
pub struct PublishHost {
    plugins: Vec<Box<dyn InstancePlugin>>,
}

impl PublishHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host with the built-in plugins configured from `config`.
    pub fn with_default_plugins(config: &Config) -> Self {
        let mut host = Self::new();
        host.register(CollectFilesForCleaningUp::new(
            config.include_intermediate_files,
        ));
        host
    }

    pub fn register(&mut self, plugin: impl InstancePlugin + 'static) {
        self.plugins.push(Box::new(plugin));
        // stable, so equal orders keep registration order
        self.plugins
            .sort_by(|a, b| a.metadata().order.total_cmp(&b.metadata().order));
    }

    /// Registered plugins in run order.
    pub fn list(&self) -> Vec<&PluginMetadata> {
        self.plugins.iter().map(|p| p.metadata()).collect()
    }

    /// Run every plugin, in order, over every instance it accepts.
    pub fn run(
        &self,
        host: &str,
        instances: &[Instance],
        resolver: &dyn OutputResolver,
    ) -> PublishReport {
        let run_id = Uuid::new_v4();
        let _span = info_span!("publish", %run_id, host).entered();
        let mut context = Context::new(host);
        let mut failures = Vec::new();

        for plugin in &self.plugins {
            let meta = plugin.metadata();
            if !meta.accepts_host(host) {
                debug!("skipping {} - not available in host '{}'", meta.id, host);
                continue;
            }
            for instance in instances.iter().filter(|i| meta.accepts_family(&i.family)) {
                debug!(plugin = %meta.id, instance = %instance.name, "processing");
                if let Err(err) = plugin.process(instance, &mut context, resolver) {
                    error!("{} failed on {}: {err:#}", meta.label, instance.name);
                    failures.push(PluginFailure {
                        plugin: meta.id.clone(),
                        instance: instance.name.clone(),
                        error: format!("{err:#}"),
                    });
                }
            }
        }

        let (cleanup_full_paths, cleanup_empty_dirs) = context.into_cleanup();
        info!(
            files = cleanup_full_paths.len(),
            dirs = cleanup_empty_dirs.len(),
            failures = failures.len(),
            "publish run finished"
        );
        PublishReport {
            run_id,
            cleanup_full_paths,
            cleanup_empty_dirs,
            failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{SceneNode, SceneSnapshot};
    use plugin_api::COLLECTOR_ORDER;
    use std::sync::{Arc, Mutex};

    /// Records which instances it saw, failing on the ones named "broken".
    struct Recorder {
        meta: PluginMetadata,
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn new(id: &str, order: f64, seen: Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                meta: PluginMetadata {
                    id: id.into(),
                    label: id.into(),
                    order,
                    hosts: vec![],
                    families: vec!["pointcache".into()],
                },
                seen,
            }
        }
    }

    impl InstancePlugin for Recorder {
        fn metadata(&self) -> &PluginMetadata {
            &self.meta
        }

        fn process(
            &self,
            instance: &Instance,
            _context: &mut Context,
            _resolver: &dyn OutputResolver,
        ) -> anyhow::Result<()> {
            self.seen
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.meta.id, instance.name));
            if instance.name == "broken" {
                anyhow::bail!("cannot process");
            }
            Ok(())
        }
    }

    fn instance(name: &str, family: &str) -> Instance {
        Instance {
            name: name.into(),
            node: format!("/out/{name}"),
            family: family.into(),
            ..Default::default()
        }
    }

    #[test]
    fn plugins_run_in_order_over_accepted_families() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut host = PublishHost::new();
        host.register(Recorder::new("late", COLLECTOR_ORDER + 0.4, seen.clone()));
        host.register(Recorder::new("early", COLLECTOR_ORDER, seen.clone()));
        assert_eq!(
            host.list().iter().map(|m| m.id.as_str()).collect::<Vec<_>>(),
            ["early", "late"]
        );

        let instances = [instance("a", "pointcache"), instance("b", "workfile")];
        let report = host.run("houdini", &instances, &SceneSnapshot::new());
        assert!(report.failures.is_empty());
        assert_eq!(*seen.lock().unwrap(), ["early:a", "late:a"]);
    }

    #[test]
    fn failure_is_recorded_and_run_continues() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut host = PublishHost::new();
        host.register(Recorder::new("rec", COLLECTOR_ORDER, seen.clone()));
        let instances = [instance("broken", "pointcache"), instance("ok", "pointcache")];
        let report = host.run("houdini", &instances, &SceneSnapshot::new());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].instance, "broken");
        assert_eq!(report.failures[0].error, "cannot process");
        assert_eq!(*seen.lock().unwrap(), ["rec:broken", "rec:ok"]);
    }

    #[test]
    fn default_plugins_skip_other_hosts() {
        let mut scene = SceneSnapshot::new();
        scene.insert(
            "/out/cache1",
            SceneNode::new("geometry").with_parm("sopoutput", "/proj/cache/out.bgeo.sc"),
        );
        let host = PublishHost::with_default_plugins(&Config::default());
        let instances = [Instance {
            name: "cache1".into(),
            node: "/out/cache1".into(),
            family: "pointcache".into(),
            ..Default::default()
        }];

        let report = host.run("maya", &instances, &scene);
        assert!(report.cleanup_full_paths.is_empty());

        let report = host.run("houdini", &instances, &scene);
        assert_eq!(
            report.cleanup_full_paths,
            [PathBuf::from("/proj/cache/out.bgeo.sc")]
        );
        assert_eq!(report.cleanup_empty_dirs, [PathBuf::from("/proj/cache")]);
    }
}
