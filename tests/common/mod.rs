//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use carik_hub::domain::entities::InstanceId;
use carik_hub::domain::traits::{Extension, HookError, HookResult, Instance};
use carik_hub::infrastructure::adapters::ConsoleAdapter;
use carik_hub::infrastructure::plugins::{PluginResolver, StaticLoader};
use carik_hub::infrastructure::storage::BindingStore;
use carik_hub::application::plugins::PluginRegistry;

static INIT: Once = Once::new();

pub fn ensure_init() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Observes and steers every generation of one test plugin
#[derive(Default)]
pub struct Recorder {
    pub instantiated: AtomicUsize,
    pub destroyed: AtomicUsize,
    pub enabled: Mutex<BTreeSet<InstanceId>>,
    pub refuse_enable: Mutex<BTreeSet<InstanceId>>,
    pub fail_disable: AtomicBool,
    pub panic_enable: AtomicBool,
}

impl Recorder {
    pub fn enabled_on(&self) -> Vec<InstanceId> {
        self.enabled.lock().unwrap().iter().copied().collect()
    }

    pub fn refuse(&self, id: InstanceId) {
        self.refuse_enable.lock().unwrap().insert(id);
    }

    pub fn instantiated(&self) -> usize {
        self.instantiated.load(Ordering::SeqCst)
    }
}

pub struct RecordingExtension {
    recorder: Arc<Recorder>,
}

#[async_trait]
impl Extension for RecordingExtension {
    async fn enable(&self, instance: Arc<dyn Instance>) -> HookResult {
        if self.recorder.panic_enable.load(Ordering::SeqCst) {
            panic!("extension exploded");
        }
        if self.recorder.refuse_enable.lock().unwrap().contains(&instance.id()) {
            return Err(HookError::Failed("refused".to_string()));
        }
        self.recorder.enabled.lock().unwrap().insert(instance.id());
        Ok(())
    }

    async fn disable(&self, instance: Arc<dyn Instance>) -> HookResult {
        if self.recorder.fail_disable.load(Ordering::SeqCst) {
            return Err(HookError::Failed("teardown failed".to_string()));
        }
        self.recorder.enabled.lock().unwrap().remove(&instance.id());
        Ok(())
    }

    async fn destroy(&self) -> HookResult {
        self.recorder.destroyed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Extension that provides no hooks at all
pub struct Inert;

impl Extension for Inert {}

/// Only an enable hook
pub struct EnableOnly;

#[async_trait]
impl Extension for EnableOnly {
    async fn enable(&self, _instance: Arc<dyn Instance>) -> HookResult {
        Ok(())
    }
}

/// Temporary plugin and data directories plus an in-process loader
pub struct Workspace {
    pub dir: TempDir,
    pub loader: Arc<StaticLoader>,
}

impl Workspace {
    pub fn new() -> Self {
        ensure_init();
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("plugins")).unwrap();
        std::fs::create_dir_all(dir.path().join("modules")).unwrap();
        Self {
            dir,
            loader: Arc::new(StaticLoader::new()),
        }
    }

    pub fn plugins_dir(&self) -> PathBuf {
        self.dir.path().join("plugins")
    }

    pub fn modules_dir(&self) -> PathBuf {
        self.dir.path().join("modules")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    /// Create the plugin's directory with a manifest
    pub fn place(&self, name: &str) {
        let dir = self.plugins_dir().join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("plugin.yaml"),
            format!("name: {}\nversion: 0.1.0\ndescription: test plugin\n", name),
        )
        .unwrap();
    }

    /// Install a recorder plugin under `name`
    pub fn install(&self, name: &str) -> Arc<Recorder> {
        self.place(name);
        let recorder = Arc::new(Recorder::default());
        let shared = Arc::clone(&recorder);
        self.loader.register(name, move || {
            shared.instantiated.fetch_add(1, Ordering::SeqCst);
            RecordingExtension {
                recorder: Arc::clone(&shared),
            }
        });
        recorder
    }

    pub fn registry(&self) -> PluginRegistry {
        PluginRegistry::new(
            PluginResolver::new(self.plugins_dir(), self.modules_dir()),
            self.loader.clone(),
            Arc::new(BindingStore::new()),
        )
    }

    pub fn console(&self, id: u64) -> Arc<ConsoleAdapter> {
        let id = InstanceId(id);
        Arc::new(ConsoleAdapter::new(id, self.data_dir().join(id.to_string())))
    }

    pub fn instance(&self, id: u64) -> Arc<dyn Instance> {
        self.console(id)
    }
}

/// Poll `check` until it holds or two seconds passed
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
