//! In-memory collaborators for unit tests.

use crate::dashboard::DashboardClient;
use crate::pipeline::{CaptureDevice, Pipeline, RemovableStorage, Uploader};
use crate::prelude::{
    DashboardParameters, MountError, NetworkError, PipelineResult, StageError, StageKind,
    StageResult,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

pub fn sample_parameters() -> DashboardParameters {
    DashboardParameters {
        frequency_mhz: 101.1,
        duration_secs: 30,
        save_to_removable: true,
        emergency_flag_set: false,
    }
}

#[derive(Default)]
struct DashboardState {
    parameters: VecDeque<Result<DashboardParameters, ()>>,
    fallback: Option<DashboardParameters>,
    flag_writes: Vec<bool>,
    locations: Vec<(f64, f64)>,
    fire_counts: Vec<u32>,
    summaries: Vec<Vec<String>>,
    results: Vec<PipelineResult>,
    fail_publish: bool,
}

#[derive(Default)]
pub struct FakeDashboard {
    state: Mutex<DashboardState>,
}

impl FakeDashboard {
    pub fn with_parameters(params: DashboardParameters) -> Self {
        let dashboard = Self::default();
        dashboard.state.lock().unwrap().fallback = Some(params);
        dashboard
    }

    pub fn unreachable() -> Self {
        Self::default()
    }

    /// Queues one answer for `get_parameters`; `None` simulates a failure.
    pub fn push_answer(&self, answer: Option<DashboardParameters>) {
        self.state
            .lock()
            .unwrap()
            .parameters
            .push_back(answer.ok_or(()));
    }

    pub fn failing_publishes(self) -> Self {
        self.state.lock().unwrap().fail_publish = true;
        self
    }

    pub fn flag_writes(&self) -> Vec<bool> {
        self.state.lock().unwrap().flag_writes.clone()
    }

    pub fn locations(&self) -> Vec<(f64, f64)> {
        self.state.lock().unwrap().locations.clone()
    }

    pub fn fire_counts(&self) -> Vec<u32> {
        self.state.lock().unwrap().fire_counts.clone()
    }

    pub fn summaries(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().summaries.clone()
    }

    pub fn results(&self) -> Vec<PipelineResult> {
        self.state.lock().unwrap().results.clone()
    }
}

#[async_trait]
impl DashboardClient for FakeDashboard {
    async fn get_parameters(&self) -> Result<DashboardParameters, NetworkError> {
        let mut state = self.state.lock().unwrap();
        let answer = match state.parameters.pop_front() {
            Some(answer) => answer,
            None => state.fallback.clone().ok_or(()),
        };
        answer.map_err(|_| NetworkError::Request("dashboard offline".into()))
    }

    async fn set_emergency_flag(&self, set: bool) -> Result<(), NetworkError> {
        let mut state = self.state.lock().unwrap();
        state.flag_writes.push(set);
        if let Some(fallback) = state.fallback.as_mut() {
            fallback.emergency_flag_set = set;
        }
        Ok(())
    }

    async fn publish_location(&self, lat: f64, lon: f64) -> Result<(), NetworkError> {
        let mut state = self.state.lock().unwrap();
        state.locations.push((lat, lon));
        if state.fail_publish {
            return Err(NetworkError::Status(503));
        }
        Ok(())
    }

    async fn publish_fire_count(&self, count: u32) -> Result<(), NetworkError> {
        let mut state = self.state.lock().unwrap();
        state.fire_counts.push(count);
        if state.fail_publish {
            return Err(NetworkError::Status(503));
        }
        Ok(())
    }

    async fn publish_summary(&self, items: &[String]) -> Result<(), NetworkError> {
        let mut state = self.state.lock().unwrap();
        state.summaries.push(items.to_vec());
        if state.fail_publish {
            return Err(NetworkError::Status(503));
        }
        Ok(())
    }

    async fn publish_result(&self, result: &PipelineResult) -> Result<(), NetworkError> {
        self.state.lock().unwrap().results.push(result.clone());
        Ok(())
    }
}

pub struct FakeCapture {
    fail: bool,
    calls: Mutex<Vec<(f64, u32)>>,
}

impl FakeCapture {
    pub fn succeeding() -> Self {
        Self {
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn artifact() -> PathBuf {
        PathBuf::from("/tmp/recordings/Recording_test_101.1MHz.mp3")
    }

    pub fn calls(&self) -> Vec<(f64, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CaptureDevice for FakeCapture {
    async fn capture(&self, frequency_mhz: f64, duration_secs: u32) -> StageResult<PathBuf> {
        self.calls.lock().unwrap().push((frequency_mhz, duration_secs));
        if self.fail {
            return Err(StageError::Command("rtl_fm exited with status 1".into()));
        }
        Ok(Self::artifact())
    }
}

pub struct FakeUploader {
    fail: bool,
    calls: Mutex<usize>,
}

impl FakeUploader {
    pub fn succeeding() -> Self {
        Self {
            fail: false,
            calls: Mutex::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Uploader for FakeUploader {
    async fn upload(&self, _path: &Path) -> StageResult<()> {
        *self.calls.lock().unwrap() += 1;
        if self.fail {
            return Err(StageError::Command("upload rejected".into()));
        }
        Ok(())
    }
}

pub struct FakeStorage {
    mounted: Mutex<bool>,
    fail_mount: bool,
    fail_copy: bool,
    fail_unmount: bool,
    operations: Mutex<Vec<&'static str>>,
}

impl FakeStorage {
    fn new(mounted: bool) -> Self {
        Self {
            mounted: Mutex::new(mounted),
            fail_mount: false,
            fail_copy: false,
            fail_unmount: false,
            operations: Mutex::new(Vec::new()),
        }
    }

    pub fn unmounted() -> Self {
        Self::new(false)
    }

    pub fn mounted() -> Self {
        Self::new(true)
    }

    pub fn with_mount_failure(mut self) -> Self {
        self.fail_mount = true;
        self
    }

    pub fn with_copy_failure(mut self) -> Self {
        self.fail_copy = true;
        self
    }

    pub fn with_unmount_failure(mut self) -> Self {
        self.fail_unmount = true;
        self
    }

    pub fn operations(&self) -> Vec<&'static str> {
        self.operations.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemovableStorage for FakeStorage {
    async fn is_mounted(&self) -> Result<bool, MountError> {
        Ok(*self.mounted.lock().unwrap())
    }

    async fn mount(&self) -> Result<(), MountError> {
        self.operations.lock().unwrap().push("mount");
        if self.fail_mount {
            return Err(MountError::Mount {
                device: "/dev/sda".into(),
                mount_point: "/mnt/mp3player".into(),
                detail: "no such device".into(),
            });
        }
        *self.mounted.lock().unwrap() = true;
        Ok(())
    }

    async fn copy_in(&self, artifact: &Path) -> StageResult<PathBuf> {
        self.operations.lock().unwrap().push("copy");
        if self.fail_copy {
            return Err(StageError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only filesystem",
            )));
        }
        let name = artifact.file_name().unwrap_or_default();
        Ok(Path::new("/mnt/mp3player").join(name))
    }

    async fn unmount(&self) -> Result<(), MountError> {
        self.operations.lock().unwrap().push("unmount");
        if self.fail_unmount {
            return Err(MountError::Unmount {
                mount_point: "/mnt/mp3player".into(),
                detail: "target is busy".into(),
            });
        }
        *self.mounted.lock().unwrap() = false;
        Ok(())
    }
}

/// Pipeline that records its invocations and takes `run_time` to finish.
pub struct CountingPipeline {
    runs: Mutex<Vec<DashboardParameters>>,
    run_time: Duration,
    on_run: Mutex<Option<Box<dyn FnMut() + Send>>>,
}

impl CountingPipeline {
    pub fn new(run_time: Duration) -> Self {
        Self {
            runs: Mutex::new(Vec::new()),
            run_time,
            on_run: Mutex::new(None),
        }
    }

    /// Registers a hook executed at the start of every run.
    pub fn on_run(self, hook: impl FnMut() + Send + 'static) -> Self {
        *self.on_run.lock().unwrap() = Some(Box::new(hook));
        self
    }

    pub fn runs(&self) -> Vec<DashboardParameters> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Pipeline for CountingPipeline {
    async fn run(&self, params: &DashboardParameters) -> PipelineResult {
        self.runs.lock().unwrap().push(params.clone());
        if let Some(hook) = self.on_run.lock().unwrap().as_mut() {
            hook();
        }
        tokio::time::sleep(self.run_time).await;
        PipelineResult::succeeded(StageKind::Upload, FakeCapture::artifact())
    }
}
