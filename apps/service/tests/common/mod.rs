#![allow(dead_code)]
//! Shared fakes for the integration tests

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use url::Url;

use project_monitor::database::Registry;
use project_monitor::monitoring::types::{FailureKind, ProbeFailure};
use project_monitor::monitoring::{Checker, StatusValue, Target, TargetId, Ticker};

/// In-memory registry that records every status write
#[derive(Default)]
pub struct FakeRegistry {
    targets: Mutex<Vec<Target>>,
    updates: Mutex<Vec<(TargetId, StatusValue)>>,
    failing_lists: AtomicUsize,
    rejected_ids: Mutex<HashSet<TargetId>>,
    list_calls: AtomicUsize,
}

impl FakeRegistry {
    pub fn with_targets(targets: Vec<Target>) -> Self {
        Self { targets: Mutex::new(targets), ..Default::default() }
    }

    /// Make the next `count` listings fail
    pub fn fail_next_lists(&self, count: usize) {
        self.failing_lists.store(count, Ordering::SeqCst);
    }

    pub fn reject_writes_for(&self, id: TargetId) {
        self.rejected_ids.lock().unwrap().insert(id);
    }

    pub fn updates(&self) -> Vec<(TargetId, StatusValue)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn updates_for(&self, id: TargetId) -> Vec<StatusValue> {
        self.updates().into_iter().filter(|(target, _)| *target == id).map(|(_, status)| status).collect()
    }

    pub fn status_of(&self, id: TargetId) -> Option<StatusValue> {
        self.targets.lock().unwrap().iter().find(|t| t.id == id).map(|t| t.status.clone())
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Poll until `id` has received at least `count` updates
    pub async fn wait_for_updates(&self, id: TargetId, count: usize, within: Duration) -> bool {
        tokio::time::timeout(within, async {
            while self.updates_for(id).len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .is_ok()
    }

    pub async fn wait_for_list_calls(&self, count: usize, within: Duration) -> bool {
        tokio::time::timeout(within, async {
            while self.list_calls() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .is_ok()
    }
}

#[async_trait]
impl Registry for FakeRegistry {
    async fn list_targets(&self) -> Result<Vec<Target>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let failing = self.failing_lists.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_lists.store(failing - 1, Ordering::SeqCst);
            return Err(anyhow!("connection pool closed"));
        }

        Ok(self.targets.lock().unwrap().clone())
    }

    async fn update_status(&self, id: TargetId, status: &StatusValue) -> Result<()> {
        if self.rejected_ids.lock().unwrap().contains(&id) {
            return Err(anyhow!("database is locked"));
        }

        self.updates.lock().unwrap().push((id, status.clone()));
        if let Some(target) = self.targets.lock().unwrap().iter_mut().find(|t| t.id == id) {
            target.status = status.clone();
        }
        Ok(())
    }
}

/// Registry whose listing never completes
#[derive(Default)]
pub struct StalledRegistry {
    list_calls: AtomicUsize,
}

impl StalledRegistry {
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Registry for StalledRegistry {
    async fn list_targets(&self) -> Result<Vec<Target>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }

    async fn update_status(&self, _id: TargetId, _status: &StatusValue) -> Result<()> {
        Ok(())
    }
}

/// Scripted response for one host
#[derive(Debug, Clone, Copy)]
pub enum Scripted {
    Status(u16),
    Refused,
    Hang,
    Panic,
}

/// Checker that answers by host and records every request
pub struct RecordingChecker {
    script: HashMap<String, Scripted>,
    calls: Mutex<Vec<String>>,
}

impl RecordingChecker {
    /// Hosts missing from the script answer 200
    pub fn new(script: &[(&str, Scripted)]) -> Self {
        Self {
            script: script.iter().map(|(host, response)| (host.to_string(), *response)).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Checker for RecordingChecker {
    async fn check(&self, url: &Url) -> Result<u16, ProbeFailure> {
        let host = url.host_str().unwrap_or_default().to_string();
        self.calls.lock().unwrap().push(host.clone());

        match self.script.get(&host).copied().unwrap_or(Scripted::Status(200)) {
            Scripted::Status(code) => Ok(code),
            Scripted::Refused => Err(ProbeFailure::new(FailureKind::Connect, "connection refused")),
            Scripted::Hang => std::future::pending().await,
            Scripted::Panic => panic!("checker blew up for {host}"),
        }
    }
}

/// Ticker driven by the test through a channel
pub struct ManualTicker {
    rx: mpsc::UnboundedReceiver<()>,
}

impl ManualTicker {
    pub fn new() -> (mpsc::UnboundedSender<()>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }
}

#[async_trait]
impl Ticker for ManualTicker {
    async fn tick(&mut self) -> Option<DateTime<Utc>> {
        self.rx.recv().await.map(|_| Utc::now())
    }
}

pub fn unknown() -> StatusValue {
    StatusValue::Other("UNKNOWN".to_string())
}
