#![allow(dead_code)]

//! In-memory backends for tests and local development. The remote store
//! supports scripted failure injection (next N calls fail with the queued
//! errors) and optional artificial latency, which is what the reconciler's
//! timeout and retry paths are exercised against.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use crate::models::cv::Cv;
use crate::models::version::CvVersionRow;
use crate::storage::{LocalStore, LocalStoreError, NewVersion, RemoteError, RemoteStore};

#[derive(Default)]
pub struct MemoryRemote {
    rows: Mutex<Vec<CvVersionRow>>,
    fail_queue: Mutex<VecDeque<RemoteError>>,
    latency: Mutex<Option<Duration>>,
    calls: AtomicU64,
    clock: AtomicI64,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an error; each queued error consumes exactly one call.
    pub fn fail_next(&self, error: RemoteError) {
        self.fail_queue.lock().unwrap().push_back(error);
    }

    /// Every call sleeps this long before answering (pairs with paused time
    /// in tests to trip the reconciler's timeouts).
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn rows(&self) -> Vec<CvVersionRow> {
        self.rows.lock().unwrap().clone()
    }

    /// Deterministic monotonic timestamps so "most recently updated" is
    /// unambiguous in tests.
    fn next_now(&self) -> DateTime<Utc> {
        let tick = self.clock.fetch_add(1, Ordering::SeqCst);
        Utc.timestamp_opt(1_700_000_000 + tick, 0).unwrap()
    }

    async fn checkpoint(&self) -> Result<(), RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(error) = self.fail_queue.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn fetch_active(&self, user: Uuid) -> Result<Option<CvVersionRow>, RemoteError> {
        self.checkpoint().await?;
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|r| r.user_id == user && r.is_active)
            .cloned())
    }

    async fn fetch_version(
        &self,
        user: Uuid,
        id: Uuid,
    ) -> Result<Option<CvVersionRow>, RemoteError> {
        self.checkpoint().await?;
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|r| r.user_id == user && r.id == id)
            .cloned())
    }

    async fn list_versions(&self, user: Uuid) -> Result<Vec<CvVersionRow>, RemoteError> {
        self.checkpoint().await?;
        let rows = self.rows.lock().unwrap();
        let mut result: Vec<_> = rows.iter().filter(|r| r.user_id == user).cloned().collect();
        result.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(result)
    }

    async fn insert_version(
        &self,
        user: Uuid,
        new: NewVersion<'_>,
    ) -> Result<CvVersionRow, RemoteError> {
        self.checkpoint().await?;
        let now = self.next_now();
        let mut rows = self.rows.lock().unwrap();
        if new.active {
            for row in rows.iter_mut().filter(|r| r.user_id == user && r.is_active) {
                row.is_active = false;
                row.updated_at = now;
            }
        }
        let row = CvVersionRow {
            id: Uuid::new_v4(),
            user_id: user,
            cv_data: Json(new.cv_data.clone()),
            template: new.template.to_string(),
            title: new.title.to_string(),
            is_active: new.active,
            created_at: now,
            updated_at: now,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn update_version(
        &self,
        user: Uuid,
        id: Uuid,
        cv_data: &Cv,
        template: &str,
        title: &str,
    ) -> Result<Option<CvVersionRow>, RemoteError> {
        self.checkpoint().await?;
        let now = self.next_now();
        let mut rows = self.rows.lock().unwrap();
        match rows.iter_mut().find(|r| r.user_id == user && r.id == id) {
            Some(row) => {
                row.cv_data = Json(cv_data.clone());
                row.template = template.to_string();
                row.title = title.to_string();
                row.updated_at = now;
                Ok(Some(row.clone()))
            }
            None => Ok(None),
        }
    }

    async fn set_active(&self, user: Uuid, id: Uuid) -> Result<Option<CvVersionRow>, RemoteError> {
        self.checkpoint().await?;
        let now = self.next_now();
        let mut rows = self.rows.lock().unwrap();
        // Unknown target leaves the current active record untouched.
        if !rows.iter().any(|r| r.user_id == user && r.id == id) {
            return Ok(None);
        }
        let mut activated = None;
        for row in rows.iter_mut().filter(|r| r.user_id == user) {
            let was = row.is_active;
            row.is_active = row.id == id;
            if was != row.is_active || row.id == id {
                row.updated_at = now;
            }
            if row.id == id {
                activated = Some(row.clone());
            }
        }
        Ok(activated)
    }

    async fn delete_version(&self, user: Uuid, id: Uuid) -> Result<bool, RemoteError> {
        self.checkpoint().await?;
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| !(r.user_id == user && r.id == id));
        Ok(rows.len() != before)
    }
}

/// Local fallback with injectable quota exhaustion.
#[derive(Default)]
pub struct MemoryLocal {
    map: Mutex<HashMap<String, String>>,
    quota_full: AtomicBool,
    writes: AtomicU64,
}

impl MemoryLocal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_quota_full(&self, full: bool) {
        self.quota_full.store(full, Ordering::SeqCst);
    }

    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }
}

impl LocalStore for MemoryLocal {
    fn get(&self, key: &str) -> Result<Option<String>, LocalStoreError> {
        Ok(self.map.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        if self.quota_full.load(Ordering::SeqCst) {
            return Err(LocalStoreError::QuotaExceeded);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.map
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
