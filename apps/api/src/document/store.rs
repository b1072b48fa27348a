//! The per-session CV store: owns the canonical in-memory document and
//! exposes field-level updates plus the generic collection operations.
//! Stores are plain injected values, never globals; tests spin up as many
//! independent instances as they need.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{watch, Notify};

use crate::document::collection::{self, BulletPatch, CollectionOf, ReorderError};
use crate::document::status::{SaveStatus, StatusCell};
use crate::models::cv::{
    BulletPoint, Cv, EntryId, JobSpecific, PersonalInfoPatch, SectionSetting,
};
use crate::storage::{AuthProvider, LocalStore, RemoteStore};

#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Mutations settle for this long before a save fires; zero disables
    /// coalescing entirely.
    pub debounce: Duration,
    pub retry_backoff: Duration,
    pub data_call_timeout: Duration,
    pub auth_timeout: Duration,
    pub saved_reset_after: Duration,
    pub error_reset_after: Duration,
    /// Well-known key of the current-document slot in the local store.
    pub local_key: String,
}

impl Default for StoreOptions {
    fn default() -> Self {
        StoreOptions {
            debounce: Duration::from_millis(2000),
            retry_backoff: Duration::from_millis(1000),
            data_call_timeout: Duration::from_secs(10),
            auth_timeout: Duration::from_secs(5),
            saved_reset_after: Duration::from_secs(2),
            error_reset_after: Duration::from_secs(4),
            local_key: "folio.cv.current".to_string(),
        }
    }
}

pub struct CvStore {
    doc: Mutex<Cv>,
    pub(crate) status: Arc<StatusCell>,
    pub(crate) remote: Arc<dyn RemoteStore>,
    pub(crate) local: Arc<dyn LocalStore>,
    pub(crate) auth: Arc<dyn AuthProvider>,
    pub(crate) dirty: Notify,
    pub(crate) saving: AtomicBool,
    pub(crate) opts: StoreOptions,
}

impl CvStore {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        local: Arc<dyn LocalStore>,
        auth: Arc<dyn AuthProvider>,
        opts: StoreOptions,
    ) -> Arc<Self> {
        Arc::new(CvStore {
            doc: Mutex::new(Cv::default()),
            status: StatusCell::new(),
            remote,
            local,
            auth,
            dirty: Notify::new(),
            saving: AtomicBool::new(false),
            opts,
        })
    }

    fn read<R>(&self, f: impl FnOnce(&Cv) -> R) -> R {
        f(&self.doc.lock().expect("cv document lock poisoned"))
    }

    /// Runs a mutation and schedules persistence.
    fn mutate<R>(&self, f: impl FnOnce(&mut Cv) -> R) -> R {
        let result = f(&mut self.doc.lock().expect("cv document lock poisoned"));
        self.dirty.notify_one();
        result
    }

    /// Like `mutate`, but schedules persistence only when the closure
    /// succeeds; a rejected mutation leaves the document untouched.
    fn try_mutate<R, E>(&self, f: impl FnOnce(&mut Cv) -> Result<R, E>) -> Result<R, E> {
        let result = f(&mut self.doc.lock().expect("cv document lock poisoned"));
        if result.is_ok() {
            self.dirty.notify_one();
        }
        result
    }

    // ── aggregate-level operations ──────────────────────────────────────

    /// Read-only clone for rendering/export collaborators.
    pub fn snapshot(&self) -> Cv {
        self.read(|cv| cv.clone())
    }

    pub fn update_personal_info(&self, patch: PersonalInfoPatch) {
        self.mutate(|cv| cv.personal_info.apply(patch));
    }

    /// Unknown template ids are tolerated; rendering owns the fallback.
    pub fn set_template(&self, template_id: String) {
        self.mutate(|cv| cv.template_id = template_id);
    }

    /// Wholesale replacement; the caller keeps `order` consistent with the
    /// array position, the store does not re-derive it.
    pub fn update_section_order(&self, sections: Vec<SectionSetting>) {
        self.mutate(|cv| cv.section_order = sections);
    }

    /// Back to the default empty document. Reset is a mutation: the default
    /// document propagates to persistence like any other edit.
    pub fn reset(&self) {
        self.mutate(|cv| *cv = Cv::default());
    }

    /// Wholesale replacement on load or version switch. Loading is not a
    /// mutation, so no save is scheduled.
    pub fn replace(&self, doc: Cv) {
        *self.doc.lock().expect("cv document lock poisoned") = doc;
    }

    pub fn status(&self) -> SaveStatus {
        self.status.get()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SaveStatus> {
        self.status.subscribe()
    }

    // ── generic collection operations ───────────────────────────────────

    pub fn entries<T: CollectionOf>(&self) -> Vec<T> {
        self.read(|cv| T::collection(cv).clone())
    }

    pub fn add_entry<T: CollectionOf>(&self, fields: T::Patch) -> EntryId {
        self.mutate(|cv| collection::add(T::collection_mut(cv), fields))
    }

    pub fn update_entry<T: CollectionOf>(&self, id: EntryId, patch: T::Patch) -> bool {
        self.mutate(|cv| collection::update(T::collection_mut(cv), id, patch))
    }

    pub fn remove_entry<T: CollectionOf>(&self, id: EntryId) -> bool {
        self.mutate(|cv| collection::remove(T::collection_mut(cv), id))
    }

    /// Validates the id list against the collection and applies it in one
    /// step under the document lock, so a concurrent add or remove cannot
    /// slip between the check and the replacement.
    pub fn reorder_entries_by_ids<T: CollectionOf>(
        &self,
        ids: &[EntryId],
    ) -> Result<(), ReorderError> {
        self.try_mutate(|cv| {
            let items = T::collection_mut(cv);
            let reordered = collection::permute_by_ids(items, ids)?;
            *items = reordered;
            Ok(())
        })
    }

    // ── nested bullet-point operations ──────────────────────────────────

    pub fn add_bullet(&self, experience: EntryId, text: String) -> Option<EntryId> {
        self.mutate(|cv| {
            cv.work_experience
                .iter_mut()
                .find(|e| e.id == experience)
                .map(|entry| {
                    collection::add::<BulletPoint>(
                        &mut entry.bullets,
                        BulletPatch { text: Some(text) },
                    )
                })
        })
    }

    pub fn update_bullet(&self, experience: EntryId, bullet: EntryId, text: String) -> bool {
        self.mutate(|cv| {
            cv.work_experience
                .iter_mut()
                .find(|e| e.id == experience)
                .map(|entry| {
                    collection::update(&mut entry.bullets, bullet, BulletPatch { text: Some(text) })
                })
                .unwrap_or(false)
        })
    }

    pub fn remove_bullet(&self, experience: EntryId, bullet: EntryId) -> bool {
        self.mutate(|cv| {
            cv.work_experience
                .iter_mut()
                .find(|e| e.id == experience)
                .map(|entry| collection::remove(&mut entry.bullets, bullet))
                .unwrap_or(false)
        })
    }

    /// Checked like `reorder_entries_by_ids`; `Ok(false)` means the parent
    /// experience entry does not exist.
    pub fn reorder_bullets_by_ids(
        &self,
        experience: EntryId,
        ids: &[EntryId],
    ) -> Result<bool, ReorderError> {
        self.try_mutate(|cv| {
            match cv.work_experience.iter_mut().find(|e| e.id == experience) {
                Some(entry) => {
                    entry.bullets = collection::permute_by_ids(&entry.bullets, ids)?;
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    // ── job-targeting provenance ────────────────────────────────────────

    /// Stamps the document as derived from a job-targeted optimization pass
    /// and records which suggestion was applied.
    pub fn record_optimization(&self, job_title: &str, company: &str, label: String) {
        self.mutate(|cv| match &mut cv.job_specific {
            Some(meta) => meta.applied_optimizations.push(label),
            None => {
                cv.job_specific = Some(JobSpecific {
                    job_title: job_title.to_string(),
                    company: company.to_string(),
                    applied_optimizations: vec![label],
                    created_at: chrono::Utc::now(),
                });
            }
        });
    }
}
