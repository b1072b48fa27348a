//! Uniform add/update/remove/reorder semantics
//! over every ordered collection in the CV document. Each operation works on
//! in-memory state only and never fails; "not found" surfaces as an explicit
//! boolean so callers can distinguish "updated" from "already gone".

use thiserror::Error;

use crate::models::cv::{
    BulletPoint, CertificationEntry, CertificationPatch, Cv, EducationEntry, EducationPatch,
    EntryId, ExtracurricularEntry, ExtracurricularPatch, ProjectEntry, ProjectPatch, SkillEntry,
    SkillPatch, WorkExperienceEntry, WorkExperiencePatch,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReorderError {
    #[error("expected {expected} ids, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("id {0} is not part of the collection (or listed twice)")]
    ForeignOrDuplicateId(EntryId),
}

/// An identity-bearing member of an ordered collection. The patch type
/// carries no id field, so a patch can never overwrite an entry's identity.
pub trait Entity: Clone {
    type Patch;

    fn id(&self) -> EntryId;
    /// Type-specific default record carrying the given id.
    fn with_id(id: EntryId) -> Self;
    /// Shallow merge: set-valued patch fields replace, unset fields keep.
    fn apply(&mut self, patch: Self::Patch);
}

/// Binds an entity type to its collection inside the document, so the store
/// can expose one generic set of operations for all six sections.
pub trait CollectionOf: Entity {
    fn collection(cv: &Cv) -> &Vec<Self>;
    fn collection_mut(cv: &mut Cv) -> &mut Vec<Self>;
}

/// Assigns a fresh id, merges the caller's fields over the type default and
/// appends at the end of the collection.
pub fn add<T: Entity>(items: &mut Vec<T>, fields: T::Patch) -> EntryId {
    let id = EntryId::new();
    let mut entry = T::with_id(id);
    entry.apply(fields);
    items.push(entry);
    id
}

/// Merges `patch` into the matching entry. Returns whether a match was found;
/// unknown ids leave the collection untouched.
pub fn update<T: Entity>(items: &mut [T], id: EntryId, patch: T::Patch) -> bool {
    match items.iter_mut().find(|e| e.id() == id) {
        Some(entry) => {
            entry.apply(patch);
            true
        }
        None => false,
    }
}

/// Drops the matching entry, returning whether one existed. Anything the
/// entry owns (work-experience bullets) goes with it.
pub fn remove<T: Entity>(items: &mut Vec<T>, id: EntryId) -> bool {
    let before = items.len();
    items.retain(|e| e.id() != id);
    items.len() != before
}

/// Resolves an id list into the reordered collection. The list must be a
/// true permutation of the current ids: same length, every id present,
/// nothing listed twice. Entries are never created or destroyed here.
pub fn permute_by_ids<T: Entity>(items: &[T], ids: &[EntryId]) -> Result<Vec<T>, ReorderError> {
    if ids.len() != items.len() {
        return Err(ReorderError::LengthMismatch {
            expected: items.len(),
            got: ids.len(),
        });
    }
    let mut remaining: Vec<T> = items.to_vec();
    let mut reordered = Vec::with_capacity(ids.len());
    for id in ids {
        match remaining.iter().position(|e| e.id() == *id) {
            Some(index) => reordered.push(remaining.swap_remove(index)),
            None => return Err(ReorderError::ForeignOrDuplicateId(*id)),
        }
    }
    Ok(reordered)
}

macro_rules! impl_entity {
    ($entry:ty, $patch:ty, [$($field:ident),+ $(,)?]) => {
        impl Entity for $entry {
            type Patch = $patch;

            fn id(&self) -> EntryId {
                self.id
            }

            fn with_id(id: EntryId) -> Self {
                Self {
                    id,
                    ..Default::default()
                }
            }

            fn apply(&mut self, patch: Self::Patch) {
                $(
                    if let Some(v) = patch.$field {
                        self.$field = v;
                    }
                )+
            }
        }
    };
}

impl_entity!(
    EducationEntry,
    EducationPatch,
    [institution, degree, field, start_date, end_date, gpa, description]
);
impl_entity!(
    WorkExperienceEntry,
    WorkExperiencePatch,
    [company, role, location, start_date, end_date, is_current]
);
impl_entity!(SkillEntry, SkillPatch, [name, category, level]);
impl_entity!(
    ProjectEntry,
    ProjectPatch,
    [name, description, url, tech_stack, start_date, end_date]
);
impl_entity!(
    CertificationEntry,
    CertificationPatch,
    [name, issuer, issue_date, expiry_date, credential_id]
);
impl_entity!(
    ExtracurricularEntry,
    ExtracurricularPatch,
    [organization, role, description, start_date, end_date]
);

/// Bullet points patch with plain text; a one-field entity.
#[derive(Debug, Clone, Default)]
pub struct BulletPatch {
    pub text: Option<String>,
}

impl Entity for BulletPoint {
    type Patch = BulletPatch;

    fn id(&self) -> EntryId {
        self.id
    }

    fn with_id(id: EntryId) -> Self {
        BulletPoint {
            id,
            text: String::new(),
        }
    }

    fn apply(&mut self, patch: Self::Patch) {
        if let Some(v) = patch.text {
            self.text = v;
        }
    }
}

macro_rules! impl_collection_of {
    ($entry:ty, $field:ident) => {
        impl CollectionOf for $entry {
            fn collection(cv: &Cv) -> &Vec<Self> {
                &cv.$field
            }

            fn collection_mut(cv: &mut Cv) -> &mut Vec<Self> {
                &mut cv.$field
            }
        }
    };
}

impl_collection_of!(EducationEntry, education);
impl_collection_of!(WorkExperienceEntry, work_experience);
impl_collection_of!(SkillEntry, skills);
impl_collection_of!(ProjectEntry, projects);
impl_collection_of!(CertificationEntry, certifications);
impl_collection_of!(ExtracurricularEntry, extracurricular);

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_education() -> Vec<EducationEntry> {
        let mut items = Vec::new();
        add::<EducationEntry>(
            &mut items,
            EducationPatch {
                institution: Some("X".to_string()),
                degree: Some("Y".to_string()),
                ..Default::default()
            },
        );
        items
    }

    #[test]
    fn test_add_assigns_distinct_ids_and_preserves_insertion_order() {
        let mut items = sample_education();
        add::<EducationEntry>(
            &mut items,
            EducationPatch {
                institution: Some("Z".to_string()),
                degree: Some("W".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(items.len(), 2);
        assert_ne!(items[0].id, items[1].id);
        assert_eq!(items[0].institution, "X");
        assert_eq!(items[1].institution, "Z");
    }

    #[test]
    fn test_add_merges_over_type_default() {
        let mut items = Vec::new();
        add::<SkillEntry>(
            &mut items,
            SkillPatch {
                name: Some("Rust".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(items[0].name, "Rust");
        // Unset patch fields keep the default record's values.
        assert_eq!(items[0].category, "");
        assert_eq!(items[0].level, "");
    }

    #[test]
    fn test_add_then_remove_restores_prior_content() {
        let mut items = sample_education();
        let before = items.clone();
        let id = add::<EducationEntry>(
            &mut items,
            EducationPatch {
                institution: Some("Temp".to_string()),
                ..Default::default()
            },
        );
        assert!(remove(&mut items, id));
        assert_eq!(items, before);
    }

    #[test]
    fn test_update_unknown_id_is_noop_returning_false() {
        let mut items = sample_education();
        let before = items.clone();
        let found = update(
            &mut items,
            EntryId::new(),
            EducationPatch {
                institution: Some("Nope".to_string()),
                ..Default::default()
            },
        );
        assert!(!found);
        assert_eq!(items, before);
    }

    #[test]
    fn test_update_preserves_id_and_unset_fields() {
        let mut items = sample_education();
        let id = items[0].id;
        assert!(update(
            &mut items,
            id,
            EducationPatch {
                degree: Some("PhD".to_string()),
                ..Default::default()
            },
        ));
        assert_eq!(items[0].id, id);
        assert_eq!(items[0].institution, "X");
        assert_eq!(items[0].degree, "PhD");
    }

    #[test]
    fn test_update_last_patch_per_key_wins() {
        let mut items = sample_education();
        let id = items[0].id;
        update(
            &mut items,
            id,
            EducationPatch {
                degree: Some("MSc".to_string()),
                gpa: Some("3.9".to_string()),
                ..Default::default()
            },
        );
        update(
            &mut items,
            id,
            EducationPatch {
                degree: Some("PhD".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(items[0].degree, "PhD");
        assert_eq!(items[0].gpa, "3.9");
    }

    #[test]
    fn test_remove_unknown_id_returns_false() {
        let mut items = sample_education();
        assert!(!remove(&mut items, EntryId::new()));
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_permute_by_ids_keeps_id_multiset() {
        let mut items = Vec::new();
        let a = add::<SkillEntry>(&mut items, SkillPatch::default());
        let b = add::<SkillEntry>(&mut items, SkillPatch::default());
        let c = add::<SkillEntry>(&mut items, SkillPatch::default());

        items = permute_by_ids(&items, &[b, c, a]).unwrap();

        let ids: Vec<_> = items.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![b, c, a]);
    }

    #[test]
    fn test_permute_by_ids_rejects_wrong_length() {
        let items = sample_education();
        let result = permute_by_ids(&items, &[]);
        assert_eq!(
            result.unwrap_err(),
            ReorderError::LengthMismatch {
                expected: 1,
                got: 0
            }
        );
    }

    #[test]
    fn test_permute_by_ids_rejects_foreign_and_duplicate_ids() {
        let mut items = Vec::new();
        let a = add::<SkillEntry>(&mut items, SkillPatch::default());
        add::<SkillEntry>(&mut items, SkillPatch::default());

        let foreign = EntryId::new();
        assert_eq!(
            permute_by_ids(&items, &[a, foreign]).unwrap_err(),
            ReorderError::ForeignOrDuplicateId(foreign)
        );
        assert_eq!(
            permute_by_ids(&items, &[a, a]).unwrap_err(),
            ReorderError::ForeignOrDuplicateId(a)
        );
    }

    #[test]
    fn test_bullet_entity_patch() {
        let mut bullets = Vec::new();
        let id = add::<BulletPoint>(
            &mut bullets,
            BulletPatch {
                text: Some("shipped the thing".to_string()),
            },
        );
        assert!(update(&mut bullets, id, BulletPatch { text: None }));
        assert_eq!(bullets[0].text, "shipped the thing");
    }
}
