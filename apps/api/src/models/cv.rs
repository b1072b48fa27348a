use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identity for an entry inside one of the CV's ordered collections.
/// Assigned at creation, never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The complete in-memory CV document: one scalar personal-info record,
/// six ordered entry collections, presentation settings, and optional
/// job-targeting provenance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cv {
    pub personal_info: PersonalInfo,
    pub education: Vec<EducationEntry>,
    pub work_experience: Vec<WorkExperienceEntry>,
    pub skills: Vec<SkillEntry>,
    pub projects: Vec<ProjectEntry>,
    pub certifications: Vec<CertificationEntry>,
    pub extracurricular: Vec<ExtracurricularEntry>,
    /// Opaque to the store; the rendering side owns fallback for unknown ids.
    pub template_id: String,
    pub section_order: Vec<SectionSetting>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub job_specific: Option<JobSpecific>,
}

impl Default for Cv {
    fn default() -> Self {
        Cv {
            personal_info: PersonalInfo::default(),
            education: Vec::new(),
            work_experience: Vec::new(),
            skills: Vec::new(),
            projects: Vec::new(),
            certifications: Vec::new(),
            extracurricular: Vec::new(),
            template_id: "classic".to_string(),
            section_order: default_section_order(),
            job_specific: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PersonalInfo {
    pub full_name: String,
    pub headline: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub website: String,
    pub summary: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalInfoPatch {
    pub full_name: Option<String>,
    pub headline: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub summary: Option<String>,
}

impl PersonalInfo {
    pub fn apply(&mut self, patch: PersonalInfoPatch) {
        if let Some(v) = patch.full_name {
            self.full_name = v;
        }
        if let Some(v) = patch.headline {
            self.headline = v;
        }
        if let Some(v) = patch.email {
            self.email = v;
        }
        if let Some(v) = patch.phone {
            self.phone = v;
        }
        if let Some(v) = patch.location {
            self.location = v;
        }
        if let Some(v) = patch.website {
            self.website = v;
        }
        if let Some(v) = patch.summary {
            self.summary = v;
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Collection entries. Dates stay free-form strings: they come straight from
// form fields ("2021-06", "Present") and the store treats them as opaque.
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EducationEntry {
    pub id: EntryId,
    pub institution: String,
    pub degree: String,
    pub field: String,
    pub start_date: String,
    pub end_date: String,
    pub gpa: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EducationPatch {
    pub institution: Option<String>,
    pub degree: Option<String>,
    pub field: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub gpa: Option<String>,
    pub description: Option<String>,
}

/// A single line under a work-experience entry. Owned by its parent entry;
/// deleting the parent discards its bullets.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BulletPoint {
    pub id: EntryId,
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkExperienceEntry {
    pub id: EntryId,
    pub company: String,
    pub role: String,
    pub location: String,
    pub start_date: String,
    pub end_date: String,
    /// Several entries may independently be current (parallel roles).
    pub is_current: bool,
    pub bullets: Vec<BulletPoint>,
}

/// Bullets are managed through their own nested operations, so the patch
/// deliberately carries no `bullets` field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkExperiencePatch {
    pub company: Option<String>,
    pub role: Option<String>,
    pub location: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub is_current: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SkillEntry {
    pub id: EntryId,
    pub name: String,
    pub category: String,
    pub level: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub level: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectEntry {
    pub id: EntryId,
    pub name: String,
    pub description: String,
    pub url: String,
    pub tech_stack: Vec<String>,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub tech_stack: Option<Vec<String>>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CertificationEntry {
    pub id: EntryId,
    pub name: String,
    pub issuer: String,
    pub issue_date: String,
    pub expiry_date: String,
    pub credential_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificationPatch {
    pub name: Option<String>,
    pub issuer: Option<String>,
    pub issue_date: Option<String>,
    pub expiry_date: Option<String>,
    pub credential_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExtracurricularEntry {
    pub id: EntryId,
    pub organization: String,
    pub role: String,
    pub description: String,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtracurricularPatch {
    pub organization: Option<String>,
    pub role: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Section ordering
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Education,
    WorkExperience,
    Skills,
    Projects,
    Certifications,
    Extracurricular,
}

impl SectionKind {
    pub const ALL: [SectionKind; 6] = [
        SectionKind::WorkExperience,
        SectionKind::Education,
        SectionKind::Skills,
        SectionKind::Projects,
        SectionKind::Certifications,
        SectionKind::Extracurricular,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            SectionKind::Education => "Education",
            SectionKind::WorkExperience => "Work Experience",
            SectionKind::Skills => "Skills",
            SectionKind::Projects => "Projects",
            SectionKind::Certifications => "Certifications",
            SectionKind::Extracurricular => "Extracurricular",
        }
    }
}

/// One row of the user-customizable section ordering. `order` mirrors the
/// array position; callers submitting a new ordering keep it consistent,
/// the store does not re-derive it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SectionSetting {
    pub id: SectionKind,
    pub name: String,
    pub enabled: bool,
    pub order: usize,
}

pub fn default_section_order() -> Vec<SectionSetting> {
    SectionKind::ALL
        .iter()
        .enumerate()
        .map(|(i, kind)| SectionSetting {
            id: *kind,
            name: kind.display_name().to_string(),
            enabled: true,
            order: i,
        })
        .collect()
}

/// Provenance stamped on a document derived from a job-targeted
/// optimization pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobSpecific {
    pub job_title: String,
    pub company: String,
    pub applied_optimizations: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_section_order_covers_every_section_once() {
        let order = default_section_order();
        assert_eq!(order.len(), SectionKind::ALL.len());
        for (i, setting) in order.iter().enumerate() {
            assert_eq!(setting.order, i);
            assert!(setting.enabled);
        }
        let mut kinds: Vec<_> = order.iter().map(|s| s.id).collect();
        kinds.sort_by_key(|k| format!("{k:?}"));
        kinds.dedup();
        assert_eq!(kinds.len(), SectionKind::ALL.len());
    }

    #[test]
    fn test_personal_info_patch_preserves_unset_fields() {
        let mut info = PersonalInfo {
            full_name: "Jane Doe".to_string(),
            email: "jane@example.com".to_string(),
            ..Default::default()
        };
        info.apply(PersonalInfoPatch {
            headline: Some("Engineer".to_string()),
            ..Default::default()
        });
        assert_eq!(info.full_name, "Jane Doe");
        assert_eq!(info.email, "jane@example.com");
        assert_eq!(info.headline, "Engineer");
    }

    #[test]
    fn test_absent_job_specific_is_omitted_from_json() {
        let cv = Cv::default();
        let json = serde_json::to_string(&cv).unwrap();
        assert!(!json.contains("job_specific"));
    }

    #[test]
    fn test_cv_round_trips_through_json() {
        let mut cv = Cv::default();
        cv.personal_info.full_name = "Jane Doe".to_string();
        cv.education.push(EducationEntry {
            institution: "X".to_string(),
            ..Default::default()
        });
        let json = serde_json::to_string(&cv).unwrap();
        let back: Cv = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cv);
    }
}
