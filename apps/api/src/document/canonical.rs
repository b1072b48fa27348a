//! Pre-save canonicalization. The persisted snapshot is a deep clone of the
//! in-memory document with noise removed: bullet points whose text is empty
//! or whitespace-only are dropped. Optional fields that are absent serialize
//! as absent (serde skips them); concrete empty values ("" / 0 / false) are
//! real data and are never stripped.

use crate::models::cv::Cv;

pub fn canonicalize(doc: &Cv) -> Cv {
    let mut snapshot = doc.clone();
    for entry in &mut snapshot.work_experience {
        entry.bullets.retain(|b| !b.text.trim().is_empty());
    }
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::cv::{BulletPoint, EntryId, WorkExperienceEntry};

    fn bullet(text: &str) -> BulletPoint {
        BulletPoint {
            id: EntryId::new(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_blank_bullets_dropped_keeping_relative_order() {
        let mut doc = Cv::default();
        doc.work_experience.push(WorkExperienceEntry {
            bullets: vec![bullet("a"), bullet("   "), bullet("b"), bullet("")],
            ..Default::default()
        });

        let snapshot = canonicalize(&doc);
        let texts: Vec<_> = snapshot.work_experience[0]
            .bullets
            .iter()
            .map(|b| b.text.as_str())
            .collect();
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[test]
    fn test_source_document_is_untouched() {
        let mut doc = Cv::default();
        doc.work_experience.push(WorkExperienceEntry {
            bullets: vec![bullet("  ")],
            ..Default::default()
        });
        let _ = canonicalize(&doc);
        assert_eq!(doc.work_experience[0].bullets.len(), 1);
    }

    #[test]
    fn test_empty_scalar_values_survive() {
        let mut doc = Cv::default();
        doc.personal_info.full_name = String::new();
        doc.work_experience.push(WorkExperienceEntry {
            company: String::new(),
            is_current: false,
            ..Default::default()
        });

        let snapshot = canonicalize(&doc);
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"full_name\":\"\""));
        assert!(json.contains("\"company\":\"\""));
        assert!(json.contains("\"is_current\":false"));
    }
}
