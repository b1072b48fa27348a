//! Job-targeting optimizer: a pluggable, trait-based collaborator that reads
//! a CV snapshot against a free-text job description and proposes mutations.
//! It never touches the document directly: applying a suggestion routes
//! through the store's normal add/update operations and stamps provenance.
//!
//! Default backend: `KeywordOptimizer` (pure-Rust, deterministic).

pub mod handlers;

use std::collections::BTreeMap;
use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::store::CvStore;
use crate::errors::AppError;
use crate::models::cv::{Cv, PersonalInfoPatch, SkillEntry, SkillPatch};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Suggestion {
    /// The job description mentions a skill the CV does not list.
    AddSkill { name: String },
    /// The CV covers this keyword but the summary never mentions it.
    EmphasizeKeyword { keyword: String },
}

impl Suggestion {
    /// Provenance label recorded on the document when applied.
    pub fn label(&self) -> String {
        match self {
            Suggestion::AddSkill { name } => format!("add_skill:{name}"),
            Suggestion::EmphasizeKeyword { keyword } => format!("emphasize:{keyword}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationReport {
    /// Share of job keywords the CV already covers, 0 - 100.
    pub coverage_score: u32,
    pub matched_keywords: Vec<String>,
    pub suggestions: Vec<Suggestion>,
}

/// Swap backends without touching handlers or callers.
/// Carried in `AppState` as `Arc<dyn Optimizer>`.
#[async_trait]
pub trait Optimizer: Send + Sync {
    async fn analyze(&self, cv: &Cv, job_text: &str) -> Result<OptimizationReport, AppError>;
}

pub struct KeywordOptimizer;

#[async_trait]
impl Optimizer for KeywordOptimizer {
    async fn analyze(&self, cv: &Cv, job_text: &str) -> Result<OptimizationReport, AppError> {
        Ok(compute_keyword_report(cv, job_text))
    }
}

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "have", "in", "is",
    "it", "of", "on", "or", "our", "that", "the", "this", "to", "we", "will", "with", "you",
    "your", "who", "what", "work", "team", "role", "years", "experience", "strong",
];

/// Keywords are job-description tokens seen at least twice, most frequent
/// first. Deterministic on its input; no model calls.
fn extract_keywords(job_text: &str) -> Vec<String> {
    let mut counts: BTreeMap<String, u32> = BTreeMap::new();
    // '+' and '#' stay token characters so "c++" and "c#" survive.
    for raw in job_text.split(|c: char| !(c.is_alphanumeric() || c == '+' || c == '#')) {
        let token = raw.to_lowercase();
        if token.len() < 2 || STOP_WORDS.contains(&token.as_str()) {
            continue;
        }
        if token.chars().all(|c| c == '+' || c == '#') {
            continue;
        }
        *counts.entry(token).or_insert(0) += 1;
    }

    let mut keywords: Vec<(String, u32)> =
        counts.into_iter().filter(|(_, n)| *n >= 2).collect();
    keywords.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    keywords.into_iter().take(20).map(|(k, _)| k).collect()
}

fn compute_keyword_report(cv: &Cv, job_text: &str) -> OptimizationReport {
    let keywords = extract_keywords(job_text);
    if keywords.is_empty() {
        return OptimizationReport {
            coverage_score: 0,
            matched_keywords: vec![],
            suggestions: vec![],
        };
    }

    let skill_names: HashSet<String> = cv
        .skills
        .iter()
        .map(|s| s.name.to_lowercase())
        .collect();
    let prose = cv_prose(cv);
    let summary = cv.personal_info.summary.to_lowercase();

    let mut matched = Vec::new();
    let mut suggestions = Vec::new();

    for keyword in &keywords {
        let covered = skill_names.contains(keyword) || prose.contains(keyword.as_str());
        if covered {
            matched.push(keyword.clone());
            if !summary.contains(keyword.as_str()) {
                suggestions.push(Suggestion::EmphasizeKeyword {
                    keyword: keyword.clone(),
                });
            }
        } else {
            suggestions.push(Suggestion::AddSkill {
                name: keyword.clone(),
            });
        }
    }

    let coverage_score =
        ((matched.len() as f32 / keywords.len() as f32) * 100.0).round() as u32;
    OptimizationReport {
        coverage_score,
        matched_keywords: matched,
        suggestions,
    }
}

/// Lowercased searchable text of the CV outside the skills list.
fn cv_prose(cv: &Cv) -> String {
    let mut text = String::new();
    text.push_str(&cv.personal_info.summary);
    text.push(' ');
    text.push_str(&cv.personal_info.headline);
    for entry in &cv.work_experience {
        text.push(' ');
        text.push_str(&entry.role);
        for bullet in &entry.bullets {
            text.push(' ');
            text.push_str(&bullet.text);
        }
    }
    for project in &cv.projects {
        text.push(' ');
        text.push_str(&project.description);
        for tech in &project.tech_stack {
            text.push(' ');
            text.push_str(tech);
        }
    }
    for skill in &cv.skills {
        text.push(' ');
        text.push_str(&skill.category);
    }
    text.to_lowercase()
}

/// Applies one suggestion through the store's normal operations. Returns
/// whether anything changed (re-applying is a no-op, not an error).
pub fn apply_suggestion(
    store: &CvStore,
    suggestion: &Suggestion,
    job_title: &str,
    company: &str,
) -> bool {
    let applied = match suggestion {
        Suggestion::AddSkill { name } => {
            let exists = store
                .entries::<SkillEntry>()
                .iter()
                .any(|s| s.name.eq_ignore_ascii_case(name));
            if exists {
                false
            } else {
                store.add_entry::<SkillEntry>(SkillPatch {
                    name: Some(name.clone()),
                    ..Default::default()
                });
                true
            }
        }
        Suggestion::EmphasizeKeyword { keyword } => {
            let summary = store.snapshot().personal_info.summary;
            if summary.to_lowercase().contains(&keyword.to_lowercase()) {
                false
            } else {
                let separator = if summary.trim_end().ends_with('.') || summary.is_empty() {
                    " "
                } else {
                    ". "
                };
                store.update_personal_info(PersonalInfoPatch {
                    summary: Some(format!("{summary}{separator}{keyword}").trim().to_string()),
                    ..Default::default()
                });
                true
            }
        }
    };

    if applied {
        store.record_optimization(job_title, company, suggestion.label());
    }
    applied
}
