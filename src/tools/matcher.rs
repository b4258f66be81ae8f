//! Personalization matching.
//!
//! Ranks the sender's skills and achievements by how specifically they relate
//! to the researched company.

use serde::{Deserialize, Serialize};

use crate::core::{MatcherConfig, SenderProfile};

use super::research::ResearchResult;
use super::text::{contains_phrase, keywords};
use super::Matcher;

/// Skills relevant to almost any technical buyer.
const BROAD_TECH_KEYWORDS: &[&str] = &[
    "python", "javascript", "typescript", "rust", "go", "golang", "java", "kotlin", "swift",
    "ai", "ml", "machine learning", "data", "analytics", "cloud", "aws", "azure", "gcp",
    "kubernetes", "docker", "devops", "sql", "react", "security", "api", "automation",
];

/// Industries that get a relevance bonus.
const PRIORITY_INDUSTRIES: &[&str] = &["Technology", "Financial Services"];

const INDUSTRY_BONUS: f64 = 0.25;
const LOW_CONFIDENCE_CAP: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AngleKind {
    Skill,
    Achievement,
}

/// One personalization angle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Angle {
    pub topic: String,
    pub rationale: String,
    pub kind: AngleKind,
    /// 3 = named in the research, 2 = shares a keyword, 1 = broadly relevant.
    pub specificity: u8,
}

impl Angle {
    fn weight(&self) -> f64 {
        match self.specificity {
            3 => 0.4,
            2 => 0.3,
            1 => 0.2,
            _ => 0.0,
        }
    }
}

/// Ranked angles plus an overall relevance score in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalizationMatch {
    pub angles: Vec<Angle>,
    pub relevance_score: f64,
}

impl PersonalizationMatch {
    pub fn top_angle(&self) -> Option<&Angle> {
        self.angles.first()
    }
}

/// The profile matcher tool.
#[derive(Debug, Clone)]
pub struct ProfileMatcherTool {
    max_angles: usize,
}

impl Default for ProfileMatcherTool {
    fn default() -> Self {
        Self::new(&MatcherConfig::default())
    }
}

impl ProfileMatcherTool {
    pub fn new(config: &MatcherConfig) -> Self {
        Self {
            max_angles: config.max_angles,
        }
    }

    fn skill_angle(skill: &str, research: &ResearchResult, text: &str) -> Option<Angle> {
        let (specificity, rationale) = if !text.is_empty() && contains_phrase(text, skill) {
            (
                3,
                format!("{} comes up in what {} is working on", skill, research.company),
            )
        } else if is_broad_tech(skill) {
            (
                1,
                format!("{} is broadly relevant to {} teams", skill, research.industry),
            )
        } else {
            return None;
        };
        Some(Angle {
            topic: skill.to_string(),
            rationale,
            kind: AngleKind::Skill,
            specificity,
        })
    }

    fn achievement_angle(
        achievement: &str,
        research: &ResearchResult,
        text: &str,
    ) -> Option<Angle> {
        if text.is_empty() {
            return None;
        }
        let research_words = keywords(text);
        let mut shared: Vec<String> = keywords(achievement)
            .into_iter()
            .filter(|w| research_words.contains(w))
            .collect();
        shared.sort();
        let keyword = shared.into_iter().next()?;

        Some(Angle {
            topic: achievement.to_string(),
            rationale: format!("relates to {}'s focus on {}", research.company, keyword),
            kind: AngleKind::Achievement,
            specificity: 2,
        })
    }
}

impl Matcher for ProfileMatcherTool {
    fn match_profile(
        &self,
        profile: &SenderProfile,
        research: &ResearchResult,
    ) -> PersonalizationMatch {
        // A degraded summary carries no information about the company.
        let text = if research.is_degraded() {
            String::new()
        } else {
            research.text()
        };

        let skills = profile
            .skills
            .iter()
            .filter_map(|s| Self::skill_angle(s, research, &text));
        let achievements = profile
            .achievements
            .iter()
            .filter_map(|a| Self::achievement_angle(a, research, &text));
        let mut angles: Vec<Angle> = skills.chain(achievements).collect();

        angles.sort_by(|a, b| b.specificity.cmp(&a.specificity));
        angles.truncate(self.max_angles);

        let mut score: f64 = angles.iter().map(Angle::weight).sum();
        if PRIORITY_INDUSTRIES.contains(&research.industry.as_str()) {
            score += INDUSTRY_BONUS;
        }
        let mut relevance_score = score.min(1.0);
        if research.is_degraded() {
            relevance_score = relevance_score.min(LOW_CONFIDENCE_CAP);
        }

        tracing::debug!(
            company = %research.company,
            angles = angles.len(),
            relevance = relevance_score,
            "Matched profile"
        );
        PersonalizationMatch {
            angles,
            relevance_score,
        }
    }
}

fn is_broad_tech(skill: &str) -> bool {
    let lower = skill.to_lowercase();
    BROAD_TECH_KEYWORDS.iter().any(|k| contains_phrase(&lower, k))
}

#[cfg(test)]
mod tests {
    use super::super::research::Confidence;
    use super::*;

    fn research(summary: &str, signals: &[&str], confidence: Confidence) -> ResearchResult {
        ResearchResult {
            company: "TechCorp".to_string(),
            industry: "Technology".to_string(),
            summary: summary.to_string(),
            signals: signals.iter().map(|s| s.to_string()).collect(),
            confidence,
        }
    }

    fn profile() -> SenderProfile {
        SenderProfile::new("Alex Kim")
            .with_skills(["Python", "Kubernetes", "Negotiation"])
            .with_achievements([
                "Led a cloud migration for a payments platform",
                "Won a chess tournament",
            ])
    }

    #[test]
    fn test_mentioned_skill_ranks_first() {
        let research = research(
            "Platform team runs on Kubernetes",
            &["cloud migration underway"],
            Confidence::High,
        );
        let matched = ProfileMatcherTool::default().match_profile(&profile(), &research);

        let topics: Vec<_> = matched.angles.iter().map(|a| a.topic.as_str()).collect();
        assert_eq!(
            topics,
            vec!["Kubernetes", "Led a cloud migration for a payments platform", "Python"]
        );
        assert_eq!(matched.angles[0].specificity, 3);
        assert_eq!(matched.angles[1].kind, AngleKind::Achievement);
        // 0.4 + 0.3 + 0.2 + 0.25 capped at 1.0
        assert!((matched.relevance_score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unrelated_items_are_dropped() {
        let research = research("Retail chain", &[], Confidence::Medium);
        let matched = ProfileMatcherTool::default().match_profile(&profile(), &research);
        assert!(matched.angles.iter().all(|a| a.topic != "Negotiation"));
        assert!(matched.angles.iter().all(|a| a.topic != "Won a chess tournament"));
    }

    #[test]
    fn test_low_confidence_caps_relevance() {
        let mut degraded = ResearchResult::degraded("TechCorp");
        degraded.industry = "Technology".to_string();
        let rich =
            SenderProfile::new("Alex").with_skills(["Python", "Rust", "AWS", "SQL", "Docker"]);

        let matched = ProfileMatcherTool::default().match_profile(&rich, &degraded);
        assert!(matched.relevance_score <= 0.5);
        assert!(matched.angles.iter().all(|a| a.specificity == 1));
    }

    #[test]
    fn test_angles_truncated_to_max() {
        let research = research("Python Rust AWS SQL Docker Go shop", &[], Confidence::High);
        let many = SenderProfile::new("Alex")
            .with_skills(["Python", "Rust", "AWS", "SQL", "Docker", "Go"]);
        let matcher = ProfileMatcherTool::new(&MatcherConfig { max_angles: 3 });

        let matched = matcher.match_profile(&many, &research);
        assert_eq!(matched.angles.len(), 3);
        assert_eq!(matched.angles[0].topic, "Python");
    }

    #[test]
    fn test_end_to_end_python_angle() {
        let research = research("TechCorp is planning a cloud migration", &[], Confidence::High);
        let sender = SenderProfile::new("Alex").with_skills(["Python"]);

        let matched = ProfileMatcherTool::default().match_profile(&sender, &research);
        assert_eq!(matched.top_angle().map(|a| a.topic.as_str()), Some("Python"));
        assert!((matched.relevance_score - 0.45).abs() < 1e-9);
    }
}
