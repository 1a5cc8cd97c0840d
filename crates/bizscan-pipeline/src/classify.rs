//! Heuristic Classifier: keyword tables mapping free text to automation
//! risk, labor intensity and visit frequency.
//!
//! The tables are plain data (`rules/classifier.yaml` can replace them);
//! the functions here only walk them in priority order.

use std::path::Path;

use anyhow::{Context, Result};
use bizscan_core::{extract_first_integer, CandidateRecord, LaborIntensity, VisitFrequency};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const AI_RISK_HIGH: &str = "High risk — involves routine tasks easily automated";
pub const AI_RISK_LOW: &str = "Low risk — requires physical presence or specialized expertise";
pub const AI_RISK_MEDIUM: &str = "Medium risk — requires further analysis";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationRiskRules {
    pub high: Vec<String>,
    pub low: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaborRules {
    pub high: Vec<String>,
    pub low: Vec<String>,
    /// Headcounts strictly above this are high-labor.
    pub high_headcount_above: u64,
    /// Headcounts strictly below this are low-labor.
    pub low_headcount_below: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitRule {
    pub frequency: VisitFrequency,
    pub contains_any: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierRules {
    pub version: u32,
    pub automation_risk: AutomationRiskRules,
    pub labor_intensity: LaborRules,
    /// Checked in order; the first matching rule wins.
    pub visit_frequency: Vec<VisitRule>,
    pub visit_default: VisitFrequency,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for AutomationRiskRules {
    fn default() -> Self {
        Self {
            high: words(&[
                "data entry",
                "customer service",
                "bookkeeping",
                "accounting",
                "translation",
                "transcription",
                "content writing",
                "marketing",
            ]),
            low: words(&[
                "manufacturing",
                "logistics",
                "construction",
                "plumbing",
                "electrical",
                "specialized",
                "custom",
                "hands-on",
                "physical",
            ]),
        }
    }
}

impl Default for LaborRules {
    fn default() -> Self {
        Self {
            high: words(&[
                "restaurant",
                "retail",
                "customer service",
                "call center",
                "hospitality",
                "cleaning",
                "maintenance staff",
            ]),
            low: words(&[
                "automated",
                "technology",
                "software",
                "equipment rental",
                "self-service",
                "online",
                "digital",
            ]),
            high_headcount_above: 20,
            low_headcount_below: 5,
        }
    }
}

impl Default for ClassifierRules {
    fn default() -> Self {
        Self {
            version: 1,
            automation_risk: AutomationRiskRules::default(),
            labor_intensity: LaborRules::default(),
            visit_frequency: vec![
                VisitRule {
                    frequency: VisitFrequency::Daily,
                    contains_any: words(&["restaurant", "retail", "customer service"]),
                },
                VisitRule {
                    frequency: VisitFrequency::Weekly,
                    contains_any: words(&["office", "consulting", "services"]),
                },
                VisitRule {
                    frequency: VisitFrequency::Monthly,
                    contains_any: words(&["rental", "storage", "equipment", "property"]),
                },
            ],
            visit_default: VisitFrequency::Weekly,
        }
    }
}

/// Labels assigned to one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub ai_disruptability: &'static str,
    pub labor_intensity: LaborIntensity,
    pub visit_frequency: VisitFrequency,
}

#[derive(Debug, Clone, Default)]
pub struct HeuristicClassifier {
    rules: ClassifierRules,
}

fn contains_any(text: &str, needles: &[String]) -> bool {
    needles
        .iter()
        .any(|needle| text.contains(&needle.to_lowercase()))
}

impl HeuristicClassifier {
    pub fn new(rules: ClassifierRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ClassifierRules {
        &self.rules
    }

    pub async fn from_yaml(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let rules: ClassifierRules = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(Self::new(rules))
    }

    /// `rules/classifier.yaml` under `root`, or the built-in tables when absent.
    pub async fn from_workspace_root(root: &Path) -> Result<Self> {
        let path = root.join("rules").join("classifier.yaml");
        if !tokio::fs::try_exists(&path)
            .await
            .with_context(|| format!("checking {}", path.display()))?
        {
            return Ok(Self::default());
        }
        let classifier = Self::from_yaml(&path).await?;
        info!(path = %path.display(), "loaded classifier rules");
        Ok(classifier)
    }

    /// Lower-cased description plus the secondary text (industry or name).
    pub fn classifier_text(record: &CandidateRecord) -> String {
        format!(
            "{} {}",
            record.description.as_deref().unwrap_or_default(),
            record.secondary_text()
        )
        .to_lowercase()
    }

    pub fn classify(&self, record: &CandidateRecord) -> Classification {
        let text = Self::classifier_text(record);
        let employees = record.employee_count_text.as_deref().unwrap_or_default();
        Classification {
            ai_disruptability: self.automation_risk(&text),
            labor_intensity: self.labor_intensity(&text, employees),
            visit_frequency: self.visit_frequency(&text),
        }
    }

    /// High-risk terms win over low-risk terms.
    pub fn automation_risk(&self, text: &str) -> &'static str {
        let text = text.to_lowercase();
        let rules = &self.rules.automation_risk;
        if contains_any(&text, &rules.high) {
            AI_RISK_HIGH
        } else if contains_any(&text, &rules.low) {
            AI_RISK_LOW
        } else {
            AI_RISK_MEDIUM
        }
    }

    pub fn labor_intensity(&self, text: &str, employee_text: &str) -> LaborIntensity {
        let text = text.to_lowercase();
        let rules = &self.rules.labor_intensity;
        let headcount = extract_first_integer(employee_text);
        if headcount > rules.high_headcount_above || contains_any(&text, &rules.high) {
            LaborIntensity::High
        } else if headcount < rules.low_headcount_below || contains_any(&text, &rules.low) {
            LaborIntensity::Low
        } else {
            LaborIntensity::Medium
        }
    }

    pub fn visit_frequency(&self, text: &str) -> VisitFrequency {
        let text = text.to_lowercase();
        self.rules
            .visit_frequency
            .iter()
            .find(|rule| contains_any(&text, &rule.contains_any))
            .map(|rule| rule.frequency)
            .unwrap_or(self.rules.visit_default)
    }
}
