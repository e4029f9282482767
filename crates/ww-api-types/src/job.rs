use serde::{Deserialize, Deserializer, Serialize};

use crate::Cid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobLocation {
    #[default]
    Remote,
    Onsite,
    Hybrid,
}

impl JobLocation {
    /// Unknown or malformed values fall back to `Remote`.
    pub fn from_str_lossy(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "onsite" | "on-site" => JobLocation::Onsite,
            "hybrid" => JobLocation::Hybrid,
            _ => JobLocation::Remote,
        }
    }
}

impl<'de> Deserialize<'de> for JobLocation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw
            .as_deref()
            .map(JobLocation::from_str_lossy)
            .unwrap_or_default())
    }
}

/// Reads a stored amount leniently. Snapshots written by other clients may
/// hold fractional amounts or `null`; fractions round to the nearest whole
/// unit and `null`, negative or non-finite values read as zero.
fn lenient_amount<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(match raw {
        Some(amount) if amount.is_finite() && amount > 0.0 => amount.round() as u64,
        _ => 0,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Budget {
    #[serde(deserialize_with = "lenient_amount")]
    pub min: u64,
    #[serde(deserialize_with = "lenient_amount")]
    pub max: u64,
    pub currency: String,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            min: 0,
            max: 0,
            currency: "USDC".to_owned(),
        }
    }
}

/// Denormalised poster card shown on a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientBlock {
    pub id: String,
    pub name: String,
    pub avatar: String,
}

/// Job fields a client edits before posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobDraft {
    pub company_name: String,
    pub website: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub skills: Vec<String>,
    #[serde(deserialize_with = "lenient_amount")]
    pub budget_min: u64,
    #[serde(deserialize_with = "lenient_amount")]
    pub budget_max: u64,
    pub duration: String,
    pub location: JobLocation,
    pub immediate: bool,
    pub payment_token: String,
}

impl Default for JobDraft {
    fn default() -> Self {
        Self {
            company_name: String::new(),
            website: String::new(),
            title: String::new(),
            description: String::new(),
            category: String::new(),
            skills: Vec::new(),
            budget_min: 500,
            budget_max: 2000,
            duration: String::new(),
            location: JobLocation::Remote,
            immediate: false,
            payment_token: String::new(),
        }
    }
}

impl JobDraft {
    /// Adds a skill unless it is blank or already listed.
    pub fn add_skill(&mut self, skill: &str) -> bool {
        let skill = skill.trim();
        if skill.is_empty() || self.skills.iter().any(|existing| existing == skill) {
            return false;
        }
        self.skills.push(skill.to_owned());
        true
    }

    pub fn remove_skill(&mut self, skill: &str) {
        self.skills.retain(|existing| existing != skill);
    }
}

/// Job snapshot as published to content-addressed storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPosting {
    #[serde(flatten)]
    pub draft: JobDraft,
    #[serde(default)]
    pub poster: String,
    #[serde(default)]
    pub poster_profile: Option<String>,
    #[serde(default)]
    pub posted_at: String,
    #[serde(default)]
    pub client: Option<ClientBlock>,
    #[serde(default)]
    pub budget: Option<Budget>,
}

/// A discovered job together with the CID it was resolved from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobListing {
    pub id: Cid,
    #[serde(flatten)]
    pub posting: JobPosting,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_location_falls_back_to_remote() {
        let raw = r#"{ "title": "Auditor", "location": "moon-base", "poster": "0xabc" }"#;
        let posting: JobPosting = serde_json::from_str(raw).unwrap();
        assert_eq!(posting.draft.location, JobLocation::Remote);
        assert_eq!(posting.draft.title, "Auditor");

        let raw = r#"{ "location": "hybrid" }"#;
        let posting: JobPosting = serde_json::from_str(raw).unwrap();
        assert_eq!(posting.draft.location, JobLocation::Hybrid);
    }

    #[test]
    fn posting_serialises_flat_camel_case() {
        let posting = JobPosting {
            draft: JobDraft {
                company_name: "Acme".to_owned(),
                ..JobDraft::default()
            },
            poster: "0xabc".to_owned(),
            poster_profile: Some("bafyprofile".to_owned()),
            posted_at: "2025-01-01T00:00:00.000Z".to_owned(),
            client: None,
            budget: Some(Budget::default()),
        };
        let json = serde_json::to_value(&posting).unwrap();
        assert_eq!(json["companyName"], "Acme");
        assert_eq!(json["budgetMin"], 500);
        assert_eq!(json["posterProfile"], "bafyprofile");
        assert_eq!(json["budget"]["currency"], "USDC");
    }

    #[test]
    fn fractional_and_null_amounts_still_parse() {
        let raw = r#"{
            "title": "Indexer",
            "budgetMin": 1500.5,
            "budgetMax": null,
            "budget": { "min": 1500.5, "max": null, "currency": "USDC" }
        }"#;
        let posting: JobPosting = serde_json::from_str(raw).unwrap();
        assert_eq!(posting.draft.budget_min, 1501);
        assert_eq!(posting.draft.budget_max, 0);
        let budget = posting.budget.unwrap();
        assert_eq!((budget.min, budget.max), (1501, 0));

        let raw = r#"{ "budgetMin": -20, "budgetMax": 2500 }"#;
        let draft: JobDraft = serde_json::from_str(raw).unwrap();
        assert_eq!((draft.budget_min, draft.budget_max), (0, 2500));
        assert_eq!(serde_json::to_value(&draft).unwrap()["budgetMax"], 2500);
    }

    #[test]
    fn skills_are_deduplicated() {
        let mut draft = JobDraft::default();
        assert!(draft.add_skill("Solidity"));
        assert!(!draft.add_skill(" Solidity "));
        assert!(!draft.add_skill(""));
        draft.remove_skill("Solidity");
        assert!(draft.skills.is_empty());
    }
}
