use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocialLinks {
    pub linkedin: String,
    pub twitter: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReputationEntry {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Reputation {
    pub score: f64,
    pub jobs: u32,
    pub breakdown: Vec<ReputationEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioItem {
    pub name: String,
    pub link: String,
    pub rating: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Review {
    pub client: String,
    pub comment: String,
    pub date: String,
}

/// Profile snapshot as published to content-addressed storage.
///
/// Every field defaults when absent so older or hand-edited snapshots still load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileRecord {
    pub name: String,
    pub bio: String,
    pub profile_pic: String,
    pub wallet: String,
    pub did: String,
    pub lens: String,
    pub gitcoin_stamps: u32,
    #[serde(rename = "skillNFTs")]
    pub skill_nfts: Vec<String>,
    pub verified: bool,
    pub social: SocialLinks,
    pub skills: Vec<String>,
    pub reputation: Reputation,
    pub portfolio: Vec<PortfolioItem>,
    pub reviews: Vec<Review>,
    #[serde(rename = "lastCID", skip_serializing_if = "Option::is_none")]
    pub last_cid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_snapshot_with_original_key_names() {
        let raw = r#"{
            "name": "Jane Doe",
            "profilePic": "https://gateway.example/ipfs/bafyavatar",
            "skillNFTs": ["Solidity"],
            "gitcoinStamps": 24,
            "reputation": { "score": 4.8, "jobs": 12, "breakdown": [{ "label": "Timeliness", "value": 4.7 }] },
            "lastCID": "bafyprevious"
        }"#;

        let profile: ProfileRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(profile.name, "Jane Doe");
        assert_eq!(profile.skill_nfts, vec!["Solidity".to_owned()]);
        assert_eq!(profile.reputation.breakdown[0].label, "Timeliness");
        assert_eq!(profile.last_cid.as_deref(), Some("bafyprevious"));
        assert!(profile.portfolio.is_empty());
    }

    #[test]
    fn omits_unset_pointer_fields() {
        let json = serde_json::to_value(ProfileRecord::default()).unwrap();
        assert!(json.get("lastCID").is_none());
        assert!(json.get("lastUpdated").is_none());
        assert!(json.get("profilePic").is_some());
    }
}
