//! Best-effort extraction of job fields from free-form generated text.
//!
//! The model output has no grammar. Every field is looked up by its label and
//! any of them may be missing; callers keep their previous values for those.

use ww_api_types::JobDraft;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedJob {
    pub title: Option<String>,
    pub description: Option<String>,
    pub skills: Option<Vec<String>>,
    pub budget_min: Option<u64>,
    pub budget_max: Option<u64>,
    pub duration: Option<String>,
    pub category: Option<String>,
}

impl GeneratedJob {
    pub fn apply_to(&self, draft: &mut JobDraft) {
        if let Some(title) = &self.title {
            draft.title = title.clone();
        }
        if let Some(description) = &self.description {
            draft.description = description.clone();
        }
        if let Some(skills) = &self.skills {
            draft.skills.clear();
            for skill in skills {
                draft.add_skill(skill);
            }
        }
        if let Some(min) = self.budget_min {
            draft.budget_min = min;
        }
        if let Some(max) = self.budget_max {
            draft.budget_max = max;
        }
        if let Some(duration) = &self.duration {
            draft.duration = duration.clone();
        }
        if let Some(category) = &self.category {
            draft.category = category.clone();
        }
    }
}

/// Removes bold markers, leading list dashes and stray markdown punctuation.
pub fn strip_markdown(text: &str) -> String {
    let without_bold = text.replace("**", "");
    let lines: Vec<&str> = without_bold
        .lines()
        .map(|line| line.strip_prefix("- ").unwrap_or(line))
        .collect();
    lines
        .join("\n")
        .chars()
        .filter(|ch| !matches!(ch, '`' | '*' | '_' | '#'))
        .collect::<String>()
        .trim()
        .to_owned()
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

/// Byte offset just past the first occurrence of `label`.
fn find_label(text: &str, label: &str, ignore_case: bool) -> Option<usize> {
    let position = if ignore_case {
        text.to_ascii_lowercase().find(&label.to_ascii_lowercase())
    } else {
        text.find(label)
    };
    position.map(|start| start + label.len())
}

/// The first non-blank line after `label`.
fn line_after(text: &str, label: &str, ignore_case: bool) -> Option<String> {
    let start = find_label(text, label, ignore_case)?;
    let rest = text[start..].trim_start();
    let line = rest.lines().next()?;
    non_empty(strip_markdown(line))
}

fn description(text: &str) -> Option<String> {
    let start = find_label(text, "Description:", false)?;
    let rest = &text[start..];
    let end = rest.find("Skills:")?;
    non_empty(strip_markdown(&rest[..end]))
}

fn skills(text: &str) -> Option<Vec<String>> {
    let start = find_label(text, "Skills:", true)?;
    let line = text[start..].trim_start().lines().next()?;
    let skills: Vec<String> = line
        .split(',')
        .map(strip_markdown)
        .filter(|skill| !skill.is_empty())
        .collect();
    if skills.is_empty() { None } else { Some(skills) }
}

fn leading_amount(text: &str) -> Option<(u64, usize)> {
    let mut digits = String::new();
    let mut consumed = 0;
    for ch in text.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
        } else if ch != ',' || digits.is_empty() {
            break;
        }
        consumed += ch.len_utf8();
    }
    digits.parse().ok().map(|amount| (amount, consumed))
}

fn is_range_dash(ch: char) -> bool {
    matches!(ch, '-' | '\u{2013}')
}

/// Finds the first `$min-$max` pair; a hyphen or an en dash separates them.
fn budget(text: &str) -> (Option<u64>, Option<u64>) {
    for (index, _) in text.match_indices('$') {
        let Some((min, consumed)) = leading_amount(&text[index + 1..]) else {
            continue;
        };
        let rest = &text[index + 1 + consumed..];
        let Some(dash) = rest.chars().next().filter(|ch| is_range_dash(*ch)) else {
            continue;
        };
        let max = rest[dash.len_utf8()..]
            .strip_prefix('$')
            .and_then(leading_amount)
            .map(|(max, _)| max);
        return (Some(min), max);
    }
    (None, None)
}

pub fn parse_generated_job(text: &str) -> GeneratedJob {
    let (budget_min, budget_max) = budget(text);
    GeneratedJob {
        title: line_after(text, "Title:", false),
        description: description(text),
        skills: skills(text),
        budget_min,
        budget_max,
        duration: line_after(text, "Duration:", false),
        category: line_after(text, "Category:", false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
**Title:** Senior Solidity Engineer for DeFi Protocol

**Description:** Acme Labs is looking for an experienced engineer to build
and audit lending contracts. You will work closely with our core team.

**Company:** Acme Labs
**Category:** Smart Contract Development
**Budget:** $1500\u{2013}$4,000 USDC
**Duration:** 2-3 months

**Responsibilities:**
- Write contracts
- Review pull requests

**Skills:** Solidity, **Hardhat**, Foundry, , Ethers.js
";

    #[test]
    fn extracts_labelled_fields() {
        let job = parse_generated_job(SAMPLE);
        assert_eq!(job.title.as_deref(), Some("Senior Solidity Engineer for DeFi Protocol"));
        assert_eq!(
            job.description.as_deref(),
            Some(
                "Acme Labs is looking for an experienced engineer to build\nand audit lending contracts. You will work closely with our core team.\n\nCompany: Acme Labs\nCategory: Smart Contract Development\nBudget: $1500\u{2013}$4,000 USDC\nDuration: 2-3 months\n\nResponsibilities:\nWrite contracts\nReview pull requests"
            )
        );
        assert_eq!(
            job.skills,
            Some(vec![
                "Solidity".to_owned(),
                "Hardhat".to_owned(),
                "Foundry".to_owned(),
                "Ethers.js".to_owned(),
            ])
        );
        assert_eq!(job.budget_min, Some(1500));
        assert_eq!(job.budget_max, Some(4000));
        assert_eq!(job.duration.as_deref(), Some("2-3 months"));
        assert_eq!(job.category.as_deref(), Some("Smart Contract Development"));
    }

    #[test]
    fn ascii_hyphen_budgets_parse() {
        let job = parse_generated_job("Budget: $500-$2500 USDC");
        assert_eq!((job.budget_min, job.budget_max), (Some(500), Some(2500)));

        let job = parse_generated_job("Costs $12 per hour, range $800-$900");
        assert_eq!((job.budget_min, job.budget_max), (Some(800), Some(900)));
    }

    #[test]
    fn missing_fields_stay_absent() {
        let job = parse_generated_job("I could not produce a listing for that prompt.");
        assert_eq!(job, GeneratedJob::default());

        let job = parse_generated_job("Description: no skills label follows");
        assert_eq!(job.description, None);
    }

    #[test]
    fn apply_keeps_previous_values_for_absent_fields() {
        let mut draft = JobDraft {
            title: "Old title".to_owned(),
            category: "Design".to_owned(),
            skills: vec!["Figma".to_owned()],
            ..JobDraft::default()
        };
        GeneratedJob {
            title: Some("New title".to_owned()),
            skills: Some(vec!["Rust".to_owned(), "Rust".to_owned()]),
            budget_max: Some(9000),
            ..GeneratedJob::default()
        }
        .apply_to(&mut draft);

        assert_eq!(draft.title, "New title");
        assert_eq!(draft.category, "Design");
        assert_eq!(draft.skills, vec!["Rust".to_owned()]);
        assert_eq!((draft.budget_min, draft.budget_max), (500, 9000));
    }

    #[test]
    fn strips_markdown_noise() {
        assert_eq!(strip_markdown("  **Bold** `code` _x_ # h"), "Bold code x  h");
        assert_eq!(strip_markdown("- item one\n- item two"), "item one\nitem two");
    }
}
