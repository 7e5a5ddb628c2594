use serde::{Deserialize, Serialize};

use greenaudit_core::analysis::{Claim, ClaimMemory, FindingCategory};
use greenaudit_core::document::Chunk;

/// Wording of the three indicator categories shown to the model.
///
/// Callers may reword a category; the set of categories is fixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorDefinitions {
    pub vague: String,
    pub inconsistency: String,
    pub data_gap: String,
}

impl Default for IndicatorDefinitions {
    fn default() -> Self {
        Self {
            vague: "Unspecific or unverifiable wording (\"climate-friendly\", \"green\", \
                    \"sustainable\") without a metric, scope or time frame."
                .into(),
            inconsistency: "Statements or figures that contradict each other, or targets \
                            whose reported progress does not add up."
                .into(),
            data_gap: "A target or claim without a base year, absolute figures, unit, \
                       scope or reporting boundary."
                .into(),
        }
    }
}

impl IndicatorDefinitions {
    pub fn get(&self, category: FindingCategory) -> &str {
        match category {
            FindingCategory::Vague => &self.vague,
            FindingCategory::Inconsistency => &self.inconsistency,
            FindingCategory::DataGap => &self.data_gap,
        }
    }
}

pub fn analysis_system_prompt(definitions: &IndicatorDefinitions) -> String {
    let tags = FindingCategory::ALL
        .iter()
        .map(|c| format!("- {}: {}", c.as_str(), definitions.get(*c)))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a careful, scientific auditor of corporate sustainability reports.
Your language is strictly descriptive ("indication", "hint", "potentially"). Avoid absolute verdicts.

IMPORTANT: assess ONLY the section "CURRENT PAGE (TO ASSESS)".
The context pages exist only to follow sentences across page breaks. Never extract findings or claims from them.

TASKS:
1. RISK INDICATORS (findings). Use exactly these definitions:
{tags}
   Extract them ONLY from the current page.

2. STRATEGIC TARGETS (claims):
   - Extract new targets and commitments ("We will...", "By 2030...").
   - Check the list "KNOWN STRATEGIC TARGETS" in the user message.
   - Extract ONLY claims that are semantically new, no rewordings or repetitions.
   Extract them ONLY from the current page.

3. VERIFICATION (memory check):
   - Check the list "OPEN TARGETS".
   - Only when the current page really contains evidence, report status "POTENTIALLY_VERIFIED".

Reply with VALID JSON ONLY, no further explanation:
{{
    "findings": [{{"category": "VAGUE|INCONSISTENCY|DATA_GAP", "quote": "...", "reasoning": "..."}}],
    "new_claims": [{{"claim": "...", "context": "..."}}],
    "claim_updates": [{{"id": 1, "status": "POTENTIALLY_VERIFIED", "reason": "..."}}]
}}"#
    )
}

fn bullet_list(items: impl Iterator<Item = String>, empty: &str) -> String {
    let lines: Vec<String> = items.collect();
    if lines.is_empty() {
        empty.to_string()
    } else {
        lines.join("\n")
    }
}

/// User message for one chunk: the three-page window plus claim memory.
pub fn analysis_user_prompt(
    previous: Option<&Chunk>,
    current: &Chunk,
    next: Option<&Chunk>,
    memory: &ClaimMemory,
) -> String {
    let previous_text = previous.map_or("(no previous page)", |c| c.text.as_str());
    let next_text = next.map_or("(no next page)", |c| c.text.as_str());

    let known = bullet_list(
        memory
            .iter()
            .map(|c| format!("- ID {} (p. {}): {}", c.id, c.page, c.text)),
        "(no claims detected yet)",
    );
    let open = bullet_list(
        memory
            .open_claims()
            .map(|c| format!("- ID {}: {}", c.id, c.text)),
        "(no open targets)",
    );

    format!(
        "=== CONTEXT: PREVIOUS PAGE (READ ONLY) ===\n{previous_text}\n\n\
         === CURRENT PAGE (TO ASSESS) - page {page} ===\n{current_text}\n\n\
         === CONTEXT: NEXT PAGE (READ ONLY) ===\n{next_text}\n\n\
         ---\n\n\
         KNOWN STRATEGIC TARGETS:\n{known}\n\n\
         OPEN TARGETS (for verification):\n{open}\n",
        page = current.page,
        current_text = current.text,
    )
}

pub const VERIFICATION_SYSTEM_PROMPT: &str = "\
You perform strict fact checks on claims from sustainability reports. \
Reply with valid JSON only.";

/// First `max_chars` characters of `text`, with an ellipsis when cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

pub fn verification_user_prompt(claim: &Claim, candidate_text: &str, max_chars: usize) -> String {
    format!(
        r#"STRICT FACT CHECK

Claim to check (strategic target):
"{claim}"
Background context: "{context}"

Possible evidence text:
"{evidence}"

YOUR TASK:
Decide whether the evidence text proves beyond doubt that the claim has been implemented, or names concrete measures or data for it.

RULES:
- If the text only repeats the target ("We plan..."), it is NOT evidence -> false.
- If the text stays vague ("We have made progress"), it is NOT evidence -> false.
- Only hard facts (figures, "completed", "achieved", "budget approved") count as evidence -> true.

Reply with JSON: {{"is_evidence": true, "reason": "very short justification"}}"#,
        claim = claim.text,
        context = claim.context,
        evidence = excerpt(candidate_text, max_chars),
    )
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn chunk(page: u32, text: &str) -> Chunk {
        Chunk::new(page, "report.pdf", text.into(), PathBuf::from("page.png"))
    }

    #[test]
    fn system_prompt_lists_custom_wording() {
        let definitions = IndicatorDefinitions {
            vague: "Fuzzy marketing language".into(),
            ..IndicatorDefinitions::default()
        };
        let prompt = analysis_system_prompt(&definitions);
        assert!(prompt.contains("- VAGUE: Fuzzy marketing language"));
        assert!(prompt.contains("- DATA_GAP: "));
        assert!(prompt.contains("\"claim_updates\""));
    }

    #[test]
    fn user_prompt_marks_missing_neighbours() {
        let current = chunk(1, "Net zero by 2040.");
        let prompt = analysis_user_prompt(None, &current, None, &ClaimMemory::new());
        assert!(prompt.contains("(no previous page)"));
        assert!(prompt.contains("page 1 ===\nNet zero by 2040."));
        assert!(prompt.contains("(no claims detected yet)"));
        assert!(prompt.contains("(no open targets)"));
    }

    #[test]
    fn user_prompt_lists_known_and_open_claims() {
        let mut memory = ClaimMemory::new();
        memory.add("Net zero by 2040".into(), String::new(), 1);
        let id = memory.add("100% green power".into(), String::new(), 1);
        memory.verify(
            id,
            greenaudit_core::analysis::Evidence {
                page: 2,
                reason: "PPA signed".into(),
                source: greenaudit_core::analysis::EvidenceSource::Inline,
            },
        );

        let (prev, cur, next) = (chunk(1, "one"), chunk(2, "two"), chunk(3, "three"));
        let prompt = analysis_user_prompt(Some(&prev), &cur, Some(&next), &memory);

        assert!(prompt.contains("- ID 1 (p. 1): Net zero by 2040"));
        assert!(prompt.contains("- ID 2 (p. 1): 100% green power"));
        let open_section = prompt.split("OPEN TARGETS").nth(1).unwrap();
        assert!(open_section.contains("- ID 1: Net zero by 2040"));
        assert!(!open_section.contains("ID 2"));
    }

    #[test]
    fn excerpt_cuts_on_char_boundary() {
        assert_eq!(excerpt("Wärmepumpe", 3), "Wär...");
        assert_eq!(excerpt("short", 10), "short");
        assert_eq!(excerpt("exact", 5), "exact");
    }

    #[test]
    fn verification_prompt_truncates_candidate() {
        let mut memory = ClaimMemory::new();
        let id = memory.add("Cut CO2 emissions by 50%".into(), "Climate".into(), 1);
        let claim = memory.get(id).unwrap();
        let long = "x".repeat(2000);

        let prompt = verification_user_prompt(claim, &long, 1500);
        assert!(prompt.contains("Cut CO2 emissions by 50%"));
        assert!(prompt.contains(&format!("\"{}...\"", "x".repeat(1500))));
        assert!(!prompt.contains(&"x".repeat(1501)));
    }
}
