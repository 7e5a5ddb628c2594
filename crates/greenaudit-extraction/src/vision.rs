/// Sentinel the vision model returns for pages without data-bearing visuals.
pub const NO_RELEVANT_DATA: &str = "NO_RELEVANT_DATA";

/// Marker separating layout text from the vision description inside a chunk.
pub const VISUAL_DATA_MARKER: &str = "--- [VISUAL DATA (AI)] ---";

pub const VISION_PROMPT: &str = "\
You are reading one page of a corporate sustainability report.
Describe ONLY charts, diagrams, tables and infographics that carry sustainability data \
(emissions, energy, water, waste, targets, percentages, base years, units).
Transcribe the figures together with their labels, years and units. Keep it factual and compact.
Ignore photos, logos and purely decorative elements.
If the page contains no such visual data, answer exactly NO_RELEVANT_DATA.";

/// Clean a raw vision reply; the sentinel or an empty reply become `""`.
pub fn normalize_description(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.trim_matches(|c: char| !c.is_alphanumeric() && c != '_') == NO_RELEVANT_DATA {
        return String::new();
    }
    trimmed.to_string()
}

/// Concatenate layout text and vision description into the chunk text.
pub fn merge_page_text(layout_text: &str, description: &str) -> String {
    let layout = layout_text.trim_end();
    if description.is_empty() {
        return layout.to_string();
    }
    if layout.is_empty() {
        return format!("{VISUAL_DATA_MARKER}\n{description}");
    }
    format!("{layout}\n\n{VISUAL_DATA_MARKER}\n{description}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_becomes_empty() {
        assert_eq!(normalize_description("NO_RELEVANT_DATA"), "");
        assert_eq!(normalize_description("  NO_RELEVANT_DATA.\n"), "");
        assert_eq!(normalize_description(""), "");
    }

    #[test]
    fn description_is_trimmed() {
        assert_eq!(
            normalize_description("\nBar chart: Scope 1 2019 12kt, 2023 6kt\n"),
            "Bar chart: Scope 1 2019 12kt, 2023 6kt"
        );
    }

    #[test]
    fn merge_keeps_layout_first() {
        let text = merge_page_text("Our climate strategy\n", "Chart: -50% CO2 vs 2019");
        assert_eq!(
            text,
            "Our climate strategy\n\n--- [VISUAL DATA (AI)] ---\nChart: -50% CO2 vs 2019"
        );
    }

    #[test]
    fn merge_without_description_is_layout_only() {
        assert_eq!(merge_page_text("Plain page", ""), "Plain page");
    }

    #[test]
    fn merge_with_empty_layout() {
        assert_eq!(
            merge_page_text("", "Table of water use"),
            "--- [VISUAL DATA (AI)] ---\nTable of water use"
        );
    }
}
