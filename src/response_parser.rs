//! Recovery of structured improvement replies from free-form model output.
//!
//! The generator is asked for a flat JSON object but is not a reliable
//! structured-output source, so [`StructuredResponseParser`] works through
//! layered extractors, most precise first:
//!
//! 1. Embedded flat-JSON object containing the `"improved"` key
//! 2. Marked sections per field, case-insensitive, English or Russian
//! 3. List-item splitting inside a recovered alternatives block
//! 4. First non-empty lines of the raw text as a last resort
//!
//! Layers compose per field: each field keeps the first layer's value that
//! produced one. No layer returns an error; malformed input degrades to
//! "field not found". Only blank input yields a result with
//! [`ParseEmpty`](crate::error::DispatchError::ParseEmpty) set.

use regex::Regex;
use serde::Deserialize;

use crate::improver::StructuredImprovementResult;
use crate::logging::log_debug;

/// Fields the parser knows how to recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Improved,
    Alternatives,
    Code,
    Analysis,
    Creative,
}

/// Flat JSON shape the meta-prompt asks the model to emit.
#[derive(Debug, Deserialize)]
struct EmbeddedImprovement {
    #[serde(default)]
    improved: String,
    #[serde(default)]
    alternatives: Vec<String>,
    #[serde(default)]
    variant_code: Option<String>,
    #[serde(default)]
    variant_analysis: Option<String>,
    #[serde(default)]
    variant_creative: Option<String>,
}

/// Layered field extractor over raw model output.
pub struct StructuredResponseParser {
    /// Brace-delimited, non-nested object carrying the primary key. The
    /// meta-prompt asks for no nested braces, so a flat scan suffices.
    embedded_object: Option<Regex>,
    /// Section-marker line patterns, one per recoverable field.
    markers: Vec<(Field, Regex)>,
    /// List-item lead-in inside an alternatives block.
    list_item: Option<Regex>,
}

impl Default for StructuredResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StructuredResponseParser {
    pub fn new() -> Self {
        let embedded_object = Regex::new(r#"\{[^{}]*"improved"[^{}]*\}"#).ok();

        // Marker lines tolerate leading markdown decoration and list
        // numbering. Each word pair covers the English and Russian spellings
        // the meta-prompt suggests for the section fallback.
        let mut markers = Vec::new();
        if let Ok(regex) = Regex::new(r"(?i)^[\s#*>\d.)-]*(?:improved|улучшенн\w*)") {
            markers.push((Field::Improved, regex));
        }
        if let Ok(regex) = Regex::new(r"(?i)^[\s#*>\d.)-]*(?:alternatives?|альтернатив\w*)") {
            markers.push((Field::Alternatives, regex));
        }
        if let Ok(regex) = Regex::new(r"(?i)^[\s#*>\d.)-]*(?:(?:variant[\s_-]+)?code|код\w*)") {
            markers.push((Field::Code, regex));
        }
        if let Ok(regex) = Regex::new(r"(?i)^[\s#*>\d.)-]*(?:(?:variant[\s_-]+)?analysis|анализ\w*)")
        {
            markers.push((Field::Analysis, regex));
        }
        if let Ok(regex) =
            Regex::new(r"(?i)^[\s#*>\d.)-]*(?:(?:variant[\s_-]+)?creative|креатив\w*|творческ\w*)")
        {
            markers.push((Field::Creative, regex));
        }

        let list_item = Regex::new(r"^\s*(?:[-*•]|\d{1,2}[.)])\s+").ok();

        Self {
            embedded_object,
            markers,
            list_item,
        }
    }

    /// Recovers a [`StructuredImprovementResult`] from raw model output.
    ///
    /// `original_prompt` and `source_name` are carried into the result
    /// unchanged; they identify what was improved and by which target.
    pub fn parse(
        &self,
        raw: &str,
        original_prompt: &str,
        source_name: &str,
    ) -> StructuredImprovementResult {
        log_debug!(
            source = %source_name,
            content_length = raw.len(),
            content_preview = raw.chars().take(200).collect::<String>(),
            "Recovering structured improvement from reply"
        );

        let mut result = StructuredImprovementResult::empty(original_prompt, source_name);

        // Layer 1: embedded flat JSON. Counts only when it carries a
        // non-empty primary; fields it leaves blank stay open for layer 2.
        if let Some(embedded) = self.extract_embedded_object(raw) {
            result.improved = embedded.improved.trim().to_string();
            result.alternatives = embedded
                .alternatives
                .iter()
                .map(|alt| alt.trim())
                .filter(|alt| !alt.is_empty())
                .take(3)
                .map(String::from)
                .collect();
            result.variant_code = embedded.variant_code.and_then(non_blank);
            result.variant_analysis = embedded.variant_analysis.and_then(non_blank);
            result.variant_creative = embedded.variant_creative.and_then(non_blank);
        }

        // Layer 2: marked sections for whatever is still missing.
        let lines: Vec<&str> = raw.lines().collect();
        if result.improved.is_empty() {
            if let Some(section) = self.capture_section(&lines, Field::Improved) {
                log_debug!(source = %source_name, "Recovered primary result from section marker");
                result.improved = section;
            }
        }
        if result.alternatives.is_empty() {
            if let Some(block) = self.capture_section(&lines, Field::Alternatives) {
                // Layer 3: split the isolated block on list-item boundaries.
                result.alternatives = self.split_alternatives(&block);
            }
        }
        if result.variant_code.is_none() {
            result.variant_code = self.capture_section(&lines, Field::Code);
        }
        if result.variant_analysis.is_none() {
            result.variant_analysis = self.capture_section(&lines, Field::Analysis);
        }
        if result.variant_creative.is_none() {
            result.variant_creative = self.capture_section(&lines, Field::Creative);
        }

        // Layer 4: leading lines of the raw text, so any non-blank reply
        // produces a usable primary even with no structure at all.
        if result.improved.is_empty() {
            let degraded = first_content_lines(raw);
            if !degraded.is_empty() {
                log_debug!(
                    source = %source_name,
                    "No structure recognized, degrading to leading lines"
                );
                result.improved = degraded;
            }
        }

        // Layer 5: only whitespace-only input reaches here with nothing.
        if result.improved.is_empty() {
            result.error = Some(crate::error::DispatchError::parse_empty());
        }

        result
    }

    /// Scans for flat JSON candidates and returns the first one that decodes
    /// with a non-empty primary field.
    fn extract_embedded_object(&self, raw: &str) -> Option<EmbeddedImprovement> {
        let regex = self.embedded_object.as_ref()?;
        for candidate in regex.find_iter(raw) {
            match serde_json::from_str::<EmbeddedImprovement>(candidate.as_str()) {
                Ok(decoded) if !decoded.improved.trim().is_empty() => {
                    log_debug!(
                        json_length = candidate.as_str().len(),
                        "Recovered embedded JSON object"
                    );
                    return Some(decoded);
                }
                Ok(_) => {
                    log_debug!("Embedded object decoded without a primary result, scanning on");
                }
                Err(e) => {
                    log_debug!(error = %e, "Embedded object candidate failed to decode, scanning on");
                }
            }
        }
        None
    }

    /// Captures the text of the first non-empty section for `field`: the
    /// remainder of the marker line after its colon, plus following lines up
    /// to the next blank line or the next known marker.
    fn capture_section(&self, lines: &[&str], field: Field) -> Option<String> {
        let marker = self
            .markers
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, regex)| regex)?;

        for (idx, line) in lines.iter().enumerate() {
            if !marker.is_match(line) {
                continue;
            }

            let mut parts: Vec<String> = Vec::new();
            if let Some((_, inline)) = line.split_once(':') {
                let inline = clean_fragment(inline);
                if !inline.is_empty() {
                    parts.push(inline);
                }
            }
            for follow in &lines[idx + 1..] {
                if follow.trim().is_empty() || self.is_marker_line(follow) {
                    break;
                }
                parts.push(follow.trim().to_string());
            }

            let captured = parts.join("\n").trim().to_string();
            if !captured.is_empty() {
                return Some(captured);
            }
            // Marker with no content: keep scanning later occurrences.
        }
        None
    }

    fn is_marker_line(&self, line: &str) -> bool {
        self.markers.iter().any(|(_, regex)| regex.is_match(line))
    }

    /// First 3 non-empty items of an alternatives block. Lines with a
    /// bullet or `N.` lead-in are items with the lead-in stripped; a block
    /// with no list structure falls back to its plain lines.
    fn split_alternatives(&self, block: &str) -> Vec<String> {
        if let Some(list_item) = &self.list_item {
            let items: Vec<String> = block
                .lines()
                .filter(|line| list_item.is_match(line))
                .map(|line| list_item.replace(line, "").trim().to_string())
                .filter(|item| !item.is_empty())
                .take(3)
                .collect();
            if !items.is_empty() {
                return items;
            }
        }
        block
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .take(3)
            .map(String::from)
            .collect()
    }
}

/// Strips surrounding whitespace and stray markdown emphasis from an inline
/// fragment.
fn clean_fragment(text: &str) -> String {
    text.trim().trim_matches('*').trim().to_string()
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// First 5 non-empty trimmed lines, newline-joined.
fn first_content_lines(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(5)
        .collect::<Vec<_>>()
        .join("\n")
}
