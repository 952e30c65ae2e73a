// llm-client-rs/src/normalizer.rs
//
// Turns raw model completions into typed payloads. Models wrap JSON in
// markdown fences or surround it with prose; both are tolerated. Anything
// that still cannot be decoded resolves to the caller's fallback.

use error_handling::{Classify, ErrorKind};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Model output that holds no decodable payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not decode model output ({chars} chars)")]
pub struct DecodeError {
    pub chars: usize,
}

impl Classify for DecodeError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Decode
    }
}

/// Remove a surrounding markdown code fence, if present.
///
/// Handles ```` ```json ```` style tag lines as well as a fence whose body
/// starts on the opening line. Text without a fence is only trimmed, so the
/// function is idempotent.
pub fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };

    let body = match after_open.find('\n') {
        Some(newline) => {
            let first_line = after_open[..newline].trim();
            // A tag line holds only a language name; JSON starting on the
            // fence line is part of the body.
            if first_line.starts_with('{') || first_line.starts_with('[') {
                after_open
            } else {
                &after_open[newline + 1..]
            }
        }
        None => after_open,
    };

    let body = body.trim_end();
    let body = body.strip_suffix("```").unwrap_or(body);
    body.trim().to_string()
}

/// Byte ranges of balanced `{...}` spans, one per opening brace candidate,
/// in order of appearance. Braces inside string literals are ignored.
fn balanced_object_spans(text: &str) -> Vec<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();

    for (start, &byte) in bytes.iter().enumerate() {
        if byte != b'{' {
            continue;
        }

        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        for (offset, &current) in bytes[start..].iter().enumerate() {
            if in_string {
                match current {
                    _ if escaped => escaped = false,
                    b'\\' => escaped = true,
                    b'"' => in_string = false,
                    _ => {}
                }
                continue;
            }

            match current {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        spans.push((start, start + offset + 1));
                        break;
                    }
                }
                _ => {}
            }
        }
    }

    spans
}

/// Decode `raw` into `T`.
///
/// Tries the fence-stripped text as a whole first, then every balanced
/// object embedded in it.
pub fn try_extract_structured<T: DeserializeOwned>(raw: &str) -> Result<T, DecodeError> {
    let undecodable = || DecodeError { chars: raw.len() };
    let cleaned = strip_code_fences(raw);
    if cleaned.is_empty() {
        return Err(undecodable());
    }

    if let Ok(value) = serde_json::from_str::<T>(&cleaned) {
        return Ok(value);
    }

    balanced_object_spans(&cleaned)
        .into_iter()
        .find_map(|(start, end)| serde_json::from_str::<T>(&cleaned[start..end]).ok())
        .ok_or_else(undecodable)
}

/// Decode `raw` into `T`, substituting `fallback()` when it cannot be decoded.
pub fn extract_structured<T: DeserializeOwned>(
    label: &str,
    raw: &str,
    fallback: impl FnOnce() -> T,
) -> T {
    try_extract_structured(raw).unwrap_or_else(|err| {
        log::warn!("{}: {}, using fallback", label, err);
        fallback()
    })
}

/// Free-form text: fences removed, whitespace trimmed.
pub fn extract_text(raw: &str) -> String {
    strip_code_fences(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use shared_types::{FinalResponse, Outfit, ReasoningSummary};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Palette {
        palette: String,
        #[serde(default)]
        combos: Vec<String>,
    }

    #[test]
    fn test_strip_fence_with_language_tag() {
        let raw = "```json\n{\"palette\": \"warm\"}\n```";
        assert_eq!(strip_code_fences(raw), "{\"palette\": \"warm\"}");
    }

    #[test]
    fn test_strip_fence_without_tag_line() {
        assert_eq!(strip_code_fences("```{\"a\": 1}```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```{\"a\": 1}\n```"), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_is_idempotent() {
        let raw = "```\nplain text reply\n```";
        let once = strip_code_fences(raw);
        assert_eq!(once, "plain text reply");
        assert_eq!(strip_code_fences(&once), once);
        assert_eq!(strip_code_fences("  no fence  "), "no fence");
    }

    #[test]
    fn test_extracts_fenced_json() {
        let raw = "```json\n{\"palette\": \"earth tones\", \"combos\": [\"olive + cream\"]}\n```";
        let parsed: Palette = try_extract_structured(raw).unwrap();
        assert_eq!(parsed.palette, "earth tones");
        assert_eq!(parsed.combos, vec!["olive + cream".to_string()]);
    }

    #[test]
    fn test_extracts_json_wrapped_in_prose() {
        let raw = "Sure! Here is the analysis: {\"palette\": \"cool {muted}\"} Hope it helps.";
        let parsed: Palette = try_extract_structured(raw).unwrap();
        assert_eq!(parsed.palette, "cool {muted}");
    }

    #[test]
    fn test_skips_unparseable_candidates() {
        let raw = "{not json} then {\"palette\": \"jewel\"}";
        let parsed: Palette = try_extract_structured(raw).unwrap();
        assert_eq!(parsed.palette, "jewel");
    }

    #[test]
    fn test_garbage_resolves_to_fallback() {
        let fallback = || Palette {
            palette: "neutral".to_string(),
            combos: vec![],
        };
        assert_eq!(extract_structured("color", "no json here", fallback).palette, "neutral");
        assert_eq!(extract_structured("color", "", fallback).palette, "neutral");
        assert_eq!(extract_structured("color", "{\"palette\": ", fallback).palette, "neutral");
    }

    #[test]
    fn test_undecodable_output_is_a_decode_error() {
        let err = try_extract_structured::<Palette>("no json here").unwrap_err();
        assert_eq!(err, DecodeError { chars: 12 });
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_fenced_payload_round_trips() {
        let summary = ReasoningSummary {
            summary: "Tailored jewel tones".to_string(),
            core_outfit_direction: "structured layers with a {cropped} jacket".to_string(),
            key_color_approach: "emerald + cream".to_string(),
            key_silhouette_rules: vec!["fitted top".to_string()],
            key_body_type_adaptations: vec!["define the waist".to_string()],
        };
        let fenced = format!("```json\n{}\n```", serde_json::to_string_pretty(&summary).unwrap());
        let decoded = extract_structured("reasoning", &fenced, ReasoningSummary::fallback);
        assert_eq!(decoded, summary);

        let response = FinalResponse {
            message: "Two looks for tonight.".to_string(),
            outfits: vec![Outfit {
                title: "Sharp casual".to_string(),
                items: vec!["Navy Blazer".to_string(), "Dark Wash Jeans".to_string()],
                why_it_works: "Structured but relaxed.".to_string(),
            }],
            extra_tips: vec!["Keep accessories minimal.".to_string()],
        };
        let fenced = format!("```\n{}\n```", serde_json::to_string(&response).unwrap());
        assert_eq!(extract_structured("final", &fenced, FinalResponse::fallback), response);
    }

    #[test]
    fn test_extract_structured_is_idempotent_on_clean_json() {
        let clean = serde_json::to_string(&ReasoningSummary::fallback()).unwrap();
        let once: ReasoningSummary = extract_structured("reasoning", &clean, || unreachable!());
        let reencoded = serde_json::to_string(&once).unwrap();
        let twice: ReasoningSummary = extract_structured("reasoning", &reencoded, || unreachable!());

        assert_eq!(reencoded, clean);
        assert_eq!(twice, once);
        assert_eq!(once, ReasoningSummary::fallback());
    }

    #[test]
    fn test_extract_text_trims_fences() {
        assert_eq!(extract_text("```\nHello there\n```"), "Hello there");
        assert_eq!(extract_text("  Hi  "), "Hi");
    }
}
