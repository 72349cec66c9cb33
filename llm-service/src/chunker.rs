//! LLM-assisted semantic chunker.
//!
//! Invoked only for underchunked files. Runs up to three passes
//! (embedded-code, business-logic, api-contracts), each with its own
//! language filter and prompt, and keeps only items the model reports with
//! `confidence > 0.7`. A failed pass yields no chunks rather than an error;
//! structural parsing already produced a usable baseline.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::enricher::clip;
use crate::responses::ResponsesClient;

/// Minimum model confidence for an accepted chunk.
const MIN_CONFIDENCE: f64 = 0.7;
/// Files smaller than this are never worth a pass.
const MIN_FILE_SIZE: usize = 500;
/// Content cap per prompt.
const MAX_CONTENT: usize = 15_000;

/// A chunk identified by LLM analysis.
#[derive(Debug, Clone, Deserialize)]
pub struct SemanticChunk {
    #[serde(rename = "type")]
    pub chunk_type: String,
    pub name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub start_line: u32,
    #[serde(default)]
    pub end_line: u32,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub related_symbols: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub confidence: f64,
}

/// One enrichment pass: a focus, a prompt, and the languages it applies to.
struct EnrichmentPass {
    name: &'static str,
    /// Empty slice = all languages.
    languages: &'static [&'static str],
    instructions: &'static str,
}

static PASSES: &[EnrichmentPass] = &[
    EnrichmentPass {
        name: "embedded_code",
        languages: &["python", "javascript", "typescript"],
        instructions: "identify any significant code embedded in strings.\n\n\
            Look for:\n\
            - SQL queries in f-strings, format strings, or string concatenation\n\
            - HTML templates in strings\n\
            - Complex regex patterns\n\
            - Shell commands\n\
            - GraphQL queries\n\
            - JSON schemas\n\n\
            For each embedded code block found, extract:\n\
            1. The type (embedded_sql, embedded_html, regex, shell, graphql, json_schema)\n\
            2. A descriptive name\n\
            3. The exact content (the embedded code itself)\n\
            4. Start and end line numbers\n\
            5. What it does (purpose)\n\
            6. Related symbols (functions/classes that use it)",
    },
    EnrichmentPass {
        name: "business_logic",
        languages: &[],
        instructions: "identify significant business logic patterns.\n\n\
            Look for:\n\
            - Validation logic (input validation, business rules)\n\
            - State machines or workflow logic\n\
            - Calculations (pricing, scoring, aggregations)\n\
            - Authorization/permission checks\n\
            - Data transformations\n\
            - Integration points (API calls, external services)\n\n\
            For each pattern found, extract:\n\
            1. The type (validation, workflow, calculation, authorization, transform, integration)\n\
            2. A descriptive name reflecting the business domain\n\
            3. The relevant code section\n\
            4. Line numbers\n\
            5. Business purpose (what business problem it solves)\n\
            6. Related symbols",
    },
    EnrichmentPass {
        name: "api_contracts",
        languages: &["python", "javascript", "typescript"],
        instructions: "identify API-related patterns.\n\n\
            Look for:\n\
            - REST endpoint definitions (routes, views)\n\
            - Request/response schemas or models\n\
            - API authentication/middleware\n\
            - GraphQL resolvers or schemas\n\
            - WebSocket handlers\n\
            - RPC definitions\n\n\
            For each API element found, extract:\n\
            1. The type (endpoint, schema, middleware, resolver, websocket, rpc)\n\
            2. Name (e.g., \"POST /api/users\" or \"UserCreateSchema\")\n\
            3. The relevant code\n\
            4. Line numbers\n\
            5. Purpose\n\
            6. Related symbols (serializers, validators, models)",
    },
];

/// LLM chunker of last resort: finds what structural parsing misses.
#[derive(Debug, Clone)]
pub struct LlmChunker {
    client: ResponsesClient,
}

impl LlmChunker {
    pub fn new(client: ResponsesClient) -> Self {
        Self { client }
    }

    /// Runs all applicable passes and returns the accepted chunks.
    ///
    /// Never fails: pass-level errors degrade to an empty result.
    pub async fn analyze_file(
        &self,
        file_path: &str,
        content: &str,
        language: &str,
        existing_symbols: &[String],
    ) -> Vec<SemanticChunk> {
        if content.len() < MIN_FILE_SIZE {
            return Vec::new();
        }

        let mut all = Vec::new();
        for pass in PASSES {
            if !pass.languages.is_empty() && !pass.languages.contains(&language) {
                continue;
            }

            let prompt = build_prompt(pass, language, content, existing_symbols);
            debug!(pass = pass.name, file = file_path, "running chunker pass");

            let response = match self.client.generate(&prompt).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(pass = pass.name, file = file_path, error = %e, "chunker pass failed");
                    continue;
                }
            };

            for item in parse_chunk_response(&response) {
                if item.confidence <= MIN_CONFIDENCE {
                    continue;
                }
                debug!(
                    chunk_type = %item.chunk_type,
                    name = %item.name,
                    confidence = item.confidence,
                    "accepted semantic chunk"
                );
                all.push(item);
            }
        }
        all
    }
}

fn build_prompt(
    pass: &EnrichmentPass,
    language: &str,
    content: &str,
    existing_symbols: &[String],
) -> String {
    let existing: Vec<&str> = existing_symbols
        .iter()
        .take(20)
        .map(String::as_str)
        .collect();
    format!(
        "You are a code analysis expert. Respond only with valid JSON.\n\n\
         Analyze this {language} code and {instructions}\n\n\
         Symbols already extracted structurally (do not duplicate them): {existing:?}\n\n\
         Code to analyze:\n```{language}\n{code}\n```\n\n\
         Respond with a JSON array of found items, each shaped like:\n\
         {{\"type\": \"...\", \"name\": \"...\", \"content\": \"...\", \"start_line\": 1,\n\
          \"end_line\": 2, \"purpose\": \"...\", \"related_symbols\": [], \"tags\": [],\n\
          \"confidence\": 0.9}}\n\n\
         Return empty array [] if nothing was found. Only include items with confidence > 0.7.",
        instructions = pass.instructions,
        code = clip(content, MAX_CONTENT),
    )
}

static FENCED_JSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("valid regex"));
static BAD_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\\([^"\\/bfnrtu])"#).expect("valid regex"));

/// Parses the model response into chunks.
///
/// Accepts either a raw JSON array or a fenced code block. Before giving up
/// on a parse error, repairs lone backslashes that are not part of a valid
/// escape sequence. Unparseable responses yield `[]`.
pub fn parse_chunk_response(response: &str) -> Vec<SemanticChunk> {
    let body = FENCED_JSON
        .captures(response)
        .and_then(|c| c.get(1))
        .map_or(response, |m| m.as_str())
        .trim();

    if let Ok(items) = serde_json::from_str::<Vec<SemanticChunk>>(body) {
        return items;
    }

    let repaired = BAD_ESCAPE.replace_all(body, r"\\$1");
    match serde_json::from_str::<Vec<SemanticChunk>>(&repaired) {
        Ok(items) => items,
        Err(e) => {
            warn!(error = %e, "failed to parse chunker response as JSON");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_raw_array() {
        let items = parse_chunk_response(
            r#"[{"type":"embedded_sql","name":"q","confidence":0.9,"start_line":1,"end_line":4}]"#,
        );
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].chunk_type, "embedded_sql");
    }

    #[test]
    fn parses_fenced_block() {
        let items = parse_chunk_response(
            "Here you go:\n```json\n[{\"type\":\"endpoint\",\"name\":\"POST /x\"}]\n```",
        );
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "POST /x");
    }

    #[test]
    fn repairs_lone_backslashes() {
        // `\d` is not a valid JSON escape; the repair doubles it.
        let items =
            parse_chunk_response(r#"[{"type":"regex","name":"digits","content":"\d+\d"}]"#);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].content, r"\d+\d");
    }

    #[test]
    fn garbage_yields_empty() {
        assert!(parse_chunk_response("not json at all").is_empty());
    }
}
