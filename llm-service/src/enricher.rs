//! Summarization prompt surface over the responses client.
//!
//! One method per hierarchy level. Each returns the model's summary plus a
//! rough token estimate (chars / 4) that the quality tracker accumulates.

use tracing::debug;

use crate::error_handler::LlmError;
use crate::responses::ResponsesClient;

/// Result of one enrichment call.
#[derive(Debug, Clone)]
pub struct Enrichment {
    pub summary: String,
    pub tokens: u32,
}

/// Builds level-specific prompts and forwards them to the client.
#[derive(Debug, Clone)]
pub struct Summarizer {
    client: ResponsesClient,
}

/// ~4 chars per token for code-heavy prompts.
fn estimate_tokens(text: &str) -> u32 {
    (text.len() / 4) as u32
}

impl Summarizer {
    pub fn new(client: ResponsesClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ResponsesClient {
        &self.client
    }

    async fn run(&self, prompt: String) -> Result<Enrichment, LlmError> {
        let response = self.client.generate(&prompt).await?;
        let tokens = estimate_tokens(&prompt) + estimate_tokens(&response);
        Ok(Enrichment {
            summary: response.trim().to_string(),
            tokens,
        })
    }

    /// Summary for a single symbol (function, class, method, semantic chunk).
    pub async fn summarize_symbol(
        &self,
        symbol_name: &str,
        symbol_type: &str,
        code: &str,
        file_path: &str,
        language: &str,
    ) -> Result<Enrichment, LlmError> {
        let code = clip(code, 4_000);
        debug!(symbol = symbol_name, file = file_path, "summarize_symbol");
        let prompt = format!(
            "Analyze this {language} {symbol_type} and provide a concise summary.\n\n\
             File: {file_path}\n\
             {kind_cap}: {symbol_name}\n\n\
             ```{language}\n{code}\n```\n\n\
             Write a 1-3 sentence summary explaining:\n\
             1. What this {symbol_type} does\n\
             2. Key parameters/arguments (if function/method)\n\
             3. What it returns or its side effects\n\n\
             Be concise and focus on practical usage. Do not repeat the code.",
            kind_cap = capitalize(symbol_type),
        );
        self.run(prompt).await
    }

    /// Summary for a file, combining symbol summaries with a content preview.
    pub async fn summarize_file(
        &self,
        file_path: &str,
        content: &str,
        language: &str,
        symbols_context: &str,
    ) -> Result<Enrichment, LlmError> {
        let prompt = if symbols_context.is_empty() {
            format!(
                "Summarize this {language} file.\n\n\
                 File: {file_path}\n\n\
                 ```{language}\n{}\n```\n\n\
                 Write a 2-4 sentence summary explaining:\n\
                 1. The file's primary purpose\n\
                 2. Key classes/functions it provides\n\
                 3. How it would be used\n\n\
                 Be concise and practical.",
                clip(content, 5_000),
            )
        } else {
            format!(
                "Summarize this {language} file based on its symbols and content.\n\n\
                 File: {file_path}\n\n\
                 Symbol summaries:\n{}\n\n\
                 File preview:\n```{language}\n{}\n```\n\n\
                 Write a 2-4 sentence summary explaining:\n\
                 1. The file's primary purpose\n\
                 2. Key classes/functions it provides\n\
                 3. How it fits in the codebase\n\n\
                 Be concise and practical.",
                clip(symbols_context, 3_000),
                clip(content, 3_000),
            )
        };
        self.run(prompt).await
    }

    /// Summary for a module (folder) from concatenated child summaries.
    pub async fn summarize_module(
        &self,
        module_path: &str,
        files_context: &str,
        repo_id: &str,
    ) -> Result<Enrichment, LlmError> {
        let prompt = format!(
            "Summarize this code module based on its files.\n\n\
             Repository: {repo_id}\n\
             Module: {module_path}/\n\n\
             File summaries:\n{}\n\n\
             Write a 2-4 sentence summary explaining:\n\
             1. What this module/package does\n\
             2. Its key components\n\
             3. How other code would use it\n\n\
             Be concise. Focus on the module's role in the codebase.",
            clip(files_context, 6_000),
        );
        self.run(prompt).await
    }

    /// Top-level repository summary from concatenated module summaries.
    pub async fn summarize_repo(
        &self,
        repo_id: &str,
        modules_context: &str,
    ) -> Result<Enrichment, LlmError> {
        let prompt = format!(
            "Summarize this code repository based on its modules.\n\n\
             Repository: {repo_id}\n\n\
             Module summaries:\n{}\n\n\
             Write a comprehensive but concise summary (3-5 sentences) explaining:\n\
             1. What this project is and what it does\n\
             2. Key technologies/frameworks used\n\
             3. Main components/modules\n\
             4. How the modules work together\n\n\
             This summary will help developers quickly understand the repository.",
            clip(modules_context, 8_000),
        );
        self.run(prompt).await
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Char-boundary-safe prefix clip.
pub(crate) fn clip(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_respects_char_boundaries() {
        let s = "héllo wörld";
        let clipped = clip(s, 3);
        assert!(clipped.len() <= 3);
        assert!(s.starts_with(clipped));
    }

    #[test]
    fn token_estimate_is_quarter_of_chars() {
        assert_eq!(estimate_tokens("abcdefgh"), 2);
    }
}
