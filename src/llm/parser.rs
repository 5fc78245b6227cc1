//! SQL extraction from LLM completions.
//!
//! The prompt asks for the bare query, but models often wrap it in a
//! markdown code block anyway.

use crate::error::{Result, RetrieverError};

/// Extracts the SQL query from a completion.
///
/// Uses the first ```` ```sql ```` block, then the first bare ```` ``` ````
/// block, and otherwise the whole trimmed completion. Blocks tagged with
/// another language are not treated as SQL.
pub fn extract_sql(response: &str) -> Result<String> {
    let sql = extract_code_block(response, "sql")
        .or_else(|| extract_code_block(response, ""))
        .unwrap_or(response)
        .trim();

    if sql.is_empty() {
        return Err(RetrieverError::generation("The model returned no SQL"));
    }

    Ok(sql.to_string())
}

/// Returns the body of the first fenced block tagged `lang`.
///
/// Pass an empty string for `lang` to match blocks without a language tag.
fn extract_code_block<'a>(text: &'a str, lang: &str) -> Option<&'a str> {
    let mut rest = text;

    while let Some(start) = rest.find("```") {
        let after_fence = &rest[start + 3..];
        let newline = after_fence.find('\n')?;
        let tag = after_fence[..newline].trim();
        let body = &after_fence[newline + 1..];
        let end = body.find("```")?;

        if tag.eq_ignore_ascii_case(lang) {
            return Some(&body[..end]);
        }

        rest = &body[end + 3..];
    }

    None
}
