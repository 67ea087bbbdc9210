//! Turning a follow-up question into a standalone retrieval query.
//!
//! Follow-ups like "How do I prevent it?" retrieve poorly on their own. A
//! [`QueryCondenser`] rewrites them against the conversation so far. The
//! model-backed [`LlmCondenser`] is the default; [`RuleBasedCondenser`]
//! resolves pronouns against the subject of the previous question and needs
//! no provider.

use std::ops::Range;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::Result;
use crate::generation::{GenerationProvider, generate_with_timeout};
use crate::memory::{Role, Turn};
use crate::prompt::PromptBuilder;

/// Rewrites a question so it can be understood without the conversation.
#[async_trait]
pub trait QueryCondenser: Send + Sync {
    /// Produce the retrieval query for `question` given prior `history`.
    ///
    /// With an empty history the question is returned unchanged.
    async fn condense(&self, history: &[Turn], question: &str) -> Result<String>;
}

/// Condenses with the generation provider, falling back to
/// [`RuleBasedCondenser`] when the model returns nothing usable.
pub struct LlmCondenser {
    generator: Arc<dyn GenerationProvider>,
    timeout: Duration,
    fallback: RuleBasedCondenser,
}

impl LlmCondenser {
    /// Create a condenser that calls `generator` with the given deadline.
    pub fn new(generator: Arc<dyn GenerationProvider>, timeout: Duration) -> Self {
        Self { generator, timeout, fallback: RuleBasedCondenser }
    }
}

#[async_trait]
impl QueryCondenser for LlmCondenser {
    async fn condense(&self, history: &[Turn], question: &str) -> Result<String> {
        if history.is_empty() {
            return Ok(question.to_string());
        }

        let prompt = PromptBuilder::condense(history, question);
        let raw = generate_with_timeout(self.generator.as_ref(), &prompt, self.timeout).await?;
        let rewritten = clean_rewrite(&raw);

        if rewritten.is_empty() {
            warn!(provider = self.generator.name(), "blank standalone question, using rules");
            return Ok(self.fallback.rewrite(history, question));
        }
        debug!(standalone = %rewritten, "condensed follow-up question");
        Ok(rewritten)
    }
}

/// Resolves pronouns in a follow-up against an earlier question's subject.
///
/// "What is overfitting?" followed by "How do I prevent it?" becomes
/// "How do I prevent overfitting?". When no earlier question names a subject
/// the previous question is appended as context instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedCondenser;

static SUBJECT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^\s*(?:what|who)\s*(?:is|are|was|were|'s|'re)\s+(?:an?\s+|the\s+)?(.+?)[\s?.!]*$",
        r"(?i)^\s*(?:define|explain|describe)\s+(?:an?\s+|the\s+)?(.+?)[\s?.!]*$",
        r"(?i)^\s*(?:tell me about|what about)\s+(?:an?\s+|the\s+)?(.+?)[\s?.!]*$",
        r"(?i)^\s*how\s+(?:does|do)\s+(?:an?\s+|the\s+)?(.+?)\s+work[\s?.!]*$",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static PRONOUN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\b(its|their|it|they|them)\b").ok());

static TRAILING_DEMONSTRATIVE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:this|that)(\s*[?.!]*\s*)$").ok());

/// An "it" that refers to nothing: "Is it possible to ...", "it's worth ...".
static IMPERSONAL_IT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    const PREDICATES: &str = "possible|impossible|necessary|true|important|better|worse|worth|\
                              ok|okay|safe|common|normal|likely|hard|easy|useful|required|enough";
    Regex::new(&format!(
        r"(?i)\b(?:is|was|isn't|wasn't)\s+(it)\s+(?:{PREDICATES})\b|\b(it)(?:'s|\s+is|\s+was)\s+(?:{PREDICATES})\b"
    ))
    .ok()
});

impl RuleBasedCondenser {
    /// Rewrite `question` against `history` without calling a model.
    ///
    /// The subject is taken from the most recent user turn that names one, so
    /// a chain of follow-ups keeps resolving to the topic that started it.
    pub fn rewrite(&self, history: &[Turn], question: &str) -> String {
        let mut user_turns = history.iter().rev().filter(|t| t.role == Role::User).peekable();
        let Some(previous) = user_turns.peek().map(|t| t.content.clone()) else {
            return question.to_string();
        };

        if !is_referential(question) || extract_subject(question).is_some() {
            return question.to_string();
        }

        match user_turns.find_map(|t| extract_subject(&t.content)) {
            Some(subject) => substitute(question, &subject),
            None => format!(
                "{} ({})",
                question.trim(),
                previous.trim().trim_end_matches(['?', '.', '!'])
            ),
        }
    }
}

#[async_trait]
impl QueryCondenser for RuleBasedCondenser {
    async fn condense(&self, history: &[Turn], question: &str) -> Result<String> {
        Ok(self.rewrite(history, question))
    }
}

/// The subject a question asks about, unless it is itself a reference.
fn extract_subject(question: &str) -> Option<String> {
    SUBJECT_PATTERNS
        .iter()
        .find_map(|re| re.captures(question))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty() && !is_referential(s))
}

fn impersonal_spans(text: &str) -> Vec<Range<usize>> {
    let Some(re) = IMPERSONAL_IT.as_ref() else {
        return Vec::new();
    };
    re.captures_iter(text)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.range())
        .collect()
}

fn is_referential(text: &str) -> bool {
    let impersonal = impersonal_spans(text);
    PRONOUN
        .as_ref()
        .is_some_and(|re| re.find_iter(text).any(|m| !impersonal.contains(&m.range())))
        || TRAILING_DEMONSTRATIVE.as_ref().is_some_and(|re| re.is_match(text))
}

fn substitute(question: &str, subject: &str) -> String {
    let impersonal = impersonal_spans(question);
    let mut rewritten = match PRONOUN.as_ref() {
        Some(re) => re
            .replace_all(question, |caps: &regex::Captures<'_>| {
                let pronoun = &caps[1];
                let keep = caps.get(1).is_some_and(|m| impersonal.contains(&m.range()));
                if keep {
                    pronoun.to_string()
                } else if pronoun.eq_ignore_ascii_case("its") || pronoun.eq_ignore_ascii_case("their") {
                    format!("{subject}'s")
                } else {
                    subject.to_string()
                }
            })
            .into_owned(),
        None => question.to_string(),
    };
    if let Some(re) = TRAILING_DEMONSTRATIVE.as_ref() {
        rewritten = re
            .replace(&rewritten, |caps: &regex::Captures<'_>| format!("{subject}{}", &caps[1]))
            .into_owned();
    }
    rewritten
}

/// Strip labels and quotes models like to wrap their rewrite in.
fn clean_rewrite(raw: &str) -> String {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or_default();
    let line = line.strip_prefix("Standalone question:").unwrap_or(line).trim();
    line.trim_matches(|c| c == '"' || c == '\'' || c == '`').trim().to_string()
}
