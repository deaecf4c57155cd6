//! Hypothetical-answer query augmentation (HyDE).
//!
//! A question is rewritten into a short, answer-shaped paragraph before it is
//! embedded. Generation is best effort: any failure leaves the query as is.

use std::sync::Arc;
use std::time::Duration;

use reporag_core::config::HydeSettings;
use reporag_core::traits::AnswerGenerator;

pub mod client;

pub use client::ChatCompletionsClient;

pub fn hyde_prompt(query: &str) -> String {
    format!(
        "Given this question about a GitHub repository, write a short paragraph (2-3 sentences) \
         that would be a good answer. Be specific and technical.\n\nQuestion: {query}\n\nAnswer:"
    )
}

pub struct HydeAugmenter {
    generator: Option<Arc<dyn AnswerGenerator>>,
    min_query_chars: usize,
    max_tokens: u32,
    timeout: Duration,
}

impl HydeAugmenter {
    pub fn new(
        generator: Option<Arc<dyn AnswerGenerator>>,
        min_query_chars: usize,
        max_tokens: u32,
        timeout: Duration,
    ) -> Self {
        Self { generator, min_query_chars, max_tokens, timeout }
    }

    /// An augmenter that never rewrites.
    pub fn disabled() -> Self {
        Self::new(None, 0, 0, Duration::from_secs(1))
    }

    /// Wire the chat-completions client when HyDE is enabled and a key is
    /// configured; otherwise augmentation is a pass-through.
    pub fn from_settings(settings: &HydeSettings) -> Self {
        let configured =
            settings.enabled && settings.api_key.as_deref().is_some_and(|k| !k.is_empty());
        let generator: Option<Arc<dyn AnswerGenerator>> = if configured {
            match ChatCompletionsClient::from_settings(settings) {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    tracing::warn!(error = %e, "could not build answer generator; HyDE disabled");
                    None
                }
            }
        } else {
            tracing::info!("HyDE pass-through: no answer generator configured");
            None
        };
        Self::new(
            generator,
            settings.min_query_chars,
            settings.max_tokens,
            Duration::from_secs(settings.timeout_secs),
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.generator.is_some()
    }

    /// Queries of `min_query_chars` characters or fewer are left alone.
    pub fn should_augment(&self, query: &str) -> bool {
        query.chars().count() > self.min_query_chars
    }

    /// Text to embed for `query`. Never fails: generator errors, timeouts and
    /// blank answers all fall back to the query itself.
    pub async fn augment(&self, query: &str) -> String {
        let Some(generator) = &self.generator else {
            return query.to_string();
        };
        if !self.should_augment(query) {
            return query.to_string();
        }
        let prompt = hyde_prompt(query);
        let generated =
            tokio::time::timeout(self.timeout, generator.complete(&prompt, self.max_tokens)).await;
        match generated {
            Ok(Ok(answer)) if !answer.trim().is_empty() => {
                let answer = answer.trim().to_string();
                let preview: String = answer.chars().take(80).collect();
                tracing::debug!(%preview, "HyDE generated");
                answer
            }
            Ok(Ok(_)) => {
                tracing::warn!("HyDE generation returned an empty answer; using raw query");
                query.to_string()
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "HyDE generation failed; using raw query");
                query.to_string()
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis(),
                    "HyDE generation timed out; using raw query"
                );
                query.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reporag_core::error::{Error, Result};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Canned {
        answer: Result<String>,
        calls: AtomicUsize,
    }

    impl Canned {
        fn ok(s: &str) -> Arc<Self> {
            Arc::new(Self { answer: Ok(s.to_string()), calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl AnswerGenerator for Canned {
        async fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(prompt.contains("Question: "));
            match &self.answer {
                Ok(s) => Ok(s.clone()),
                Err(e) => Err(Error::Generation(e.to_string())),
            }
        }
    }

    struct Slow;

    #[async_trait]
    impl AnswerGenerator for Slow {
        async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("too late".to_string())
        }
    }

    const LONG: &str = "how do I configure the build for release?";

    fn augmenter(generator: Arc<dyn AnswerGenerator>) -> HydeAugmenter {
        HydeAugmenter::new(Some(generator), 20, 150, Duration::from_millis(100))
    }

    #[tokio::test]
    async fn long_query_is_replaced_by_trimmed_answer() {
        let a = augmenter(Canned::ok("  Run cargo build --release.  \n"));
        assert_eq!(a.augment(LONG).await, "Run cargo build --release.");
    }

    #[tokio::test]
    async fn short_query_skips_generator() {
        let gen = Canned::ok("answer");
        let a = augmenter(gen.clone());
        let twenty = "a".repeat(20);
        assert_eq!(a.augment(&twenty).await, twenty);
        assert_eq!(gen.calls.load(Ordering::SeqCst), 0);
        assert!(a.should_augment(&"a".repeat(21)));
    }

    #[tokio::test]
    async fn failures_fall_back_to_query() {
        let failing = Arc::new(Canned {
            answer: Err(Error::Generation("503".into())),
            calls: AtomicUsize::new(0),
        });
        assert_eq!(augmenter(failing).augment(LONG).await, LONG);
        assert_eq!(augmenter(Canned::ok("   ")).augment(LONG).await, LONG);
    }

    #[tokio::test]
    async fn timeout_falls_back_to_query() {
        assert_eq!(augmenter(Arc::new(Slow)).augment(LONG).await, LONG);
    }

    #[tokio::test]
    async fn missing_key_is_pass_through() {
        let a = HydeAugmenter::from_settings(&HydeSettings::default());
        assert!(!a.is_enabled());
        assert_eq!(a.augment(LONG).await, LONG);
    }

    #[test]
    fn prompt_embeds_question() {
        let p = hyde_prompt("what is this?");
        assert!(p.starts_with("Given this question about a GitHub repository"));
        assert!(p.ends_with("Question: what is this?\n\nAnswer:"));
    }
}
