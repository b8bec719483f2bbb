//! Interactive prompting for command dispatch
//!
//! Dispatch asks a [`Prompter`] for answers when a command declares prompt
//! questions. Terminal prompting lives in the `cogs` crate; this module
//! provides the trait and the non-terminal implementations.

use async_trait::async_trait;
use cogs_api::PromptQuestion;
use serde_json::{Map, Value};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Answers keyed by question name
pub type Answers = Map<String, Value>;

/// Error type for prompt operations
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt cancelled by user")]
    Cancelled,

    #[error("Non-interactive environment")]
    NonInteractive,

    #[error("No answer for question '{0}'")]
    Unanswered(String),

    #[error("Prompt failed: {0}")]
    Failed(String),
}

/// Collects answers for a command's prompt schema
#[async_trait]
pub trait Prompter: Send + Sync {
    async fn prompt(&self, questions: &[PromptQuestion]) -> Result<Answers, PromptError>;
}

/// Refuses every prompt
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractivePrompter;

#[async_trait]
impl Prompter for NonInteractivePrompter {
    async fn prompt(&self, _questions: &[PromptQuestion]) -> Result<Answers, PromptError> {
        Err(PromptError::NonInteractive)
    }
}

/// Answers from a prepared map, falling back to question defaults
///
/// Records the questions it was asked.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: Answers,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.answers.insert(name.into(), value.into());
        self
    }

    /// Names of the questions asked so far
    pub fn asked(&self) -> Vec<String> {
        self.asked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn prompt(&self, questions: &[PromptQuestion]) -> Result<Answers, PromptError> {
        let mut answers = Answers::new();
        for question in questions {
            self.asked
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(question.name.clone());

            let answer = self
                .answers
                .get(&question.name)
                .or(question.default_value.as_ref())
                .cloned()
                .ok_or_else(|| PromptError::Unanswered(question.name.clone()))?;
            answers.insert(question.name.clone(), answer);
        }
        Ok(answers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cogs_api::QuestionKind;
    use serde_json::json;

    #[tokio::test]
    async fn test_scripted_answers_and_defaults() {
        let prompter = ScriptedPrompter::new().answer("name", "api");
        let questions = vec![
            PromptQuestion::new("name", QuestionKind::Input),
            PromptQuestion::new("confirm", QuestionKind::Confirm).default_value(true),
        ];

        let answers = prompter.prompt(&questions).await.unwrap();
        assert_eq!(answers["name"], json!("api"));
        assert_eq!(answers["confirm"], json!(true));
        assert_eq!(prompter.asked(), vec!["name", "confirm"]);
    }

    #[tokio::test]
    async fn test_scripted_unanswered() {
        let prompter = ScriptedPrompter::new();
        let questions = vec![PromptQuestion::new("token", QuestionKind::Password)];
        assert!(matches!(
            prompter.prompt(&questions).await,
            Err(PromptError::Unanswered(name)) if name == "token"
        ));
    }

    #[tokio::test]
    async fn test_non_interactive_refuses() {
        let questions = vec![PromptQuestion::new("name", QuestionKind::Input)];
        assert!(matches!(
            NonInteractivePrompter.prompt(&questions).await,
            Err(PromptError::NonInteractive)
        ));
    }
}
