//! Question type handlers.
//!
//! Handlers are keyed by their full type name (`qtype_<type>`). A built-in
//! default handler answers for types nobody registered, so every accessor
//! here returns a value.

use crate::delegate::{Delegate, DelegateHandler};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Delegate name, also used as the feature prefix.
pub const QUESTION_DELEGATE: &str = "QuestionDelegate";

/// A question as rendered in an attempt.
#[derive(Debug, Clone, Default)]
pub struct Question {
    pub slot: u32,
    /// Short type name, e.g. `"shortanswer"`.
    pub qtype: String,
    pub html: String,
}

/// Form answers keyed by field name, without the slot prefix.
pub type Answers = BTreeMap<String, String>;

/// Tri-state outcome for response checks that may not be decidable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCheck {
    Yes,
    No,
    Unknown,
}

/// Full handler key for a short question type.
pub fn full_type_name(qtype: &str) -> String {
    format!("qtype_{qtype}")
}

/// Handler for one question type.
pub trait QuestionHandler: DelegateHandler {
    /// Behaviour to use instead of `default`, if the type overrides it.
    fn behaviour(&self, _question: &Question, _default: &str) -> Option<String> {
        None
    }

    /// Message explaining why the question cannot be submitted.
    fn prevent_submit_message(&self, _question: &Question) -> Option<String> {
        None
    }

    fn is_complete_response(&self, _question: &Question, _answers: &Answers) -> ResponseCheck {
        ResponseCheck::Unknown
    }

    fn is_gradable_response(&self, _question: &Question, _answers: &Answers) -> ResponseCheck {
        ResponseCheck::Unknown
    }

    fn is_same_response(&self, _question: &Question, _prev: &Answers, _new: &Answers) -> bool {
        false
    }
}

/// Fallback used for unsupported question types.
struct DefaultQuestionHandler;

#[async_trait]
impl DelegateHandler for DefaultQuestionHandler {
    fn name(&self) -> &str {
        "qtype_default"
    }
}

impl QuestionHandler for DefaultQuestionHandler {}

/// Question type extension point.
pub struct QuestionDelegate {
    delegate: Arc<Delegate<dyn QuestionHandler>>,
}

impl QuestionDelegate {
    pub fn new() -> Self {
        let delegate = Delegate::<dyn QuestionHandler>::new(QUESTION_DELEGATE)
            .with_feature_prefix(format!("{QUESTION_DELEGATE}_"))
            .with_unique_keys()
            .with_default_handler(Arc::new(DefaultQuestionHandler));
        Self {
            delegate: Arc::new(delegate),
        }
    }

    /// The underlying registry, for registration and refreshes.
    pub fn delegate(&self) -> &Arc<Delegate<dyn QuestionHandler>> {
        &self.delegate
    }

    pub fn behaviour_for(&self, question: &Question, default: &str) -> String {
        self.delegate
            .execute_function_on_enabled(&full_type_name(&question.qtype), |h| {
                h.behaviour(question, default)
            })
            .flatten()
            .unwrap_or_else(|| default.to_string())
    }

    pub fn prevent_submit_message(&self, question: &Question) -> Option<String> {
        self.delegate
            .execute_function_on_enabled(&full_type_name(&question.qtype), |h| {
                h.prevent_submit_message(question)
            })
            .flatten()
    }

    pub fn is_complete_response(&self, question: &Question, answers: &Answers) -> ResponseCheck {
        self.delegate
            .execute_function_on_enabled(&full_type_name(&question.qtype), |h| {
                h.is_complete_response(question, answers)
            })
            .unwrap_or(ResponseCheck::Unknown)
    }

    pub fn is_gradable_response(&self, question: &Question, answers: &Answers) -> ResponseCheck {
        self.delegate
            .execute_function_on_enabled(&full_type_name(&question.qtype), |h| {
                h.is_gradable_response(question, answers)
            })
            .unwrap_or(ResponseCheck::Unknown)
    }

    pub fn is_same_response(&self, question: &Question, prev: &Answers, new: &Answers) -> bool {
        self.delegate
            .execute_function_on_enabled(&full_type_name(&question.qtype), |h| {
                h.is_same_response(question, prev, new)
            })
            .unwrap_or(false)
    }

    /// Whether an enabled handler exists for the short type `qtype`.
    pub fn is_question_supported(&self, qtype: &str) -> bool {
        self.delegate.has_handler(&full_type_name(qtype), true)
    }
}

impl Default for QuestionDelegate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ShortAnswer;

    #[async_trait]
    impl DelegateHandler for ShortAnswer {
        fn name(&self) -> &str {
            "ShortAnswerHandler"
        }

        fn key(&self) -> &str {
            "qtype_shortanswer"
        }
    }

    impl QuestionHandler for ShortAnswer {
        fn behaviour(&self, _question: &Question, default: &str) -> Option<String> {
            (default == "deferredfeedback").then(|| "deferredcbm".to_string())
        }

        fn is_complete_response(&self, _question: &Question, answers: &Answers) -> ResponseCheck {
            match answers.get("answer") {
                Some(a) if !a.trim().is_empty() => ResponseCheck::Yes,
                _ => ResponseCheck::No,
            }
        }

        fn is_same_response(&self, _question: &Question, prev: &Answers, new: &Answers) -> bool {
            prev.get("answer") == new.get("answer")
        }
    }

    fn question(qtype: &str) -> Question {
        Question {
            slot: 1,
            qtype: qtype.to_string(),
            html: String::new(),
        }
    }

    fn answers(answer: &str) -> Answers {
        Answers::from([("answer".to_string(), answer.to_string())])
    }

    #[tokio::test]
    async fn test_registered_type() {
        let questions = QuestionDelegate::new();
        questions.delegate().register_handler(Arc::new(ShortAnswer));
        questions.delegate().update_handlers().await;

        let q = question("shortanswer");
        assert!(questions.is_question_supported("shortanswer"));
        assert_eq!(questions.behaviour_for(&q, "deferredfeedback"), "deferredcbm");
        assert_eq!(questions.behaviour_for(&q, "interactive"), "interactive");
        assert_eq!(questions.is_complete_response(&q, &answers("42")), ResponseCheck::Yes);
        assert_eq!(questions.is_complete_response(&q, &answers(" ")), ResponseCheck::No);
        assert!(questions.is_same_response(&q, &answers("a"), &answers("a")));
    }

    #[tokio::test]
    async fn test_unsupported_type_uses_defaults() {
        let questions = QuestionDelegate::new();
        questions.delegate().update_handlers().await;

        let q = question("essay");
        assert!(!questions.is_question_supported("essay"));
        assert_eq!(questions.behaviour_for(&q, "manualgraded"), "manualgraded");
        assert_eq!(questions.prevent_submit_message(&q), None);
        assert_eq!(questions.is_gradable_response(&q, &Answers::new()), ResponseCheck::Unknown);
        assert!(!questions.is_same_response(&q, &Answers::new(), &Answers::new()));
    }
}
