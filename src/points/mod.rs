//! Concrete extension points built on [`Delegate`](crate::Delegate).
//!
//! Each point defines a handler trait and a thin wrapper exposing
//! point-specific accessors. Callers treat an empty or `None` result as
//! "nothing to show".

pub mod message_output;
pub mod question;
pub mod user_profile;

pub use message_output::{MessageOutputDelegate, MessageOutputDisplay, MessageOutputHandler};
pub use question::{Answers, Question, QuestionDelegate, QuestionHandler, ResponseCheck};
pub use user_profile::{
    ProfileContext, ProfileEntry, ProfileHandlerData, ProfileHandlerType, UserProfile,
    UserProfileDelegate, UserProfileHandler,
};
