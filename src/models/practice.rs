use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// How a question button in the navigator should be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavState {
    Current,
    Answered,
    Unanswered,
}

/// Practice state: answers, review flags and which questions have been
/// submitted for feedback. Question ids are 1-based.
///
/// The navigation and answer methods mirror what the practice UI does and
/// are client-side helpers. The server only reads a finished snapshot of
/// this struct when an attempt is submitted, and checks it against the
/// exam first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PracticeSession {
    pub total_questions: u32,
    #[serde(default = "first_question")]
    pub current_question: u32,
    #[serde(default)]
    pub answers: BTreeMap<u32, String>,
    #[serde(default)]
    pub flagged: BTreeSet<u32>,
    #[serde(default)]
    pub submitted: BTreeSet<u32>,
}

fn first_question() -> u32 {
    1
}

impl PracticeSession {
    pub fn new(total_questions: u32) -> Self {
        Self {
            total_questions,
            current_question: 1,
            ..Default::default()
        }
    }

    /// Records an answer unless the question is already locked in.
    pub fn answer(&mut self, question: u32, value: impl Into<String>) -> bool {
        if self.submitted.contains(&question) || !self.in_range(question) {
            return false;
        }
        self.answers.insert(question, value.into());
        true
    }

    pub fn toggle_flag(&mut self, question: u32) -> bool {
        if !self.flagged.remove(&question) {
            self.flagged.insert(question);
            return true;
        }
        false
    }

    /// Locks the current question. Refused while it has no answer.
    pub fn submit_current(&mut self) -> bool {
        let has_answer = self
            .answers
            .get(&self.current_question)
            .map(|a| !a.is_empty())
            .unwrap_or(false);
        if !has_answer {
            return false;
        }
        self.submitted.insert(self.current_question);
        true
    }

    pub fn is_submitted(&self, question: u32) -> bool {
        self.submitted.contains(&question)
    }

    pub fn next(&mut self) -> u32 {
        if self.current_question < self.total_questions {
            self.current_question += 1;
        }
        self.current_question
    }

    pub fn back(&mut self) -> u32 {
        self.current_question = self.current_question.saturating_sub(1).max(1);
        self.current_question
    }

    pub fn go_to(&mut self, question: u32) -> bool {
        if !self.in_range(question) {
            return false;
        }
        self.current_question = question;
        true
    }

    pub fn nav_state(&self, question: u32) -> NavState {
        if question == self.current_question {
            NavState::Current
        } else if self.answers.get(&question).map(|a| !a.is_empty()).unwrap_or(false) {
            NavState::Answered
        } else {
            NavState::Unanswered
        }
    }

    pub fn answered_count(&self) -> usize {
        self.answers.values().filter(|a| !a.is_empty()).count()
    }

    fn in_range(&self, question: u32) -> bool {
        question >= 1 && question <= self.total_questions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_requires_an_answer() {
        let mut session = PracticeSession::new(3);
        assert!(!session.submit_current());
        assert!(session.answer(1, "B"));
        assert!(session.submit_current());
        assert!(session.is_submitted(1));
        assert!(!session.answer(1, "C"), "submitted answers are locked");
        assert_eq!(session.answers[&1], "B");
    }

    #[test]
    fn navigation_is_bounded() {
        let mut session = PracticeSession::new(2);
        assert_eq!(session.back(), 1);
        assert_eq!(session.next(), 2);
        assert_eq!(session.next(), 2);
        assert!(!session.go_to(3));
        assert!(session.go_to(1));
    }

    #[test]
    fn flags_toggle_and_nav_state_tracks_answers() {
        let mut session = PracticeSession::new(3);
        assert!(session.toggle_flag(2));
        assert!(!session.toggle_flag(2));
        assert!(session.flagged.is_empty());

        session.answer(2, "A");
        assert_eq!(session.nav_state(1), NavState::Current);
        assert_eq!(session.nav_state(2), NavState::Answered);
        assert_eq!(session.nav_state(3), NavState::Unanswered);
        assert_eq!(session.answered_count(), 1);
    }
}
