use crate::models::exam::ExamQuestion;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradedQuestion {
    pub question_id: u32,
    pub part: u32,
    pub candidate_answer: Option<String>,
    pub correct_answer: String,
    pub explanation: String,
    pub is_correct: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub needs_review: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeReport {
    pub score: i32,
    pub max_score: i32,
    pub needs_review: bool,
    pub graded: Vec<GradedQuestion>,
}

pub struct GradingService;

impl GradingService {
    /// Option questions compare the chosen letter with the key; open questions
    /// compare text, ignoring case and surrounding whitespace.
    pub fn check_answer(question: &ExamQuestion, answer: &str) -> bool {
        let answer = answer.trim();
        let key = question.correct_option.trim();
        if answer.is_empty() || key.is_empty() {
            return false;
        }

        if question.is_multiple_choice() {
            if answer.eq_ignore_ascii_case(key) {
                return true;
            }
            // The candidate may send the option text instead of its letter.
            return option_index(key)
                .and_then(|i| question.options.get(i))
                .map(|text| text.trim().eq_ignore_ascii_case(answer))
                .unwrap_or(false);
        }

        answer.to_lowercase() == key.to_lowercase()
    }

    /// Questions without an answer key (writing and speaking prompts) carry
    /// no marks and are flagged for review when answered.
    pub fn grade(questions: &[ExamQuestion], answers: &BTreeMap<u32, String>) -> GradeReport {
        let mut score = 0;
        let mut max_score = 0;
        let mut needs_review = false;
        let mut graded = Vec::with_capacity(questions.len());

        for q in questions {
            let candidate_answer = answers
                .get(&q.id)
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty());
            let gradable = !q.correct_option.trim().is_empty();

            let mut is_correct = false;
            let mut review = false;
            if gradable {
                max_score += 1;
                is_correct = candidate_answer
                    .as_deref()
                    .map(|a| Self::check_answer(q, a))
                    .unwrap_or(false);
                if is_correct {
                    score += 1;
                }
            } else if candidate_answer.is_some() {
                review = true;
                needs_review = true;
            }

            graded.push(GradedQuestion {
                question_id: q.id,
                part: q.part,
                candidate_answer,
                correct_answer: q.correct_option.clone(),
                explanation: q.explanation.clone(),
                is_correct,
                needs_review: review,
            });
        }

        GradeReport {
            score,
            max_score,
            needs_review,
            graded,
        }
    }
}

fn option_index(letter: &str) -> Option<usize> {
    let mut chars = letter.chars();
    let c = chars.next()?.to_ascii_uppercase();
    if chars.next().is_some() || !c.is_ascii_uppercase() {
        return None;
    }
    Some((c as u8 - b'A') as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mcq(id: u32, key: &str) -> ExamQuestion {
        ExamQuestion {
            id,
            part: 1,
            question: format!("Question {}", id),
            options: vec!["cat".into(), "dog".into(), "bird".into(), "fish".into()],
            correct_option: key.into(),
            ..Default::default()
        }
    }

    fn open(id: u32, key: &str) -> ExamQuestion {
        ExamQuestion {
            id,
            part: 2,
            question: "Fill the gap".into(),
            correct_option: key.into(),
            ..Default::default()
        }
    }

    #[test]
    fn option_answers_match_letter_or_text() {
        let q = mcq(1, "B");
        assert!(GradingService::check_answer(&q, " b "));
        assert!(GradingService::check_answer(&q, "Dog"));
        assert!(!GradingService::check_answer(&q, "A"));
        assert!(!GradingService::check_answer(&q, ""));
    }

    #[test]
    fn open_answers_compare_trimmed_lowercase() {
        let q = open(1, "Nevertheless");
        assert!(GradingService::check_answer(&q, "  nevertheless"));
        assert!(!GradingService::check_answer(&q, "however"));
        assert!(!GradingService::check_answer(&open(2, ""), "anything"));
    }

    #[test]
    fn grade_totals_only_keyed_questions() {
        let questions = vec![mcq(1, "A"), mcq(2, "C"), open(3, "despite"), open(4, "")];
        let answers = BTreeMap::from([
            (1, "A".to_string()),
            (2, "B".to_string()),
            (3, "Despite ".to_string()),
            (4, "My essay".to_string()),
        ]);

        let report = GradingService::grade(&questions, &answers);
        assert_eq!(report.score, 2);
        assert_eq!(report.max_score, 3);
        assert!(report.needs_review);
        assert!(report.graded[0].is_correct);
        assert!(!report.graded[1].is_correct);
        assert!(report.graded[3].needs_review);
    }

    #[test]
    fn unanswered_questions_score_zero() {
        let report = GradingService::grade(&[mcq(1, "A")], &BTreeMap::new());
        assert_eq!((report.score, report.max_score), (0, 1));
        assert_eq!(report.graded[0].candidate_answer, None);
        assert!(!report.needs_review);
    }
}
