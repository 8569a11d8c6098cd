use crate::models::exam::{CefrLevel, ExamType};

pub const EXAM_SYSTEM_PROMPT: &str = "You are an expert in creating Cambridge English Qualification exams. Your output must be a valid JSON object, specifically a JSON array of exam parts.";

pub const GRADER_SYSTEM_PROMPT: &str = r#"You are a senior Cambridge English examiner.
Assess the candidate's writing against the official Cambridge assessment scale for the stated task.

Return a JSON object with exactly these fields:
{
  "score": <integer 0-20>,
  "band": "<CEFR band the writing demonstrates, e.g. C1>",
  "feedback": "<2-3 sentence overall comment>",
  "detailed_analysis": {
    "content": "<comment>",
    "communicative_achievement": "<comment>",
    "organisation": "<comment>",
    "language": "<comment>"
  },
  "corrections": [
    { "original": "<exact phrase from the text>", "correction": "<improved phrase>", "reason": "<short reason>" }
  ]
}
Be strict and specific. Quote the candidate's own words in "original"."#;

#[derive(Debug, Clone)]
pub struct ExamRequest {
    pub exam_type: ExamType,
    pub level: CefrLevel,
    pub topic: String,
    pub part_count: usize,
    pub words_per_part: usize,
}

pub fn build_exam_prompt(req: &ExamRequest) -> String {
    let requirement = format!(
        "STRICT REQUIREMENT: Generate exactly {n} distinct exam parts. Each part must have a unique {unit} (1 paragraph, approx {w} words) and 5-7 questions. Output must be a JSON array of {n} objects. For each question, provide an 'explanation' field: a quick 1-sentence logical rationale for the correct answer. For each part, provide an 'examinerNotes' field: a precise 1-sentence tip on methods/techniques to answer this type of question.",
        n = req.part_count,
        w = req.words_per_part,
        unit = content_unit(req.exam_type),
    );

    format!(
        "Create a Cambridge English {label} paper at CEFR level {level} ({level_label}).\nTopic: {topic}. {requirement}\n\n{skill}\n\nEvery part object must follow this shape:\n{schema}\n\nReturn only the JSON array, with no commentary.",
        label = req.exam_type.label(),
        level = req.level.as_str(),
        level_label = req.level.label(),
        topic = req.topic.trim(),
        requirement = requirement,
        skill = skill_guidance(req.exam_type),
        schema = schema_example(req.exam_type),
    )
}

pub fn build_grading_prompt(task_type: &str, question_context: &str, student_input: &str) -> String {
    format!(
        "Task type: {}\n\nTask prompt:\n{}\n\nCandidate's answer:\n{}",
        task_type,
        if question_context.trim().is_empty() {
            "(not provided)"
        } else {
            question_context
        },
        student_input
    )
}

fn content_unit(exam_type: ExamType) -> &'static str {
    match exam_type {
        ExamType::Reading => "reading text",
        ExamType::Writing => "writing task input text",
        ExamType::Listening => "listening transcript",
        ExamType::Speaking => "speaking task brief",
    }
}

fn skill_guidance(exam_type: ExamType) -> &'static str {
    match exam_type {
        ExamType::Reading => "Questions are multiple choice with four options labelled implicitly A-D; 'correctOption' is the letter of the right option. Open cloze or word formation questions have no options and 'correctOption' holds the exact expected word.",
        ExamType::Writing => "Each part is a writing task. Put the task input in 'content'. Provide 'modelAnswer' (a full high-band answer) and 'howToApproach' (a short plan). 'questions' holds the task prompt(s) without options.",
        ExamType::Listening => "'content' is the full transcript that will be read aloud, written as natural speech with speaker labels where there is more than one speaker. Questions are multiple choice with 'correctOption' as a letter.",
        ExamType::Speaking => "Each part is a speaking task. Questions may carry 'part1Questions' (objects with 'question', 'answer', 'tip'), 'imagePrompts' (short descriptions of photos to compare), 'possibleAnswers' and 'tips'.",
    }
}

fn schema_example(exam_type: ExamType) -> &'static str {
    match exam_type {
        ExamType::Reading | ExamType::Listening => r#"{"title": "...", "instructions": "...", "content": "...", "examinerNotes": "...", "questions": [{"question": "...", "options": ["...", "...", "...", "..."], "correctOption": "B", "explanation": "..."}]}"#,
        ExamType::Writing => r#"{"title": "...", "instructions": "...", "content": "...", "examinerNotes": "...", "modelAnswer": "...", "howToApproach": "...", "questions": [{"question": "...", "options": [], "correctOption": "", "explanation": "..."}]}"#,
        ExamType::Speaking => r#"{"title": "...", "instructions": "...", "content": "...", "examinerNotes": "...", "tips": "...", "questions": [{"question": "...", "options": [], "correctOption": "", "explanation": "...", "imagePrompts": ["..."], "possibleAnswers": ["..."], "tips": "...", "part1Questions": [{"question": "...", "answer": "...", "tip": "..."}]}]}"#,
    }
}
