pub mod audio_service;
pub mod exam_service;
pub mod grading_service;
pub mod image_service;
pub mod llm_service;
pub mod normalizer;
pub mod prompts;
pub mod share_service;
