pub mod errors;
pub mod slides;
pub mod storage;
pub mod summarizer;
