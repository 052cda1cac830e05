mod aggregate;
pub mod clock;
mod governed;
mod openai;
mod rate_governor;
mod traits;

pub use aggregate::{aggregate, SlideResult};
pub use clock::SystemClock;
pub use governed::GovernedSummarizer;
pub use openai::{OpenAiSettings, OpenAiSummarizer};
pub use rate_governor::RateGovernor;
pub use traits::SummarizationClient;
