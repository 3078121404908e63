pub mod attempt;
pub mod history;
pub mod page;
pub mod resource;
pub mod run;

pub use attempt::{AttemptResult, ExecutionResult, SubmissionOutcome};
pub use history::{History, HistoryRecord, RecordKind};
pub use page::{PageContext, PageResources, Transcript};
pub use resource::ResourceKind;
pub use run::{QuizRun, RunOutcome, RunReport};
