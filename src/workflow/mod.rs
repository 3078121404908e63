pub mod deadline;
pub mod prompt;
pub mod question_ctx;
pub mod question_flow;

pub use deadline::{next_phase, LoopState, RunLimits, RunPhase};
pub use prompt::wrap_code;
pub use question_ctx::QuestionCtx;
pub use question_flow::{QuestionFlow, QuestionOutcome, QuestionReport};
