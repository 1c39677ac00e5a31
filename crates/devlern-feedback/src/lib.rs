#![warn(clippy::unwrap_used, clippy::expect_used)]

//! Episodes, human feedback and the task cycle of devlern.
//!
//! [`Agent`] ties the pieces together: it resolves a task string, asks the
//! [`QTable`](devlern_qlearn::QTable) for an action, runs it through the
//! injected [`Executor`](devlern_core::Executor) and records the decision.
//! Processing a task never trains the table; only
//! [`Agent::apply_feedback`] does, using the recorded internal reward as its
//! base.

macro_rules! log_warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "telemetry")]
        tracing::warn!($($arg)*);
        #[cfg(not(feature = "telemetry"))]
        eprintln!($($arg)*);
    }};
}

macro_rules! log_info {
    ($($arg:tt)*) => {{
        #[cfg(feature = "telemetry")]
        tracing::info!($($arg)*);
    }};
}

pub mod agent;
pub mod config;
pub mod episode;
pub mod error;
pub mod feedback;
pub mod sink;
pub mod stats;
pub mod store;

use rand::Rng;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

pub use agent::{Agent, Suggestion, TaskResult};
pub use config::{AgentConfig, RewardPolicy};
pub use episode::{Episode, EpisodeStep, EpisodeSummary};
pub use error::{AgentError, Result};
pub use feedback::FeedbackSign;
pub use sink::{JsonlSink, MemorySink, NullSink};
pub use stats::{LearningStatistics, SessionStats, StateVisits};
pub use store::PolicyStore;

/// Fallback timestamp when formatting fails
const FALLBACK_TIMESTAMP: &str = "1970-01-01T00:00:00Z";

pub(crate) fn iso8601_now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| FALLBACK_TIMESTAMP.to_string())
}

/// `TASK_<yyyymmdd_HHMMSS>_<4 digits>` on the UTC clock.
pub(crate) fn generate_task_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    let now = OffsetDateTime::now_utc();
    format!(
        "TASK_{:04}{:02}{:02}_{:02}{:02}{:02}_{}",
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
        rng.gen_range(1000..10000)
    )
}
