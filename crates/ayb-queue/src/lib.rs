//! Durable, Postgres-backed job queue and cron scheduler.

pub mod backoff;
pub mod job;
pub mod queue;
pub mod scheduler;

pub use backoff::BackoffStrategy;
pub use job::{Job, JobState};
pub use queue::{
    cancel, claim_next, enqueue, get, list, mark_completed, mark_failed, queue_stats, retry,
    sweep_expired_leases, EnqueueOptions, QueueStats,
};
pub use scheduler::{compute_next_run, due_schedules, fire_schedule, Schedule};
