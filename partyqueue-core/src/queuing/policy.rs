use std::sync::Arc;

/// The lowest priority a waiting request can have.
pub const MIN_WAITING_PRIORITY: i32 = 0;

/// Decides the new priority of a waiting request when it is requested again.
///
/// Receives the current priority and the vote count after the new vote.
/// Results below [MIN_WAITING_PRIORITY] are clamped by the queue.
pub type BoostPolicy = Arc<dyn Fn(i32, u32) -> i32 + Send + Sync>;

/// Moves a request one step towards the front per boost.
pub fn step_boost() -> BoostPolicy {
    Arc::new(|priority: i32, _votes: u32| priority - 1)
}

/// Moves a request as many steps towards the front as it has votes. Used by default.
pub fn vote_weighted_boost() -> BoostPolicy {
    Arc::new(|priority: i32, votes: u32| {
        priority.saturating_sub(i32::try_from(votes).unwrap_or(i32::MAX))
    })
}
