use std::time::Duration;

/// Tuning of the adaptive pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    /// Starting pause.
    pub pause: Duration,
    /// Subtracted after a batch succeeds on its first attempt.
    pub decrement: Duration,
    /// Added after every rejected attempt.
    pub increment: Duration,
    pub min_pause: Duration,
    pub max_pause: Duration,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            pause: Duration::from_secs(120),
            decrement: Duration::from_secs(20),
            increment: Duration::from_secs(10),
            min_pause: Duration::from_secs(10),
            max_pause: Duration::from_secs(210),
        }
    }
}

/// The current pause, owned by the submission loop.
#[derive(Debug, Clone)]
pub struct Pacer {
    policy: PacingPolicy,
    current: Duration,
}

impl Pacer {
    pub fn new(policy: PacingPolicy) -> Self {
        let current = policy.pause.max(policy.min_pause).min(policy.max_pause);
        Self { policy, current }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn reward(&mut self) {
        self.current = self
            .current
            .saturating_sub(self.policy.decrement)
            .max(self.policy.min_pause);
    }

    pub fn penalize(&mut self) {
        self.current = (self.current + self.policy.increment).min(self.policy.max_pause);
    }

    pub async fn wait(&self) {
        tokio::time::sleep(self.current).await;
    }
}
