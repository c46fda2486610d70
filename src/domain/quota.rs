//! Count-based request quota.
//!
//! A quota admits a client while its counter is below the limit and denies
//! once the counter equals it. The counter never decays on its own: it only
//! drops back when it is reset or swept, after which the client is admitted
//! again immediately.

use std::fmt;

/// Decision made for one inbound unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitDecision {
    /// The request may proceed
    Admit,
    /// The client has used up its quota
    Deny,
}

impl AdmitDecision {
    /// Check if this decision is Admit.
    pub fn is_admit(&self) -> bool {
        matches!(self, AdmitDecision::Admit)
    }

    /// Check if this decision is Deny.
    pub fn is_deny(&self) -> bool {
        matches!(self, AdmitDecision::Deny)
    }
}

/// Error returned when a quota cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaError {
    /// The limit must allow at least one request
    ZeroLimit,
}

impl fmt::Display for QuotaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaError::ZeroLimit => write!(f, "quota limit must be greater than 0"),
        }
    }
}

impl std::error::Error for QuotaError {}

/// Fixed per-client request quota.
///
/// # Example
/// ```
/// use kv_throttle::{AdmitDecision, Quota};
///
/// let quota = Quota::new(2).unwrap();
/// let mut count = 0;
///
/// assert_eq!(quota.register(&mut count), AdmitDecision::Admit);
/// assert_eq!(quota.register(&mut count), AdmitDecision::Admit);
/// assert_eq!(quota.register(&mut count), AdmitDecision::Deny);
/// assert_eq!(count, 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    limit: u64,
}

impl Quota {
    /// Create a new quota.
    ///
    /// # Errors
    /// Returns `QuotaError::ZeroLimit` if `limit` is zero.
    pub fn new(limit: u64) -> Result<Self, QuotaError> {
        if limit == 0 {
            return Err(QuotaError::ZeroLimit);
        }
        Ok(Self { limit })
    }

    /// The configured limit.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Decide for a client whose counter currently reads `count`, updating it
    /// in place. A denied request leaves the counter untouched.
    pub fn register(&self, count: &mut u64) -> AdmitDecision {
        Self::register_with_limit(self.limit, count)
    }

    /// Same as [`Quota::register`] for a limit chosen per call.
    ///
    /// Only an exact match with `limit` denies. A counter already above the
    /// limit (left behind by a limiter with a larger quota) keeps counting.
    pub fn register_with_limit(limit: u64, count: &mut u64) -> AdmitDecision {
        if *count == limit {
            AdmitDecision::Deny
        } else {
            *count = count.saturating_add(1);
            AdmitDecision::Admit
        }
    }
}

impl Default for Quota {
    /// The observed default of two requests per client.
    fn default() -> Self {
        Self { limit: 2 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_admits_up_to_limit() {
        let quota = Quota::new(3).unwrap();
        let mut count = 0;

        assert_eq!(quota.register(&mut count), AdmitDecision::Admit);
        assert_eq!(quota.register(&mut count), AdmitDecision::Admit);
        assert_eq!(quota.register(&mut count), AdmitDecision::Admit);
        assert_eq!(count, 3);

        assert_eq!(quota.register(&mut count), AdmitDecision::Deny);
        assert_eq!(quota.register(&mut count), AdmitDecision::Deny);
        assert_eq!(count, 3);
    }

    #[test]
    fn test_reset_counter_admits_again() {
        let quota = Quota::new(1).unwrap();
        let mut count = 0;

        assert!(quota.register(&mut count).is_admit());
        assert!(quota.register(&mut count).is_deny());

        count = 0;
        assert!(quota.register(&mut count).is_admit());
        assert_eq!(count, 1);
    }

    #[test]
    fn test_zero_limit_rejected() {
        assert_eq!(Quota::new(0), Err(QuotaError::ZeroLimit));
    }

    #[test]
    fn test_default_limit_is_two() {
        assert_eq!(Quota::default().limit(), 2);
    }

    #[test]
    fn test_counter_above_limit_keeps_counting() {
        let mut count = 5;
        assert_eq!(
            Quota::register_with_limit(2, &mut count),
            AdmitDecision::Admit
        );
        assert_eq!(count, 6);
    }

    #[test]
    fn test_decision_helpers() {
        assert!(AdmitDecision::Admit.is_admit());
        assert!(!AdmitDecision::Admit.is_deny());
        assert!(AdmitDecision::Deny.is_deny());
    }
}
