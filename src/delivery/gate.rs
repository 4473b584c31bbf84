//! Cooldown and quiet-hours gate for alert deliveries
//!
//! Each alert category moves through `Idle -> Sent -> Cooling -> Idle`.
//! Transitions are pure functions of (state, now, policy) so the schedule
//! can be tested without a clock.

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Offset, Utc};
use std::collections::HashMap;
use std::fmt;

use crate::config::{AlertPolicyConfig, MAX_COOLDOWN_MINUTES};
use crate::domain::Severity;
use crate::error::{Result, SentinelError};
use crate::render::format_age;

/// Per-category delivery state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GateState {
    #[default]
    Idle,
    /// Delivered at `at`; becomes Cooling on the next transition
    Sent { at: DateTime<Utc> },
    /// Further sends are suppressed until `until`
    Cooling { until: DateTime<Utc> },
}

/// Why a send was withheld
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    Cooldown { remaining: Duration },
    QuietHours,
}

impl fmt::Display for SuppressReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuppressReason::Cooldown { remaining } => {
                write!(f, "cooldown ({} remaining)", format_age(remaining.num_seconds()))
            }
            SuppressReason::QuietHours => write!(f, "quiet hours"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Send,
    Suppress(SuppressReason),
}

/// Wall-clock window; wraps midnight when `start > end`, empty when equal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuietHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl QuietHours {
    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= time && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }
}

/// Cooldown and quiet-hours settings
#[derive(Debug, Clone)]
pub struct GatePolicy {
    pub default_cooldown: Duration,
    pub cooldowns: HashMap<String, Duration>,
    pub quiet_hours: Option<QuietHours>,
    /// Offset of the wall clock quiet hours are expressed in
    pub utc_offset: FixedOffset,
    pub critical_overrides_quiet_hours: bool,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            default_cooldown: Duration::minutes(60),
            cooldowns: HashMap::new(),
            quiet_hours: None,
            utc_offset: Utc.fix(),
            critical_overrides_quiet_hours: true,
        }
    }
}

impl GatePolicy {
    pub fn from_config(cfg: &AlertPolicyConfig) -> Result<Self> {
        let quiet_hours = match &cfg.quiet_hours {
            Some(q) => {
                let (start, end) = q.parse().map_err(SentinelError::InvalidConfig)?;
                Some(QuietHours { start, end })
            }
            None => None,
        };
        let utc_offset = FixedOffset::east_opt(cfg.utc_offset_minutes * 60).ok_or_else(|| {
            SentinelError::InvalidConfig(format!(
                "utc_offset_minutes {} out of range",
                cfg.utc_offset_minutes
            ))
        })?;

        let cooldowns = cfg
            .cooldowns
            .iter()
            .map(|(k, v)| cooldown_minutes(&format!("cooldowns.{k}"), *v).map(|d| (k.clone(), d)))
            .collect::<Result<HashMap<_, _>>>()?;

        Ok(Self {
            default_cooldown: cooldown_minutes("default_cooldown_minutes", cfg.default_cooldown_minutes)?,
            cooldowns,
            quiet_hours,
            utc_offset,
            critical_overrides_quiet_hours: cfg.critical_overrides_quiet_hours,
        })
    }

    pub fn cooldown_for(&self, category: &str) -> Duration {
        self.cooldowns
            .get(category)
            .copied()
            .unwrap_or(self.default_cooldown)
    }

    pub fn is_quiet(&self, now: DateTime<Utc>) -> bool {
        self.quiet_hours
            .map(|q| q.contains(now.with_timezone(&self.utc_offset).time()))
            .unwrap_or(false)
    }
}

fn cooldown_minutes(field: &str, minutes: u64) -> Result<Duration> {
    if minutes > MAX_COOLDOWN_MINUTES {
        return Err(SentinelError::InvalidConfig(format!(
            "alerts.{field} {minutes} exceeds {MAX_COOLDOWN_MINUTES} minutes"
        )));
    }
    Ok(Duration::minutes(minutes as i64))
}

/// Advance time-driven transitions: Sent -> Cooling -> Idle
pub fn refresh(state: GateState, now: DateTime<Utc>, cooldown: Duration) -> GateState {
    let state = match state {
        GateState::Sent { at } => GateState::Cooling {
            until: at + cooldown,
        },
        other => other,
    };
    match state {
        GateState::Cooling { until } if now >= until => GateState::Idle,
        other => other,
    }
}

/// Decide whether an alert of `severity` may go out now, returning the next state
pub fn evaluate(
    state: GateState,
    now: DateTime<Utc>,
    severity: Severity,
    cooldown: Duration,
    policy: &GatePolicy,
) -> (GateState, GateDecision) {
    match refresh(state, now, cooldown) {
        GateState::Idle => {
            let overridden =
                severity == Severity::Critical && policy.critical_overrides_quiet_hours;
            if policy.is_quiet(now) && !overridden {
                (GateState::Idle, GateDecision::Suppress(SuppressReason::QuietHours))
            } else {
                (GateState::Sent { at: now }, GateDecision::Send)
            }
        }
        GateState::Cooling { until } => (
            GateState::Cooling { until },
            GateDecision::Suppress(SuppressReason::Cooldown {
                remaining: until - now,
            }),
        ),
        // refresh never yields Sent
        GateState::Sent { at } => (
            GateState::Sent { at },
            GateDecision::Suppress(SuppressReason::Cooldown {
                remaining: cooldown,
            }),
        ),
    }
}

/// Gate state for every alert category seen so far
#[derive(Debug, Clone, Default)]
pub struct AlertGate {
    policy: GatePolicy,
    states: HashMap<String, GateState>,
}

impl AlertGate {
    pub fn new(policy: GatePolicy) -> Self {
        Self {
            policy,
            states: HashMap::new(),
        }
    }

    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    /// Current state of `category`, after time-driven transitions
    pub fn state(&self, category: &str, now: DateTime<Utc>) -> GateState {
        let state = self.states.get(category).copied().unwrap_or_default();
        refresh(state, now, self.policy.cooldown_for(category))
    }

    pub fn check(&mut self, category: &str, severity: Severity, now: DateTime<Utc>) -> GateDecision {
        let state = self.states.get(category).copied().unwrap_or_default();
        let cooldown = self.policy.cooldown_for(category);
        let (next, decision) = evaluate(state, now, severity, cooldown, &self.policy);
        self.states.insert(category.to_string(), next);
        decision
    }

    /// Return `category` to Idle after a send that reached no sink
    pub fn release(&mut self, category: &str) {
        self.states.insert(category.to_string(), GateState::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, h, m, 0).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_refresh_transitions() {
        let cooldown = Duration::minutes(60);
        let sent = GateState::Sent { at: at(9, 0) };
        assert_eq!(
            refresh(sent, at(9, 10), cooldown),
            GateState::Cooling { until: at(10, 0) }
        );
        assert_eq!(refresh(sent, at(10, 0), cooldown), GateState::Idle);
        assert_eq!(refresh(GateState::Idle, at(9, 0), cooldown), GateState::Idle);
    }

    #[test]
    fn test_cooldown_schedule() {
        let mut gate = AlertGate::new(GatePolicy::default());
        assert_eq!(gate.check("daily_pnl", Severity::Warning, at(9, 0)), GateDecision::Send);
        assert_eq!(
            gate.check("daily_pnl", Severity::Warning, at(9, 30)),
            GateDecision::Suppress(SuppressReason::Cooldown {
                remaining: Duration::minutes(30)
            })
        );
        assert_eq!(gate.check("daily_pnl", Severity::Warning, at(10, 1)), GateDecision::Send);
    }

    #[test]
    fn test_categories_are_independent() {
        let mut gate = AlertGate::new(GatePolicy::default());
        assert_eq!(gate.check("a", Severity::Warning, at(9, 0)), GateDecision::Send);
        assert_eq!(gate.check("b", Severity::Warning, at(9, 1)), GateDecision::Send);
    }

    #[test]
    fn test_quiet_hours_wrap_midnight() {
        let quiet = QuietHours {
            start: t(22, 0),
            end: t(7, 0),
        };
        assert!(quiet.contains(t(23, 30)));
        assert!(quiet.contains(t(3, 0)));
        assert!(!quiet.contains(t(7, 0)));
        assert!(!quiet.contains(t(12, 0)));

        let empty = QuietHours {
            start: t(1, 0),
            end: t(1, 0),
        };
        assert!(!empty.contains(t(1, 0)));
    }

    #[test]
    fn test_quiet_hours_hold_warnings_but_not_criticals() {
        let policy = GatePolicy {
            quiet_hours: Some(QuietHours {
                start: t(22, 0),
                end: t(7, 0),
            }),
            ..Default::default()
        };
        let mut gate = AlertGate::new(policy);

        assert_eq!(
            gate.check("health:market", Severity::Warning, at(23, 0)),
            GateDecision::Suppress(SuppressReason::QuietHours)
        );
        // Suppressed by quiet hours does not start a cooldown
        assert_eq!(gate.state("health:market", at(23, 0)), GateState::Idle);
        assert_eq!(
            gate.check("health:positions", Severity::Critical, at(23, 0)),
            GateDecision::Send
        );
    }

    #[test]
    fn test_quiet_hours_in_local_offset() {
        let policy = GatePolicy {
            quiet_hours: Some(QuietHours {
                start: t(22, 0),
                end: t(7, 0),
            }),
            utc_offset: FixedOffset::west_opt(5 * 3600).unwrap(),
            ..Default::default()
        };
        // 03:00 UTC is 22:00 at UTC-5
        assert!(policy.is_quiet(at(3, 0)));
        assert!(!policy.is_quiet(at(12, 0)));
    }

    #[test]
    fn test_per_category_cooldown() {
        let mut policy = GatePolicy::default();
        policy.cooldowns.insert("fast".into(), Duration::minutes(5));
        let mut gate = AlertGate::new(policy);

        assert_eq!(gate.check("fast", Severity::Warning, at(9, 0)), GateDecision::Send);
        assert_eq!(gate.check("fast", Severity::Warning, at(9, 6)), GateDecision::Send);
    }

    #[test]
    fn test_release_reopens_category() {
        let mut gate = AlertGate::new(GatePolicy::default());
        assert_eq!(gate.check("x", Severity::Critical, at(9, 0)), GateDecision::Send);
        gate.release("x");
        assert_eq!(gate.check("x", Severity::Critical, at(9, 1)), GateDecision::Send);
    }

    #[test]
    fn test_policy_rejects_unbounded_cooldown() {
        let mut cfg = AlertPolicyConfig::default();
        cfg.cooldowns.insert("daily_pnl".into(), i64::MAX as u64 + 1);
        assert!(matches!(
            GatePolicy::from_config(&cfg),
            Err(SentinelError::InvalidConfig(_))
        ));

        let mut cfg = AlertPolicyConfig::default();
        cfg.default_cooldown_minutes = MAX_COOLDOWN_MINUTES;
        let policy = GatePolicy::from_config(&cfg).unwrap();
        assert_eq!(policy.cooldown_for("any"), Duration::days(366));
    }

    #[test]
    fn test_suppress_reason_display() {
        let reason = SuppressReason::Cooldown {
            remaining: Duration::minutes(30),
        };
        assert_eq!(reason.to_string(), "cooldown (30m remaining)");
    }
}
