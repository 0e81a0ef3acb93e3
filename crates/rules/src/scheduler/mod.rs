//! Reactive recomputation of validity and editability.
//!
//! The [`RecomputeScheduler`] subscribes to control value-change streams and
//! re-runs tests when something a control depends on changes. Each control
//! has four independently configured trigger categories (see
//! [`ChangePolicy`](crate::schema::ChangePolicy)):
//!
//! - dependency-driven validity: force a re-check, refresh sync validity
//!   without publishing a change, then re-run async validity
//! - dependency-driven editability: re-run edit/view tests, flip only if needed
//! - self-driven editability: same, on the control's own changes
//! - self-driven async validity: debounced, distinct-filtered async checks;
//!   repeated values pass the last async result through instead of re-running
//!
//! Scheduling state (force flag, last processed value, last async errors)
//! lives in a side table keyed by [`ControlId`](crate::form::ControlId), not
//! on the controls. Dependency subscriptions are rebuilt from scratch on every
//! structural change because array edits shift relative paths.

mod core;
mod pipelines;
mod state;
mod subscription;


pub use self::core::RecomputeScheduler;
pub use self::state::ScheduleStats;
pub use self::subscription::Subscription;
