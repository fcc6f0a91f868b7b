//! Configuration bounds.
//!
//! Every knob a caller can turn has an explicit maximum so a typo in a
//! config file can't turn into an unbounded queue or a checkpoint that
//! never happens.

/// Default consumer group name used by the service.
pub const DEFAULT_CONSUMER_GROUP: &str = "$Default";

/// Default number of delivered messages between checkpoint instants.
pub const CHECKPOINT_INTERVAL_DEFAULT: u32 = 100;

/// Maximum number of delivered messages between checkpoint instants.
pub const CHECKPOINT_INTERVAL_MAX: u32 = 1_000_000;

/// Default receiver link credit (prefetched messages).
pub const PREFETCH_COUNT_DEFAULT: u32 = 300;

/// Maximum receiver link credit.
pub const PREFETCH_COUNT_MAX: u32 = 10_000;

/// Maximum length of a stream or consumer group name, in bytes.
pub const NAME_LENGTH_MAX: usize = 256;

/// Maximum payload size of a single event, in bytes.
pub const EVENT_BODY_BYTES_MAX: usize = 1024 * 1024;

/// Checks that `value` lies in `1..=max`.
///
/// # Errors
///
/// Returns `InvalidArgument` when `value` is zero and `LimitExceeded` when
/// it is above `max`.
pub const fn check_positive_bounded(
    name: &'static str,
    value: u32,
    max: u32,
) -> crate::Result<()> {
    if value == 0 {
        return Err(crate::Error::InvalidArgument {
            name,
            reason: "must be positive",
        });
    }
    if value > max {
        return Err(crate::Error::LimitExceeded {
            limit: name,
            max: max as u64,
            actual: value as u64,
        });
    }
    Ok(())
}
