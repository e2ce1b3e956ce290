//! Prefetch configuration.

use crate::error::{ConfigError, InvalidPrefetchError};
use std::{
    env,
    ffi::OsString,
    num::NonZeroUsize,
};


/// Environment variable consulted by [`Prefetch::from_env`].
pub const BUFFER_SIZE_ENV: &str = "TRIBUTARY_BUFFER_SIZE";

// prefetch when nothing else is configured.
const DEFAULT_PREFETCH: NonZeroUsize = match NonZeroUsize::new(128) {
    Some(n) => n,
    None => unreachable!(),
};

// smallest prefetch accepted from the environment. lower values are raised to this.
const MIN_ENV_PREFETCH: usize = 16;


/// How many items an adapter keeps requested from its upstream
///
/// A bounded prefetch `p` is requested up front, and replenished in batches of
/// [`limit`](Self::limit) `= p - p / 4` once that many items have been consumed. For `p < 4` the
/// quarter rounds down to zero, so every `p` consumed items trigger a replenishment of `p`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Prefetch {
    /// Keep at most this many items outstanding
    Bounded(NonZeroUsize),
    /// Request everything once and never replenish
    Unbounded,
}

impl Prefetch {
    /// Construct a bounded prefetch, failing if `n` is zero.
    pub fn new(n: usize) -> Result<Self, InvalidPrefetchError> {
        NonZeroUsize::new(n).map(Prefetch::Bounded).ok_or(InvalidPrefetchError)
    }

    /// Read the prefetch from [`BUFFER_SIZE_ENV`], falling back to the default if unset.
    ///
    /// Fails unless the value is a positive integer. Values below 16 are raised to 16.
    pub fn from_env() -> Result<Self, ConfigError> {
        buffer_size_from(env::var_os(BUFFER_SIZE_ENV))
    }

    /// Amount of the initial request sent upstream.
    pub fn initial_request(self) -> u64 {
        match self {
            Prefetch::Bounded(n) => n.get() as u64,
            Prefetch::Unbounded => u64::MAX,
        }
    }

    /// Replenishment threshold, or `None` if unbounded.
    pub fn limit(self) -> Option<u64> {
        match self {
            Prefetch::Bounded(n) => {
                let n = n.get() as u64;
                Some(n - (n >> 2))
            }
            Prefetch::Unbounded => None,
        }
    }

    /// Capacity of an adapter-owned queue, or `None` if unbounded.
    pub fn capacity(self) -> Option<usize> {
        match self {
            Prefetch::Bounded(n) => Some(n.get()),
            Prefetch::Unbounded => None,
        }
    }
}

impl Default for Prefetch {
    fn default() -> Self {
        Prefetch::Bounded(DEFAULT_PREFETCH)
    }
}

// prefetch for a raw environment value, if any.
fn buffer_size_from(value: Option<OsString>) -> Result<Prefetch, ConfigError> {
    match value.map(OsString::into_string) {
        None => Ok(Prefetch::default()),
        Some(Ok(value)) => parse_buffer_size(&value),
        Some(Err(raw)) => Err(ConfigError::NotPositiveInteger {
            var: BUFFER_SIZE_ENV,
            value: raw.to_string_lossy().into_owned(),
        }),
    }
}

// parse an environment value into a prefetch, applying the minimum.
fn parse_buffer_size(value: &str) -> Result<Prefetch, ConfigError> {
    let invalid = || ConfigError::NotPositiveInteger {
        var: BUFFER_SIZE_ENV,
        value: value.to_owned(),
    };
    let n = value.trim().parse::<usize>().map_err(|_| invalid())?;
    if n == 0 {
        return Err(invalid());
    }
    Ok(Prefetch::new(n.max(MIN_ENV_PREFETCH)).unwrap_or_default())
}
