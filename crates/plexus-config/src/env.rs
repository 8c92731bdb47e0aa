//! Environment-variable layer.
//!
//! Each setting can be supplied as `PLEXUS_<KEY>` where `<KEY>` is the
//! configuration-file key in upper case with `-` replaced by `_`, for example
//! `PLEXUS_INSTANCE_ID`. Empty variables count as unset.

use crate::error::ConfigError;
use crate::file::FileSettings;
use crate::logging::LogFormat;

/// Prefix shared by every recognised variable.
pub const ENV_PREFIX: &str = "PLEXUS_";

pub(crate) const INSTANCE_ID: &str = "PLEXUS_INSTANCE_ID";
pub(crate) const SMP_PROCESSES: &str = "PLEXUS_SMP_PROCESSES";
pub(crate) const INBOX_CAPACITY: &str = "PLEXUS_INBOX_CAPACITY";
pub(crate) const LOG_FILTER: &str = "PLEXUS_LOG_FILTER";
pub(crate) const LOG_FORMAT: &str = "PLEXUS_LOG_FORMAT";

/// Reads the environment layer through `lookup`.
///
/// The layer has the same shape as a configuration file.
pub(crate) fn read<F>(lookup: F) -> Result<FileSettings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(name).filter(|value| !value.is_empty());
    Ok(FileSettings {
        instance_id: var(INSTANCE_ID),
        smp_processes: var(SMP_PROCESSES)
            .map(|value| parse_number(SMP_PROCESSES, &value))
            .transpose()?,
        inbox_capacity: var(INBOX_CAPACITY)
            .map(|value| parse_number(INBOX_CAPACITY, &value))
            .transpose()?,
        log_filter: var(LOG_FILTER),
        log_format: var(LOG_FORMAT)
            .map(|value| {
                value.parse::<LogFormat>().map_err(|error| {
                    ConfigError::invalid_value(LOG_FORMAT, value.as_str(), error.to_string())
                })
            })
            .transpose()?,
    })
}

fn parse_number<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr<Err = std::num::ParseIntError>,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|error| ConfigError::invalid_value(name, value, error.to_string()))
}
