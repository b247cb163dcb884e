//! CPU set strings.
//!
//! Worker pinning takes CPU sets in the Linux taskset/numactl notation:
//! comma-separated CPU IDs and inclusive ranges, e.g. `"0-3,8,10-11"`.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use crate::error::{LanePoolError, Result};

fn invalid(msg: impl Into<String>) -> LanePoolError {
    LanePoolError::InvalidCpuSet(msg.into())
}

fn parse_id(s: &str, segment: &str) -> Result<usize> {
    s.trim()
        .parse()
        .map_err(|_| invalid(format!("invalid CPU ID '{}' in '{}'", s.trim(), segment)))
}

fn parse_segment(segment: &str) -> Result<RangeInclusive<usize>> {
    match segment.split_once('-') {
        Some((lo, hi)) => {
            let (lo, hi) = (parse_id(lo, segment)?, parse_id(hi, segment)?);
            if lo > hi {
                return Err(invalid(format!("descending range '{}'", segment)));
            }
            Ok(lo..=hi)
        }
        None => {
            let id = parse_id(segment, segment)?;
            Ok(id..=id)
        }
    }
}

/// Parse a CPU set string into a sorted, deduplicated list of CPU IDs.
///
/// Empty segments (`"0,,1"`) are ignored.
///
/// # Examples
///
/// ```
/// use lanepool::cpuset::parse_cpuset;
///
/// assert_eq!(parse_cpuset("4,0-2").unwrap(), vec![0, 1, 2, 4]);
/// ```
///
/// # Errors
///
/// Returns `LanePoolError::InvalidCpuSet` if the string has no CPUs or a
/// segment cannot be parsed.
pub fn parse_cpuset(s: &str) -> Result<Vec<usize>> {
    let mut cpus = BTreeSet::new();
    for segment in s.split(',').map(str::trim).filter(|seg| !seg.is_empty()) {
        cpus.extend(parse_segment(segment)?);
    }

    if cpus.is_empty() {
        return Err(invalid(format!("no CPU IDs in '{}'", s)));
    }
    Ok(cpus.into_iter().collect())
}

/// Render CPU IDs back into compact notation, collapsing runs into ranges.
///
/// The input is expected sorted and deduplicated, as produced by
/// [`parse_cpuset`].
///
/// # Examples
///
/// ```
/// use lanepool::cpuset::format_cpuset;
///
/// assert_eq!(format_cpuset(&[0, 1, 2, 4, 6, 7]), "0-2,4,6-7");
/// ```
pub fn format_cpuset(cpus: &[usize]) -> String {
    let mut runs: Vec<(usize, usize)> = Vec::new();
    for &cpu in cpus {
        match runs.last_mut() {
            Some((_, end)) if *end + 1 == cpu => *end = cpu,
            _ => runs.push((cpu, cpu)),
        }
    }

    runs.iter()
        .map(|&(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{start}-{end}")
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Logical CPU IDs this process may run on.
pub fn available_cpus() -> Vec<usize> {
    core_affinity::get_core_ids()
        .map(|ids| ids.into_iter().map(|core| core.id).collect())
        .unwrap_or_default()
}

/// Parse a CPU set string and check every CPU against [`available_cpus`].
///
/// # Errors
///
/// Returns `LanePoolError::InvalidCpuSet` on a parse failure and
/// `LanePoolError::CpuNotAvailable` for the first CPU this process cannot use.
pub fn parse_and_validate_cpuset(s: &str) -> Result<Vec<usize>> {
    let cpus = parse_cpuset(s)?;
    let available = available_cpus();
    if let Some(&missing) = cpus.iter().find(|cpu| !available.contains(cpu)) {
        return Err(LanePoolError::CpuNotAvailable(missing));
    }
    Ok(cpus)
}
