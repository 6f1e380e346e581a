//! Launch-time validation of region requirements.
//!
//! [`validate_requirements`] runs on every launch before anything is
//! scheduled. It checks the declarations a task makes against its reduction
//! operator and its launch domain; a launch that passes can be scheduled
//! purely from its declared footprint.

use snap_core::{AccessMode, Color, LaunchError, Redop, RegionRequirement, RegionSelector};

use crate::launcher::LaunchDomain;

/// Check a task's requirements before scheduling.
///
/// Checks performed:
///
/// 1. Index launches have at least one point.
/// 2. Access modes agree with the redop: exclusive-write tasks never
///    declare reduce access; reducing tasks write only through their own
///    operator.
/// 3. Every selector resolves for every point (projected selectors only
///    in index launches, colors inside the partition).
/// 4. No two requirements of one point overlap on the same array when
///    either writes.
pub fn validate_requirements(
    task: &str,
    redop: Redop,
    requirements: &[RegionRequirement],
    domain: &LaunchDomain,
) -> Result<(), LaunchError> {
    let points: Vec<Option<Color>> = match domain {
        LaunchDomain::Single => vec![None],
        LaunchDomain::Index(colors) if colors.is_empty() => {
            return Err(LaunchError::EmptyDomain {
                task: task.to_string(),
            })
        }
        LaunchDomain::Index(colors) => colors.iter().copied().map(Some).collect(),
    };

    for (i, req) in requirements.iter().enumerate() {
        check_access(task, redop, i, req.access())?;
        if req.selector() == RegionSelector::Projected && points == [None] {
            return Err(LaunchError::InvalidSelector {
                task: task.to_string(),
                requirement: i,
                reason: "projected selector in a single launch".to_string(),
            });
        }
    }

    for &point in &points {
        let mut resolved = Vec::with_capacity(requirements.len());
        for (i, req) in requirements.iter().enumerate() {
            let zones = req.resolve(point).ok_or_else(|| LaunchError::InvalidSelector {
                task: task.to_string(),
                requirement: i,
                reason: match point {
                    Some(c) => format!(
                        "{} does not resolve for point {c} of '{}' ({} subregions)",
                        req.selector(),
                        req.array().name(),
                        req.array().partition().len()
                    ),
                    None => format!(
                        "{} does not resolve on '{}' ({} subregions)",
                        req.selector(),
                        req.array().name(),
                        req.array().partition().len()
                    ),
                },
            })?;
            resolved.push(zones);
        }
        for i in 0..requirements.len() {
            for j in i + 1..requirements.len() {
                let (a, b) = (&requirements[i], &requirements[j]);
                let writes = a.access().is_write() || b.access().is_write();
                if writes && a.array() == b.array() && resolved[i].overlaps(&resolved[j]) {
                    return Err(LaunchError::AliasedRequirements {
                        task: task.to_string(),
                        first: i,
                        second: j,
                    });
                }
            }
        }
    }
    Ok(())
}

fn check_access(
    task: &str,
    redop: Redop,
    index: usize,
    access: AccessMode,
) -> Result<(), LaunchError> {
    let mismatch = |reason: String| LaunchError::AccessMismatch {
        task: task.to_string(),
        requirement: index,
        reason,
    };
    match (redop, access) {
        (Redop::None, AccessMode::Reduce(op)) => Err(mismatch(format!(
            "reduce({op}) access on a task without a reduction operator"
        ))),
        (Redop::Reduce(op), AccessMode::ReadWrite | AccessMode::WriteDiscard) => Err(mismatch(
            format!("{access} access on a task reducing through {op}"),
        )),
        (Redop::Reduce(op), AccessMode::Reduce(other)) if op != other => Err(mismatch(format!(
            "reduce({other}) access on a task reducing through {op}"
        ))),
        _ => Ok(()),
    }
}
