//! Object-lock policy: retention transitions, version deletion and dates.
//!
//! A retention whose date has passed is inactive and behaves as no
//! retention at all. COMPLIANCE only ever extends; GOVERNANCE may be
//! weakened with an explicit bypass. Legal hold is independent of both.

use chrono::{DateTime, Utc};
use unis3_model::types::{ObjectLockConfiguration, ObjectLockProperties, Retention, RetentionMode};
use unis3_model::{ErrorKind, S3Error, S3Result};

/// Decide whether `requested` may replace `current`.
///
/// `requested = None` removes the retention.
///
/// # Errors
///
/// - `InvalidInput` if the requested date is not in the future.
/// - `AccessDenied` if the transition weakens an active retention without
///   the bypass a GOVERNANCE retention needs, or weakens COMPLIANCE at all.
pub fn check_retention_update(
    current: Option<&Retention>,
    requested: Option<&Retention>,
    bypass: bool,
    now: DateTime<Utc>,
) -> S3Result<()> {
    if let Some(requested) = requested {
        if requested.retain_until <= now {
            return Err(S3Error::invalid_input(
                "the retain until date must be in the future",
            ));
        }
    }

    let Some(current) = current.filter(|r| r.is_active(now)) else {
        return Ok(());
    };

    let extends = requested.is_some_and(|r| r.retain_until > current.retain_until);
    match current.mode {
        RetentionMode::Compliance => {
            if extends && requested.is_some_and(|r| r.mode == RetentionMode::Compliance) {
                Ok(())
            } else {
                Err(S3Error::access_denied(
                    "a COMPLIANCE retention can only be extended",
                ))
            }
        }
        RetentionMode::Governance => {
            if extends || bypass {
                Ok(())
            } else {
                Err(S3Error::access_denied(
                    "shortening or removing a GOVERNANCE retention requires bypass",
                ))
            }
        }
    }
}

/// Decide whether a version-targeted delete may destroy a version.
///
/// Deletes without a version id only add a delete marker and never need
/// this check.
///
/// # Errors
///
/// Returns `AccessDenied` while a legal hold is on, while a COMPLIANCE
/// retention is active, or while a GOVERNANCE retention is active and
/// `bypass` is not set.
pub fn check_version_delete(
    properties: &ObjectLockProperties,
    bypass: bool,
    now: DateTime<Utc>,
) -> S3Result<()> {
    if properties.legal_hold {
        return Err(S3Error::access_denied(
            "Object Lock legal hold is enabled on this object",
        ));
    }
    match properties.retention.filter(|r| r.is_active(now)) {
        Some(r) if r.mode == RetentionMode::Compliance => Err(S3Error::access_denied(
            "Object Lock retention period has not expired",
        )),
        Some(_) if !bypass => Err(S3Error::access_denied(
            "Object Lock retention period has not expired",
        )),
        _ => Ok(()),
    }
}

/// The retention a new version receives on a lock-enabled bucket.
///
/// An explicit request wins over the bucket default.
///
/// # Errors
///
/// Returns `BucketLockNotEnabled` when lock settings are requested on a
/// bucket without object lock, or `InvalidInput` for a past date.
pub fn retention_for_new_version(
    config: Option<&ObjectLockConfiguration>,
    requested: Option<Retention>,
    legal_hold_requested: bool,
    now: DateTime<Utc>,
) -> S3Result<Option<Retention>> {
    let enabled = config.is_some_and(|c| c.enabled);
    if !enabled && (requested.is_some() || legal_hold_requested) {
        return Err(S3Error::new(ErrorKind::BucketLockNotEnabled));
    }
    if let Some(requested) = requested {
        check_retention_update(None, Some(&requested), false, now)?;
        return Ok(Some(requested));
    }
    match config.and_then(|c| c.default_retention) {
        Some(rule) => Ok(Some(Retention::new(rule.mode(), rule.retain_until(now)?))),
        None => Ok(None),
    }
}

/// Format a retain-until date: `2030-01-02T03:04:05.000Z`.
#[must_use]
pub fn format_retain_until(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Parse an RFC 3339 retain-until date into UTC.
///
/// # Errors
///
/// Returns `InvalidArgument` if `s` is not RFC 3339.
pub fn parse_retain_until(s: &str) -> S3Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            S3Error::with_message(
                ErrorKind::InvalidArgument,
                format!("invalid retain until date '{s}': {e}"),
            )
        })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use unis3_model::types::DefaultRetention;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn governance(secs: i64) -> Retention {
        Retention::new(RetentionMode::Governance, now() + Duration::seconds(secs))
    }

    fn compliance(secs: i64) -> Retention {
        Retention::new(RetentionMode::Compliance, now() + Duration::seconds(secs))
    }

    fn denied(result: S3Result<()>) -> bool {
        result.is_err_and(|e| e.kind() == ErrorKind::AccessDenied)
    }

    #[test]
    fn test_should_allow_any_retention_from_none() {
        assert!(check_retention_update(None, Some(&governance(10)), false, now()).is_ok());
        assert!(check_retention_update(None, Some(&compliance(10)), false, now()).is_ok());
    }

    #[test]
    fn test_should_follow_governance_transitions() {
        let current = governance(20);
        let update = |req: Option<&Retention>, bypass| {
            check_retention_update(Some(&current), req, bypass, now())
        };
        assert!(update(Some(&governance(30)), false).is_ok());
        assert!(denied(update(Some(&governance(20)), false)));
        assert!(denied(update(Some(&governance(10)), false)));
        assert!(update(Some(&governance(10)), true).is_ok());
        assert!(denied(update(None, false)));
        assert!(update(None, true).is_ok());
        assert!(update(Some(&compliance(30)), false).is_ok());
        assert!(denied(update(Some(&compliance(20)), false)));
        assert!(update(Some(&compliance(20)), true).is_ok());
    }

    #[test]
    fn test_should_only_extend_compliance_even_with_bypass() {
        let current = compliance(20);
        for bypass in [false, true] {
            let update = |req: Option<&Retention>| {
                check_retention_update(Some(&current), req, bypass, now())
            };
            assert!(update(Some(&compliance(30))).is_ok());
            assert!(denied(update(Some(&compliance(10)))));
            assert!(denied(update(Some(&governance(30)))));
            assert!(denied(update(None)));
        }
    }

    #[test]
    fn test_should_treat_expired_retention_as_none() {
        let expired = compliance(-5);
        assert!(check_retention_update(Some(&expired), None, false, now()).is_ok());
        assert!(check_retention_update(Some(&expired), Some(&governance(5)), false, now()).is_ok());
    }

    #[test]
    fn test_should_reject_past_requested_dates() {
        let err = check_retention_update(None, Some(&governance(0)), true, now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_should_guard_version_deletes() {
        let locked = |retention, legal_hold| ObjectLockProperties {
            retention: Some(retention),
            legal_hold,
        };
        assert!(denied(check_version_delete(&locked(governance(10), false), false, now())));
        assert!(check_version_delete(&locked(governance(10), false), true, now()).is_ok());
        assert!(denied(check_version_delete(&locked(compliance(10), false), true, now())));
        assert!(check_version_delete(&locked(compliance(-1), false), false, now()).is_ok());
        assert!(denied(check_version_delete(&locked(compliance(-1), true), true, now())));

        let hold_only = ObjectLockProperties {
            retention: None,
            legal_hold: true,
        };
        assert!(denied(check_version_delete(&hold_only, true, now())));
        assert!(check_version_delete(&ObjectLockProperties::default(), false, now()).is_ok());
    }

    #[test]
    fn test_should_apply_bucket_default_retention() {
        let config = ObjectLockConfiguration::with_default(
            DefaultRetention::days(RetentionMode::Governance, 2).unwrap(),
        );
        let retention = retention_for_new_version(Some(&config), None, false, now())
            .unwrap()
            .unwrap();
        assert_eq!(retention.mode, RetentionMode::Governance);
        assert_eq!(retention.retain_until, now() + Duration::days(2));

        let explicit = compliance(60);
        let chosen = retention_for_new_version(Some(&config), Some(explicit), false, now())
            .unwrap();
        assert_eq!(chosen, Some(explicit));
    }

    #[test]
    fn test_should_reject_lock_settings_without_lock() {
        let err = retention_for_new_version(None, None, true, now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BucketLockNotEnabled);
        assert_eq!(retention_for_new_version(None, None, false, now()).unwrap(), None);
    }

    #[test]
    fn test_should_format_and_parse_in_utc() {
        let dt = Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(format_retain_until(&dt), "2030-01-02T03:04:05.000Z");
        assert_eq!(parse_retain_until("2030-01-02T05:04:05+02:00").unwrap(), dt);
        assert!(parse_retain_until("next week").is_err());
    }
}
