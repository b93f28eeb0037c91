//! Conditional request compilation and evaluation.
//!
//! [`compile`] turns a [`ConditionSpec`] into the precondition headers for
//! one [`ConditionSite`], rejecting combinations the site cannot express.
//! [`evaluate`] is the server half: given the current object, it decides
//! whether the request proceeds and with which error it fails.
//!
//! Evaluation follows the HTTP precedence rules rather than a plain AND:
//! a true `If-Match` wins over a false `If-Unmodified-Since`, and a false
//! `If-None-Match` fails even when `If-Modified-Since` is true.

use chrono::{DateTime, NaiveDateTime, Utc};
use unis3_model::types::{ConditionSpec, EtagCondition, normalize_etag};
use unis3_model::{ErrorKind, S3Error, S3Result};

/// Where a condition set is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionSite {
    /// Object read, download or head.
    Read,
    /// Put object and multipart completion.
    Write,
    /// The source of a copy (`x-amz-copy-source-if-*`).
    CopySource,
    /// The destination of a copy.
    CopyTarget,
    /// Object deletion.
    Delete,
}

impl ConditionSite {
    fn accepts_dates(self) -> bool {
        matches!(self, Self::Read | Self::CopySource)
    }

    fn is_read(self) -> bool {
        matches!(self, Self::Read | Self::CopySource)
    }

    fn header_names(self) -> HeaderNames {
        match self {
            Self::CopySource => HeaderNames {
                if_match: "x-amz-copy-source-if-match",
                if_none_match: "x-amz-copy-source-if-none-match",
                if_modified_since: "x-amz-copy-source-if-modified-since",
                if_unmodified_since: "x-amz-copy-source-if-unmodified-since",
            },
            _ => HeaderNames {
                if_match: "if-match",
                if_none_match: "if-none-match",
                if_modified_since: "if-modified-since",
                if_unmodified_since: "if-unmodified-since",
            },
        }
    }
}

struct HeaderNames {
    if_match: &'static str,
    if_none_match: &'static str,
    if_modified_since: &'static str,
    if_unmodified_since: &'static str,
}

/// The current state of the object a condition is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct ObjectState<'a> {
    /// Current ETag, quoted or not.
    pub etag: &'a str,
    /// Current last-modified instant.
    pub last_modified: DateTime<Utc>,
}

/// Check that `spec` is expressible at `site`.
///
/// # Errors
///
/// Returns `InvalidInput` when the site does not accept a field, or when
/// the spec combines crossed pairs (`If-Match` with `If-Modified-Since`,
/// `If-None-Match` with `If-Unmodified-Since`, or both dates).
pub fn validate(spec: &ConditionSpec, site: ConditionSite) -> S3Result<()> {
    let has_dates = spec.if_modified_since.is_some() || spec.if_unmodified_since.is_some();
    if has_dates && !site.accepts_dates() {
        return Err(S3Error::invalid_input(format!(
            "date conditions are not accepted for {site:?}"
        )));
    }

    match (&spec.etag, site) {
        (Some(EtagCondition::IfNotExists | EtagCondition::MatchAny), s) if s.is_read() => {
            return Err(S3Error::invalid_input(format!(
                "if-not-exists and match-any only apply to writes, not {site:?}"
            )));
        }
        (Some(EtagCondition::IfNoneMatch(_) | EtagCondition::IfNotExists), ConditionSite::Delete) => {
            return Err(S3Error::invalid_input(
                "deletes accept only if-match or match-any",
            ));
        }
        _ => {}
    }

    if spec.if_modified_since.is_some() && spec.if_unmodified_since.is_some() {
        return Err(S3Error::invalid_input(
            "if-modified-since and if-unmodified-since cannot be combined",
        ));
    }
    match &spec.etag {
        Some(EtagCondition::IfMatch(_)) if spec.if_modified_since.is_some() => Err(
            S3Error::invalid_input("if-match cannot be combined with if-modified-since"),
        ),
        Some(EtagCondition::IfNoneMatch(_)) if spec.if_unmodified_since.is_some() => Err(
            S3Error::invalid_input("if-none-match cannot be combined with if-unmodified-since"),
        ),
        _ => Ok(()),
    }
}

/// Compile `spec` into request headers for `site`.
///
/// # Errors
///
/// Returns `InvalidInput` when [`validate`] rejects the spec.
pub fn compile(spec: &ConditionSpec, site: ConditionSite) -> S3Result<Vec<(&'static str, String)>> {
    validate(spec, site)?;
    let names = site.header_names();
    let mut headers = Vec::with_capacity(2);
    match &spec.etag {
        Some(EtagCondition::IfMatch(etag)) => headers.push((names.if_match, quote_etag(etag))),
        Some(EtagCondition::IfNoneMatch(etag)) => {
            headers.push((names.if_none_match, quote_etag(etag)));
        }
        Some(EtagCondition::IfNotExists) => headers.push((names.if_none_match, "*".to_owned())),
        Some(EtagCondition::MatchAny) => headers.push((names.if_match, "*".to_owned())),
        None => {}
    }
    if let Some(since) = &spec.if_modified_since {
        headers.push((names.if_modified_since, format_http_date(since)));
    }
    if let Some(since) = &spec.if_unmodified_since {
        headers.push((names.if_unmodified_since, format_http_date(since)));
    }
    Ok(headers)
}

/// Rebuild a spec from received header values, the inverse of [`compile`].
///
/// `lookup` returns the value of a lower-case header name.
///
/// # Errors
///
/// Returns `InvalidArgument` for an unparseable date.
pub fn from_headers<'a>(
    site: ConditionSite,
    lookup: impl Fn(&str) -> Option<&'a str>,
) -> S3Result<ConditionSpec> {
    let names = site.header_names();
    let etag = match (lookup(names.if_match), lookup(names.if_none_match)) {
        (Some("*"), _) => Some(EtagCondition::MatchAny),
        (Some(etag), _) => Some(EtagCondition::IfMatch(etag.to_owned())),
        (None, Some("*")) => Some(EtagCondition::IfNotExists),
        (None, Some(etag)) => Some(EtagCondition::IfNoneMatch(etag.to_owned())),
        (None, None) => None,
    };
    let date = |name: &str| -> S3Result<Option<DateTime<Utc>>> {
        lookup(name)
            .map(|v| {
                parse_http_date(v).ok_or_else(|| {
                    S3Error::with_message(ErrorKind::InvalidArgument, format!("invalid {name}: {v}"))
                })
            })
            .transpose()
    };
    Ok(ConditionSpec {
        etag,
        if_modified_since: date(names.if_modified_since)?,
        if_unmodified_since: date(names.if_unmodified_since)?,
    })
}

/// Evaluate `spec` against the current object at `site`.
///
/// `current` is `None` when the object does not exist.
///
/// # Errors
///
/// - `ObjectNotFound` when the object is absent and the site needs it.
/// - `NotModified` for a failed `If-None-Match`/`If-Modified-Since` on a
///   plain read.
/// - `PreconditionFailed` for every other failed condition.
pub fn evaluate(
    spec: &ConditionSpec,
    site: ConditionSite,
    current: Option<ObjectState<'_>>,
) -> S3Result<()> {
    let Some(current) = current else {
        return match (&spec.etag, site) {
            (_, ConditionSite::Read | ConditionSite::CopySource) => {
                Err(S3Error::new(ErrorKind::ObjectNotFound))
            }
            (Some(EtagCondition::IfMatch(_) | EtagCondition::MatchAny), _) => {
                Err(S3Error::new(ErrorKind::ObjectNotFound))
            }
            _ => Ok(()),
        };
    };

    let not_modified = || {
        if site == ConditionSite::Read {
            S3Error::new(ErrorKind::NotModified)
        } else {
            S3Error::precondition_failed()
        }
    };
    let modified_secs = current.last_modified.timestamp();

    match &spec.etag {
        Some(EtagCondition::MatchAny) => return Ok(()),
        Some(EtagCondition::IfMatch(etag)) => {
            // A matching If-Match overrides If-Unmodified-Since.
            return if etag_matches(current.etag, etag) {
                Ok(())
            } else {
                Err(S3Error::precondition_failed())
            };
        }
        Some(EtagCondition::IfNotExists) => return Err(S3Error::precondition_failed()),
        Some(EtagCondition::IfNoneMatch(etag)) => {
            // If-Modified-Since is ignored once If-None-Match is present.
            return if etag_matches(current.etag, etag) {
                Err(not_modified())
            } else {
                Ok(())
            };
        }
        None => {}
    }

    if let Some(since) = &spec.if_unmodified_since {
        if modified_secs > since.timestamp() {
            return Err(S3Error::precondition_failed());
        }
    }
    if let Some(since) = &spec.if_modified_since {
        if modified_secs <= since.timestamp() {
            return Err(not_modified());
        }
    }
    Ok(())
}

fn etag_matches(current: &str, condition: &str) -> bool {
    condition.trim() == "*"
        || condition
            .split(',')
            .any(|candidate| normalize_etag(candidate) == normalize_etag(current))
}

fn quote_etag(etag: &str) -> String {
    format!("\"{}\"", normalize_etag(etag))
}

/// Format an instant as an IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`).
#[must_use]
pub fn format_http_date(dt: &DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parse an IMF-fixdate, falling back to RFC 2822 and RFC 3339.
#[must_use]
pub fn parse_http_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%a, %d %b %Y %H:%M:%S GMT")
        .map(|naive| naive.and_utc())
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc2822(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
        .or_else(|| {
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn object(etag: &str) -> ObjectState<'_> {
        ObjectState {
            etag,
            last_modified: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        }
    }

    fn at(offset_secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap() + Duration::seconds(offset_secs)
    }

    #[test]
    fn test_should_compile_read_headers() {
        let spec = ConditionSpec {
            etag: Some(EtagCondition::IfMatch("abc".to_owned())),
            if_unmodified_since: Some(at(0)),
            ..ConditionSpec::default()
        };
        let headers = compile(&spec, ConditionSite::Read).unwrap();
        assert_eq!(
            headers,
            vec![
                ("if-match", "\"abc\"".to_owned()),
                ("if-unmodified-since", "Sat, 01 Jun 2024 12:00:00 GMT".to_owned()),
            ]
        );
    }

    #[test]
    fn test_should_compile_copy_source_prefix() {
        let spec = ConditionSpec::if_none_match("\"e\"");
        let headers = compile(&spec, ConditionSite::CopySource).unwrap();
        assert_eq!(headers[0].0, "x-amz-copy-source-if-none-match");
    }

    #[test]
    fn test_should_compile_write_markers_to_wildcards() {
        assert_eq!(
            compile(&ConditionSpec::if_not_exists(), ConditionSite::Write).unwrap(),
            vec![("if-none-match", "*".to_owned())]
        );
        assert_eq!(
            compile(&ConditionSpec::match_any(), ConditionSite::Delete).unwrap(),
            vec![("if-match", "*".to_owned())]
        );
    }

    #[test]
    fn test_should_reject_fields_the_site_does_not_accept() {
        let dated = ConditionSpec {
            if_modified_since: Some(at(0)),
            ..ConditionSpec::default()
        };
        for site in [ConditionSite::Write, ConditionSite::CopyTarget, ConditionSite::Delete] {
            let err = compile(&dated, site).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
        }
        assert!(compile(&ConditionSpec::if_not_exists(), ConditionSite::Read).is_err());
        assert!(compile(&ConditionSpec::if_none_match("x"), ConditionSite::Delete).is_err());
    }

    #[test]
    fn test_should_reject_crossed_pairs() {
        let crossed = [
            ConditionSpec {
                etag: Some(EtagCondition::IfMatch("a".to_owned())),
                if_modified_since: Some(at(0)),
                ..ConditionSpec::default()
            },
            ConditionSpec {
                etag: Some(EtagCondition::IfNoneMatch("a".to_owned())),
                if_unmodified_since: Some(at(0)),
                ..ConditionSpec::default()
            },
            ConditionSpec {
                etag: None,
                if_modified_since: Some(at(0)),
                if_unmodified_since: Some(at(0)),
            },
        ];
        for spec in crossed {
            assert_eq!(
                compile(&spec, ConditionSite::Read).unwrap_err().kind(),
                ErrorKind::InvalidInput
            );
        }
    }

    #[test]
    fn test_should_let_matching_if_match_override_unmodified_since() {
        let spec = ConditionSpec {
            etag: Some(EtagCondition::IfMatch("\"abc\"".to_owned())),
            if_unmodified_since: Some(at(-1)),
            ..ConditionSpec::default()
        };
        assert!(evaluate(&spec, ConditionSite::CopySource, Some(object("abc"))).is_ok());
    }

    #[test]
    fn test_should_fail_non_matching_none_match_despite_modified_since() {
        let spec = ConditionSpec {
            etag: Some(EtagCondition::IfNoneMatch("abc".to_owned())),
            if_modified_since: Some(at(-1)),
            ..ConditionSpec::default()
        };
        let err = evaluate(&spec, ConditionSite::CopySource, Some(object("\"abc\""))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
        let err = evaluate(&spec, ConditionSite::Read, Some(object("\"abc\""))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotModified);
    }

    #[test]
    fn test_should_compare_dates_at_second_resolution() {
        let current = ObjectState {
            etag: "e",
            last_modified: at(0) + Duration::milliseconds(900),
        };
        let spec = ConditionSpec {
            if_unmodified_since: Some(at(0)),
            ..ConditionSpec::default()
        };
        assert!(evaluate(&spec, ConditionSite::Read, Some(current)).is_ok());

        let spec = ConditionSpec {
            if_modified_since: Some(at(0)),
            ..ConditionSpec::default()
        };
        let err = evaluate(&spec, ConditionSite::Read, Some(current)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotModified);
    }

    #[test]
    fn test_should_handle_absent_objects() {
        assert!(evaluate(&ConditionSpec::if_not_exists(), ConditionSite::Write, None).is_ok());
        assert!(evaluate(&ConditionSpec::none(), ConditionSite::Write, None).is_ok());
        for spec in [ConditionSpec::if_match("a"), ConditionSpec::match_any()] {
            let err = evaluate(&spec, ConditionSite::Write, None).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ObjectNotFound);
        }
        let err = evaluate(&ConditionSpec::none(), ConditionSite::Read, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ObjectNotFound);
    }

    #[test]
    fn test_should_fail_if_not_exists_on_existing_object() {
        let err = evaluate(
            &ConditionSpec::if_not_exists(),
            ConditionSite::Write,
            Some(object("e")),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    }

    #[test]
    fn test_should_rebuild_spec_from_compiled_headers() {
        let spec = ConditionSpec {
            etag: Some(EtagCondition::IfNoneMatch("abc".to_owned())),
            if_modified_since: Some(at(5)),
            ..ConditionSpec::default()
        };
        let headers = compile(&spec, ConditionSite::CopySource).unwrap();
        let parsed = from_headers(ConditionSite::CopySource, |name| {
            headers
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| v.as_str())
        })
        .unwrap();
        assert_eq!(parsed.if_modified_since, Some(at(5)));
        assert_eq!(
            parsed.etag,
            Some(EtagCondition::IfNoneMatch("\"abc\"".to_owned()))
        );
    }

    #[test]
    fn test_should_parse_http_date_forms() {
        let expected = Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap();
        assert_eq!(parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT"), Some(expected));
        assert_eq!(parse_http_date("1994-11-06T08:49:37Z"), Some(expected));
        assert_eq!(parse_http_date("garbage"), None);
    }
}
