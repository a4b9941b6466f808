//! `GeneralizedTime` decoding and the raw-byte signing-time scan.

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};

use super::der::tag;

/// Shortest and longest `GeneralizedTime` value accepted by the scan
/// (`yyyyMMddHHmmZ` .. `yyyyMMddHHmmss.ffZ`).
const SCAN_LEN: std::ops::RangeInclusive<usize> = 13..=17;

/// Parse a UTC `GeneralizedTime` value: `yyyyMMddHHmm[ss[.f+]]Z`.
pub fn parse_generalized_time(value: &str) -> Option<DateTime<Utc>> {
    let body = value.strip_suffix('Z')?;
    let (base, fraction) = match body.split_once('.') {
        Some((base, fraction)) => (base, Some(fraction)),
        None => (body, None),
    };
    if !base.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let naive = match base.len() {
        14 => NaiveDateTime::parse_from_str(base, "%Y%m%d%H%M%S").ok()?,
        12 if fraction.is_none() => {
            NaiveDateTime::parse_from_str(&format!("{base}00"), "%Y%m%d%H%M%S").ok()?
        }
        _ => return None,
    };

    let nanos = match fraction {
        None => 0,
        Some(f) if !f.is_empty() && f.len() <= 9 && f.bytes().all(|b| b.is_ascii_digit()) => {
            format!("{f:0<9}").parse::<u32>().ok()?
        }
        Some(_) => return None,
    };

    Some(naive.with_nanosecond(nanos)?.and_utc())
}

/// Format a UTC instant as a whole-second `GeneralizedTime` value.
pub fn format_generalized_time(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d%H%M%SZ").to_string()
}

/// Scan raw bytes for the first parseable `GeneralizedTime` element.
///
/// This does not walk the CMS structure, so it can pick up an earlier
/// `GeneralizedTime` (for example a certificate validity bound) instead of the
/// genuine signing time. Prefer a structural walk and use this only as a
/// fallback.
pub fn scan_generalized_time(bytes: &[u8]) -> Option<DateTime<Utc>> {
    bytes
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w[0] == tag::GENERALIZED_TIME && SCAN_LEN.contains(&(w[1] as usize)))
        .find_map(|(i, w)| {
            let start = i + 2;
            let value = bytes.get(start..start + w[1] as usize)?;
            parse_generalized_time(std::str::from_utf8(value).ok()?)
        })
}
