//! Protobuf-JSON duration strings (`"10s"`, `"0.250s"`).

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// Render a duration the way protobuf JSON does: seconds with an `s` suffix
/// and only as many fractional digits as needed.
pub fn format_duration(d: Duration) -> String {
    let nanos = d.subsec_nanos();
    if nanos == 0 {
        return format!("{}s", d.as_secs());
    }
    let frac = format!("{:09}", nanos);
    format!("{}.{}s", d.as_secs(), frac.trim_end_matches('0'))
}

/// Parse `"<secs>[.<fraction>]s"`. Negative durations are rejected.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let body = s
        .trim()
        .strip_suffix('s')
        .ok_or_else(|| format!("duration {:?} must end with 's'", s))?;
    let (secs, frac) = match body.split_once('.') {
        Some((secs, frac)) => (secs, frac),
        None => (body, ""),
    };
    if secs.is_empty() || !secs.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("duration {:?} has an invalid seconds part", s));
    }
    if frac.len() > 9 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("duration {:?} has an invalid fractional part", s));
    }
    let secs: u64 = secs
        .parse()
        .map_err(|e| format!("duration {:?} is out of range: {}", s, e))?;
    let nanos: u32 = if frac.is_empty() {
        0
    } else {
        format!("{:0<9}", frac)
            .parse()
            .map_err(|e| format!("duration {:?} is out of range: {}", s, e))?
    };
    Ok(Duration::new(secs, nanos))
}

pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_duration(*d))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(serde::de::Error::custom)
}
