//! Generated identifiers: public tracking codes and official letter numbers

use super::{Clock, IdentifierGenerator};
use crate::models::JenisSurat;
use chrono::{DateTime, Datelike, Utc};
use rand::Rng;

const BASE36_DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Upper-case base-36 representation of `value`
pub fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36_DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();

    String::from_utf8(digits).unwrap_or_default()
}

/// Tracking code: two-letter type prefix, the timestamp in milliseconds and
/// a random suffix, all base-36 and upper-case.
pub fn tracking_code(jenis: JenisSurat, now: DateTime<Utc>, random_suffix: &str) -> String {
    let prefix: String = jenis.code().chars().take(2).collect();
    let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);

    format!(
        "{}{}{}",
        prefix.to_uppercase(),
        to_base36(millis),
        random_suffix.to_uppercase()
    )
}

/// Official number, e.g. `001/SUR/DESA/03/2024`. Month and year are those of
/// the approval moment.
pub fn nomor_surat(jenis: JenisSurat, sequence: i64, approved_at: DateTime<Utc>) -> String {
    let abbreviation: String = jenis.code().chars().take(3).collect();

    format!(
        "{:03}/{}/DESA/{:02}/{}",
        sequence,
        abbreviation.to_uppercase(),
        approved_at.month(),
        approved_at.year()
    )
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Random suffixes drawn from the thread-local generator
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdentifierGenerator;

impl IdentifierGenerator for RandomIdentifierGenerator {
    fn random_base36(&self, len: usize) -> String {
        let mut rng = rand::thread_rng();
        (0..len)
            .map(|_| BASE36_DIGITS[rng.gen_range(0..BASE36_DIGITS.len())] as char)
            .collect()
    }
}
