//! Small astrology helpers
//!
//! Sun sign lookup from a birth date. The heavy lifting (birth charts,
//! horoscopes) runs as task executions on the task runner; this only covers
//! what the prompt and task inputs need locally.

/// Western zodiac sun sign for a month/day pair
pub fn sun_sign(month: u32, day: u32) -> Option<&'static str> {
    let sign = match (month, day) {
        (3, 21..=31) | (4, 1..=19) => "Aries",
        (4, 20..=30) | (5, 1..=20) => "Taurus",
        (5, 21..=31) | (6, 1..=20) => "Gemini",
        (6, 21..=30) | (7, 1..=22) => "Cancer",
        (7, 23..=31) | (8, 1..=22) => "Leo",
        (8, 23..=31) | (9, 1..=22) => "Virgo",
        (9, 23..=30) | (10, 1..=22) => "Libra",
        (10, 23..=31) | (11, 1..=21) => "Scorpio",
        (11, 22..=30) | (12, 1..=21) => "Sagittarius",
        (12, 22..=31) | (1, 1..=19) => "Capricorn",
        (1, 20..=31) | (2, 1..=18) => "Aquarius",
        (2, 19..=29) | (3, 1..=20) => "Pisces",
        _ => return None,
    };
    Some(sign)
}

/// Sun sign from a stored birth date string (YYYY-MM-DD or MM-DD)
pub fn sun_sign_from_birth_date(birth_date: &str) -> Option<&'static str> {
    let parts: Vec<&str> = birth_date.split('-').collect();
    let (month, day) = match parts.as_slice() {
        [_year, month, day] => (month.parse().ok()?, day.parse().ok()?),
        [month, day] => (month.parse().ok()?, day.parse().ok()?),
        _ => return None,
    };
    sun_sign(month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_boundaries() {
        assert_eq!(sun_sign(3, 20), Some("Pisces"));
        assert_eq!(sun_sign(3, 21), Some("Aries"));
        assert_eq!(sun_sign(4, 19), Some("Aries"));
        assert_eq!(sun_sign(4, 20), Some("Taurus"));
        assert_eq!(sun_sign(12, 22), Some("Capricorn"));
        assert_eq!(sun_sign(1, 19), Some("Capricorn"));
        assert_eq!(sun_sign(1, 20), Some("Aquarius"));
    }

    #[test]
    fn test_invalid_dates() {
        assert_eq!(sun_sign(13, 1), None);
        assert_eq!(sun_sign(0, 10), None);
    }

    #[test]
    fn test_from_birth_date_strings() {
        assert_eq!(sun_sign_from_birth_date("1990-04-12"), Some("Aries"));
        assert_eq!(sun_sign_from_birth_date("04-12"), Some("Aries"));
        assert_eq!(sun_sign_from_birth_date("garbage"), None);
    }
}
