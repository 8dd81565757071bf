//! OTP codes and temporary passwords from the OS CSPRNG.

use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::Rng;

/// Alphabets for generated temporary passwords. Visually ambiguous glyphs
/// (0/O, 1/I/l) are excluded so users can transcribe them reliably.
const UPPER: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
const LOWER: &[u8] = b"abcdefghjkmnpqrstuvwxyz";
const DIGITS: &[u8] = b"23456789";
const SYMBOLS: &[u8] = b"!@#$%&*";

/// Generate a 6-digit OTP, uniform over 000000-999999.
///
/// Codes with leading zeros are as likely as any other; the string form
/// preserves them.
#[must_use]
pub fn generate_otp() -> String {
    let code: u32 = OsRng.gen_range(0..1_000_000);
    format!("{code:06}")
}

/// Generate a 9-character temporary password: 2 uppercase, 2 lowercase,
/// 3 digits, 2 symbols, shuffled so the category boundaries are not
/// observable in the output.
#[must_use]
pub fn generate_temp_password() -> String {
    let mut chars: Vec<char> = Vec::with_capacity(9);
    for (alphabet, count) in [(UPPER, 2), (LOWER, 2), (DIGITS, 3), (SYMBOLS, 2)] {
        for _ in 0..count {
            let index = OsRng.gen_range(0..alphabet.len());
            chars.push(char::from(alphabet[index]));
        }
    }
    chars.shuffle(&mut OsRng);
    chars.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_is_six_digits() {
        for _ in 0..100 {
            let code = generate_otp();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()), "code: {code}");
        }
    }

    #[test]
    fn otp_keeps_leading_zeros() {
        // Over enough draws the first digit must cover low values too; a
        // generator clamped to 100000..999999 would never produce one.
        let saw_leading_zero = (0..5000).any(|_| generate_otp().starts_with('0'));
        assert!(saw_leading_zero);
    }

    #[test]
    fn temp_password_satisfies_categories() {
        for _ in 0..100 {
            let password = generate_temp_password();
            assert_eq!(password.len(), 9);
            assert_eq!(
                password.chars().filter(|c| c.is_ascii_uppercase()).count(),
                2
            );
            assert_eq!(
                password.chars().filter(|c| c.is_ascii_lowercase()).count(),
                2
            );
            assert_eq!(password.chars().filter(|c| c.is_ascii_digit()).count(), 3);
            assert_eq!(
                password.chars().filter(|c| "!@#$%&*".contains(*c)).count(),
                2
            );
        }
    }

    #[test]
    fn temp_password_avoids_ambiguous_glyphs() {
        for _ in 0..200 {
            let password = generate_temp_password();
            assert!(
                !password.chars().any(|c| "0O1Ili".contains(c)),
                "ambiguous glyph in {password}"
            );
        }
    }

    #[test]
    fn temp_password_is_shuffled() {
        // If the output were category-ordered, every draw would start with
        // an uppercase letter.
        let saw_non_upper_start = (0..200).any(|_| {
            generate_temp_password()
                .chars()
                .next()
                .is_some_and(|c| !c.is_ascii_uppercase())
        });
        assert!(saw_non_upper_start);
    }
}
