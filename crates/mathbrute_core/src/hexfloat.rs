//! `%a`-style hexadecimal rendering of floating values for diagnostics.

/// Formats `x` the way C's `%a` does for a double (`0x1.8p+0`, `-0x0p+0`, `inf`).
pub fn hex_f64(x: f64) -> String {
    let sign = if x.is_sign_negative() { "-" } else { "" };
    if x.is_nan() {
        return format!("{sign}nan");
    }
    if x.is_infinite() {
        return format!("{sign}inf");
    }
    let bits = x.to_bits();
    let exponent = ((bits >> 52) & 0x7ff) as i32;
    let mantissa = bits & ((1u64 << 52) - 1);
    if exponent == 0 && mantissa == 0 {
        return format!("{sign}0x0p+0");
    }
    let (lead, unbiased) = if exponent == 0 {
        (0, -1022)
    } else {
        (1, exponent - 1023)
    };
    let digits = format!("{mantissa:013x}");
    let digits = digits.trim_end_matches('0');
    if digits.is_empty() {
        format!("{sign}0x{lead}p{unbiased:+}")
    } else {
        format!("{sign}0x{lead}.{digits}p{unbiased:+}")
    }
}

pub fn hex_f32(x: f32) -> String {
    hex_f64(f64::from(x))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_c_formatting() {
        assert_eq!(hex_f64(1.0), "0x1p+0");
        assert_eq!(hex_f64(1.5), "0x1.8p+0");
        assert_eq!(hex_f64(-0.0), "-0x0p+0");
        assert_eq!(hex_f64(f64::INFINITY), "inf");
        assert_eq!(hex_f64(f64::NAN), "nan");
        assert_eq!(hex_f32(f32::MIN_POSITIVE), "0x1p-126");
        assert_eq!(hex_f32(f32::from_bits(1)), "0x1p-149");
        assert_eq!(hex_f64(f64::from_bits(1)), "0x0.0000000000001p-1022");
        assert_eq!(hex_f32(f32::MAX), "0x1.fffffep+127");
    }
}
