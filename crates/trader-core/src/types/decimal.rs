//! 정밀한 가격/거래량 표현을 위한 Decimal 유틸리티.
//!
//! 거래소는 가격과 거래량을 문자열로 내려주므로 부동소수점을 거치지 않고
//! 바로 `Decimal`로 파싱합니다.

use rust_decimal::Decimal;
use std::str::FromStr;

/// 금융 정밀도를 위한 가격 타입.
pub type Price = Decimal;

/// 거래량 타입.
pub type Quantity = Decimal;

/// 10진수 문자열을 `Decimal`로 파싱합니다.
///
/// 지수 표기(`1e-8`)도 허용합니다. 실패 시 원본 문자열을 포함한 메시지를 반환합니다.
pub fn parse_decimal_str(s: &str) -> Result<Decimal, String> {
    let trimmed = s.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|e| format!("invalid decimal '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_decimal_str_keeps_precision() {
        assert_eq!(
            parse_decimal_str("0.00000001").unwrap(),
            dec!(0.00000001)
        );
        assert_eq!(
            parse_decimal_str("42123.45000000").unwrap(),
            dec!(42123.45000000)
        );
        assert_eq!(parse_decimal_str(" 7 ").unwrap(), dec!(7));
    }

    #[test]
    fn test_parse_decimal_str_scientific_and_invalid() {
        assert_eq!(parse_decimal_str("1e-8").unwrap(), dec!(0.00000001));
        assert!(parse_decimal_str("abc").is_err());
        assert!(parse_decimal_str("").is_err());
    }
}
