//! 수집 대상 종목.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 거래소에 상장된 수집 대상 종목.
///
/// 외부 레지스트리가 생성/비활성화하며 엔진은 읽기만 합니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    /// 종목 ID (식별자)
    pub id: i64,
    /// 기준 자산 심볼 (예: "BTC")
    pub symbol: String,
    /// 거래소 ID
    pub exchange_id: i64,
}

impl Instrument {
    /// 새 종목 생성.
    pub fn new(id: i64, symbol: impl Into<String>, exchange_id: i64) -> Self {
        Self {
            id,
            symbol: symbol.into(),
            exchange_id,
        }
    }

    /// 호가 자산을 붙인 거래 페어 (예: "BTC" + "USDT" -> "BTCUSDT").
    pub fn pair(&self, quote_asset: &str) -> String {
        format!("{}{}", self.symbol.to_uppercase(), quote_asset.to_uppercase())
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.symbol, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair() {
        let btc = Instrument::new(1, "btc", 1);
        assert_eq!(btc.pair("USDT"), "BTCUSDT");
        assert_eq!(btc.pair("usdt"), "BTCUSDT");
        assert_eq!(btc.to_string(), "btc#1");
    }
}
