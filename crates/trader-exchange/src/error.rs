//! 거래소 에러 타입.

use thiserror::Error;

/// 거래소 관련 에러.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// 요청 한도 초과 (HTTP 429/418)
    #[error("Rate limit exceeded (status: {status:?})")]
    RateLimited { status: Option<u16> },

    /// 거래소가 심볼/페어를 거부함 (HTTP 400)
    #[error("Invalid symbol {symbol}: {message}")]
    InvalidSymbol { symbol: String, message: String },

    /// 기타 HTTP 에러 응답
    #[error("HTTP {status} (code {code:?}): {message}")]
    Http {
        status: u16,
        code: Option<i32>,
        message: String,
    },

    /// 응답 없이 실패한 네트워크/연결 에러
    #[error("Network error: {0}")]
    NetworkError(String),

    /// 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 파싱/역직렬화 에러
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 잘못된 클라이언트 설정
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// 재시도 컨트롤러가 사용하는 실패 분류.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// 지연 후 같은 윈도우 재시도
    RateLimited,
    /// 종목 비활성화 후 남은 윈도우 중단
    Permanent,
    /// 로그 후 해당 윈도우만 건너뜀
    Transient,
}

impl ExchangeError {
    /// HTTP 상태 코드로 에러 생성.
    pub fn from_status(status: u16, symbol: &str, code: Option<i32>, message: String) -> Self {
        match status {
            429 | 418 => ExchangeError::RateLimited {
                status: Some(status),
            },
            400 => ExchangeError::InvalidSymbol {
                symbol: symbol.to_string(),
                message,
            },
            _ => ExchangeError::Http {
                status,
                code,
                message,
            },
        }
    }

    /// 실패 분류.
    ///
    /// 상태 코드 없이 끊긴 연결은 요청 한도 초과와 같은 방식으로 처리합니다.
    pub fn failure_class(&self) -> FailureClass {
        match self {
            ExchangeError::RateLimited { .. } | ExchangeError::NetworkError(_) => {
                FailureClass::RateLimited
            }
            ExchangeError::InvalidSymbol { .. } => FailureClass::Permanent,
            ExchangeError::Http { .. }
            | ExchangeError::Timeout(_)
            | ExchangeError::ParseError(_)
            | ExchangeError::InvalidConfig(_) => FailureClass::Transient,
        }
    }

    /// 응답 HTTP 상태 코드 (있는 경우).
    pub fn status(&self) -> Option<u16> {
        match self {
            ExchangeError::RateLimited { status } => *status,
            ExchangeError::InvalidSymbol { .. } => Some(400),
            ExchangeError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExchangeError::Timeout(err.to_string())
        } else if err.is_decode() {
            ExchangeError::ParseError(err.to_string())
        } else {
            ExchangeError::NetworkError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::ParseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_classification() {
        let e = ExchangeError::from_status(429, "BTCUSDT", Some(-1003), "too many".into());
        assert_eq!(e.failure_class(), FailureClass::RateLimited);
        assert_eq!(e.status(), Some(429));

        let e = ExchangeError::from_status(418, "BTCUSDT", None, "banned".into());
        assert_eq!(e.failure_class(), FailureClass::RateLimited);

        let e = ExchangeError::from_status(400, "XYZUSDT", Some(-1121), "Invalid symbol.".into());
        assert_eq!(e.failure_class(), FailureClass::Permanent);
        assert!(matches!(e, ExchangeError::InvalidSymbol { ref symbol, .. } if symbol == "XYZUSDT"));

        let e = ExchangeError::from_status(503, "BTCUSDT", None, "unavailable".into());
        assert_eq!(e.failure_class(), FailureClass::Transient);
    }

    #[test]
    fn test_statusless_errors() {
        assert_eq!(
            ExchangeError::NetworkError("connection reset".into()).failure_class(),
            FailureClass::RateLimited
        );
        assert_eq!(
            ExchangeError::Timeout("10s".into()).failure_class(),
            FailureClass::Transient
        );
        assert_eq!(
            ExchangeError::ParseError("bad json".into()).failure_class(),
            FailureClass::Transient
        );
        assert_eq!(ExchangeError::Timeout("10s".into()).status(), None);
    }
}
