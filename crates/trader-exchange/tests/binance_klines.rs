//! Binance kline 커넥터 통합 테스트 (mock 서버).

use chrono::{TimeZone, Utc};
use mockito::{Matcher, Server, ServerGuard};
use rust_decimal_macros::dec;
use serde_json::json;
use trader_core::{Instrument, TimeWindow};
use trader_exchange::{
    BinanceConfig, BinanceKlineClient, ExchangeError, FailureClass, KlineFetcher,
};

fn client_for(server: &ServerGuard) -> BinanceKlineClient {
    BinanceKlineClient::new(BinanceConfig::default().with_base_url(server.url())).unwrap()
}

fn window() -> TimeWindow {
    TimeWindow::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap(),
    )
}

fn btc() -> Instrument {
    Instrument::new(1, "btc", 1)
}

fn three_klines_json() -> String {
    json!([
        [1704067200000_i64,"42283.58","42298.62","42261.02","42298.61","35.927",1704067259999_i64,"1519065.66",1327,"19.352","818285.30","0"],
        [1704067260000_i64,"42298.62","42320.00","42289.00","42310.00","20.100",1704067319999_i64,"850000.00",800,"10.000","423000.00","0"],
        [1704067320000_i64,"42310.00","42315.00","42300.00","42301.00","12.500",1704067379999_i64,"528000.00",500,"6.000","253000.00","0"]
    ])
    .to_string()
}

#[tokio::test]
async fn test_fetch_returns_candles_for_window() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v3/klines")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("symbol".into(), "BTCUSDT".into()),
            Matcher::UrlEncoded("interval".into(), "1m".into()),
            Matcher::UrlEncoded("limit".into(), "1000".into()),
            Matcher::UrlEncoded("startTime".into(), "1704067200000".into()),
            Matcher::UrlEncoded("endTime".into(), "1704088799999".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(three_klines_json())
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server);
    let candles = client.fetch(&btc(), &window()).await.unwrap();

    mock.assert_async().await;
    assert_eq!(candles.len(), 3);
    assert_eq!(candles[0].open_time, 1704067200000);
    assert_eq!(candles[0].close, dec!(42298.61));
    assert_eq!(candles[2].number_of_trades, 500);
    assert!(candles.windows(2).all(|w| w[0].open_time < w[1].open_time));
}

#[tokio::test]
async fn test_symbol_is_percent_encoded() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v3/klines")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("symbol".into(), "B&T=1USDT".into()),
            Matcher::UrlEncoded("interval".into(), "1m".into()),
        ]))
        .with_status(200)
        .with_body("[]")
        .expect(1)
        .create_async()
        .await;

    let odd = Instrument::new(2, "b&t=1", 1);
    let candles = client_for(&server).fetch(&odd, &window()).await.unwrap();

    mock.assert_async().await;
    assert!(candles.is_empty());
}

#[tokio::test]
async fn test_empty_response_is_not_an_error() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/v3/klines")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let candles = client_for(&server).fetch(&btc(), &window()).await.unwrap();
    assert!(candles.is_empty());
}

#[tokio::test]
async fn test_too_many_requests_is_rate_limited() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/v3/klines")
        .match_query(Matcher::Any)
        .with_status(429)
        .with_body(r#"{"code":-1003,"msg":"Too many requests."}"#)
        .create_async()
        .await;

    let err = client_for(&server).fetch(&btc(), &window()).await.unwrap_err();
    assert!(matches!(err, ExchangeError::RateLimited { status: Some(429) }));
    assert_eq!(err.failure_class(), FailureClass::RateLimited);
}

#[tokio::test]
async fn test_invalid_symbol_is_permanent() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/v3/klines")
        .match_query(Matcher::UrlEncoded("symbol".into(), "XYZUSDT".into()))
        .with_status(400)
        .with_body(r#"{"code":-1121,"msg":"Invalid symbol."}"#)
        .create_async()
        .await;

    let err = client_for(&server)
        .fetch(&Instrument::new(9, "XYZ", 1), &window())
        .await
        .unwrap_err();

    match &err {
        ExchangeError::InvalidSymbol { symbol, message } => {
            assert_eq!(symbol, "XYZUSDT");
            assert_eq!(message, "Invalid symbol.");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.failure_class(), FailureClass::Permanent);
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/v3/klines")
        .match_query(Matcher::Any)
        .with_status(502)
        .with_body("Bad Gateway")
        .create_async()
        .await;

    let err = client_for(&server).fetch(&btc(), &window()).await.unwrap_err();
    assert!(matches!(err, ExchangeError::Http { status: 502, .. }));
    assert_eq!(err.failure_class(), FailureClass::Transient);
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/v3/klines")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"[[1704067200000, "not-a-number"]]"#)
        .create_async()
        .await;

    let err = client_for(&server).fetch(&btc(), &window()).await.unwrap_err();
    assert!(matches!(err, ExchangeError::ParseError(_)));
    assert_eq!(err.failure_class(), FailureClass::Transient);
}
