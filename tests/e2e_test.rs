use cryptopilot::execution::{Trader, TraderConfig};
use cryptopilot::strategy::FibBollingerStrategy;
use cryptopilot::{CycleError, KrakenClient, KrakenError, Settings};
use mockito::Matcher;

// Example secret from Kraken's REST authentication guide
const SECRET: &str =
    "kQH5HW/8p1uGOVjbgWA7FunAmGO8lsSUXNsu3eow76sz84Q18fWxnyRzBHCd3pd5nE9qa99HAZtuZuj6F1huXg==";

fn ohlc_body(pair: &str, closes: &[f64]) -> String {
    let rows: Vec<serde_json::Value> = closes
        .iter()
        .enumerate()
        .map(|(i, close)| {
            serde_json::json!([
                1_700_000_000 + i as i64 * 900,
                format!("{:.1}", close),
                format!("{:.1}", close + 1.0),
                format!("{:.1}", close - 1.0),
                format!("{:.1}", close),
                format!("{:.1}", close),
                "1.00000000",
                4
            ])
        })
        .collect();

    serde_json::json!({
        "error": [],
        "result": { pair: rows, "last": 1_700_000_000 + (closes.len() as i64 - 1) * 900 }
    })
    .to_string()
}

fn settings(server: &mockito::Server) -> Settings {
    Settings::from_toml_str(&format!(
        r#"
        api_key = "e2e-key"
        api_secret = "{}"
        api_url = "{}"
        lookback_period = 2
        bbands_period = 3
        last_price_seed = "previous_close"
        "#,
        SECRET,
        server.url()
    ))
    .unwrap()
}

fn build_trader(settings: &Settings) -> Trader<KrakenClient, FibBollingerStrategy> {
    let client = KrakenClient::from_settings(settings).unwrap();
    let strategy = FibBollingerStrategy::new(settings.signal_config());
    Trader::new(client, strategy, TraderConfig::from_settings(settings))
}

#[tokio::test]
async fn test_e2e_cycle_against_mock_kraken() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let mut server = mockito::Server::new_async().await;
    let closes: Vec<f64> = (0..10).map(|k| 100.0 + (k * k) as f64).collect();

    let ohlc = server
        .mock("POST", "/0/public/OHLC")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("pair".into(), "XBTUSD".into()),
            Matcher::UrlEncoded("interval".into(), "15".into()),
        ]))
        .with_body(ohlc_body("XBTUSD", &closes))
        .expect(1)
        .create_async()
        .await;

    let balance = server
        .mock("POST", "/0/private/Balance")
        .match_header("API-Key", "e2e-key")
        .match_header("API-Sign", Matcher::Any)
        .with_body(r#"{"error": [], "result": {"ZUSD": "2500.0000", "XXBT": "0.0500000000"}}"#)
        .expect(2)
        .create_async()
        .await;

    // Open order queries are off by default: no other endpoint may be hit
    let others = server
        .mock("POST", Matcher::Regex(r"^/0/private/(OpenOrders|OpenPositions|CancelOrder|AddOrder)".into()))
        .expect(0)
        .create_async()
        .await;

    let settings = settings(&server);
    let trader = build_trader(&settings);

    let mut out = Vec::new();
    let report = trader.run_cycle(&mut out).await.unwrap();
    let text = String::from_utf8(out).unwrap();

    ohlc.assert_async().await;
    balance.assert_async().await;
    others.assert_async().await;

    assert_eq!(report.candle_count, 10);
    assert_eq!(report.signals.len(), 1);
    assert_eq!(report.starting_balance.get("ZUSD"), Some(&2500.0));
    assert!(report.cancelled_orders.is_empty());
    assert!(report.open_positions.is_empty());

    assert!(text.starts_with("Account balance: XXBT 0.05, ZUSD 2500\n"));
    assert_eq!(text.matches("Sell signal detected at 164.0000.").count(), 1);
    assert!(text.contains("Did not sell 0.01 XBT at 164.0000: order placement is disabled."));
    assert!(text.ends_with("Final account balance: XXBT 0.05, ZUSD 2500\n"));
}

#[tokio::test]
async fn test_e2e_cancels_open_orders_when_enabled() {
    let mut server = mockito::Server::new_async().await;
    let closes: Vec<f64> = (0..10).map(|k| 100.0 + k as f64).collect();

    server
        .mock("POST", "/0/public/OHLC")
        .with_body(ohlc_body("XBTUSD", &closes))
        .create_async()
        .await;
    server
        .mock("POST", "/0/private/Balance")
        .with_body(r#"{"error": [], "result": {"ZUSD": "10.0"}}"#)
        .create_async()
        .await;
    server
        .mock("POST", "/0/private/OpenOrders")
        .with_body(
            r#"{"error": [], "result": {"open": {
                "OQCLML-BW3P3-BUCMWZ": {"descr": {"pair": "XBTUSD", "type": "sell"}, "vol": "0.01"}
            }}}"#,
        )
        .create_async()
        .await;
    server
        .mock("POST", "/0/private/OpenPositions")
        .with_body(r#"{"error": [], "result": {}}"#)
        .create_async()
        .await;
    let cancel = server
        .mock("POST", "/0/private/CancelOrder")
        .match_body(Matcher::UrlEncoded("txid".into(), "OQCLML-BW3P3-BUCMWZ".into()))
        .with_body(r#"{"error": [], "result": {"count": 1}}"#)
        .expect(1)
        .create_async()
        .await;

    let mut settings = settings(&server);
    settings.query_open_orders = true;
    let trader = build_trader(&settings);

    let mut out = Vec::new();
    let report = trader.run_cycle(&mut out).await.unwrap();
    let text = String::from_utf8(out).unwrap();

    cancel.assert_async().await;
    assert_eq!(report.cancelled_orders, vec!["OQCLML-BW3P3-BUCMWZ"]);
    assert!(text.contains("Cancelled open orders."));
}

#[tokio::test]
async fn test_e2e_balance_auth_failure_propagates() {
    let mut server = mockito::Server::new_async().await;
    let closes: Vec<f64> = (0..10).map(|k| 100.0 + (k * k) as f64).collect();

    server
        .mock("POST", "/0/public/OHLC")
        .with_body(ohlc_body("XBTUSD", &closes))
        .create_async()
        .await;
    server
        .mock("POST", "/0/private/Balance")
        .with_body(r#"{"error": ["EAPI:Invalid key"]}"#)
        .create_async()
        .await;

    let settings = settings(&server);
    let trader = build_trader(&settings);

    let mut out = Vec::new();
    let result = trader.run_cycle(&mut out).await;

    match result {
        Err(CycleError::Remote(KrakenError::Api(errors))) => {
            assert_eq!(errors, vec!["EAPI:Invalid key".to_string()]);
        }
        other => panic!("expected API error, got {:?}", other.map(|r| r.signals)),
    }
    assert!(out.is_empty());
}
