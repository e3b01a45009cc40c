use thiserror::Error;

/// Faults raised by the exchange client.
#[derive(Debug, Error)]
pub enum KrakenError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Kraken returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Kraken API error: {}", .0.join(", "))]
    Api(Vec<String>),

    #[error("OHLC response has no data for pair {0}")]
    MissingPair(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("API key and secret are required for private endpoint {0}")]
    MissingCredentials(&'static str),

    #[error("API secret is not valid base64")]
    InvalidSecret,

    #[error("{0} is disabled in this build")]
    NotImplemented(&'static str),
}

/// Faults raised while computing indicators.
#[derive(Debug, Error, PartialEq)]
pub enum ComputationError {
    #[error("cannot compute {0} from an empty series")]
    EmptySeries(&'static str),

    #[error("invalid period {period} for {indicator}")]
    InvalidPeriod {
        indicator: &'static str,
        period: usize,
    },

    #[error("Fibonacci level {0} was not computed")]
    MissingLevel(f64),
}

/// Everything that can abort a single strategy cycle.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Remote(#[from] KrakenError),

    #[error(transparent)]
    Computation(#[from] ComputationError),

    #[error("failed to write report: {0}")]
    Output(#[from] std::io::Error),
}
