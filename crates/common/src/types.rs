use serde::{Deserialize, Serialize};
use std::fmt;

/// A token identified by its symbol string.
///
/// Symbols are arbitrary non-empty strings compared by exact,
/// case-sensitive equality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(pub String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Token(s.to_string())
    }
}

impl From<String> for Token {
    fn from(s: String) -> Self {
        Token(s)
    }
}

/// A directed exchange-rate hop between two tokens on a named venue.
///
/// Edges are immutable once inserted into a graph. The log-space weight is
/// always derived on demand from the stored attributes so there is a single
/// source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from_token: Token,
    pub to_token: Token,
    /// Quoted exchange rate, units of `to_token` per unit of `from_token`.
    pub rate: f64,
    /// Proportional fee in [0, 1).
    pub fee: f64,
    /// Available liquidity in units of `from_token`.
    pub liquidity: f64,
    /// Venue label, e.g. an exchange name.
    pub venue: String,
    /// Declared per-hop volatility (standard deviation of the relative
    /// rate noise). Optional on the wire.
    #[serde(default)]
    pub volatility: f64,
}

impl Edge {
    pub fn new(
        from: impl Into<Token>,
        to: impl Into<Token>,
        rate: f64,
        fee: f64,
        liquidity: f64,
        venue: impl Into<String>,
    ) -> Self {
        Self {
            from_token: from.into(),
            to_token: to.into(),
            rate,
            fee,
            liquidity,
            venue: venue.into(),
            volatility: 0.0,
        }
    }

    pub fn with_volatility(mut self, sigma: f64) -> Self {
        self.volatility = sigma;
        self
    }

    /// Rate after the proportional fee.
    pub fn effective_rate(&self) -> f64 {
        self.rate * (1.0 - self.fee)
    }

    /// Log-space weight `w = -ln(rate * (1 - fee))`.
    ///
    /// Degenerate edges (effective rate <= 0 or non-finite) get `+inf` and
    /// are thereby non-relaxable. Self-loops never contribute negative
    /// weight.
    pub fn log_weight(&self) -> f64 {
        let effective = self.effective_rate();
        if !effective.is_finite() || effective <= 0.0 {
            return f64::INFINITY;
        }
        let w = -effective.ln();
        if self.from_token == self.to_token {
            w.max(0.0)
        } else {
            w
        }
    }

    /// Wire-level validation: finite positive rate, fee in [0, 1),
    /// non-negative finite liquidity, non-empty token symbols.
    pub fn validate(&self) -> Result<(), crate::errors::EngineError> {
        use crate::errors::EngineError::InvalidInput;
        if self.from_token.0.is_empty() || self.to_token.0.is_empty() {
            return Err(InvalidInput("empty token symbol".to_string()));
        }
        if !self.rate.is_finite() || self.rate <= 0.0 {
            return Err(InvalidInput(format!(
                "rate must be a finite positive number, got {} for {}->{}",
                self.rate, self.from_token, self.to_token
            )));
        }
        if !self.fee.is_finite() || self.fee < 0.0 || self.fee >= 1.0 {
            return Err(InvalidInput(format!(
                "fee must lie in [0, 1), got {} for {}->{}",
                self.fee, self.from_token, self.to_token
            )));
        }
        if !self.liquidity.is_finite() || self.liquidity < 0.0 {
            return Err(InvalidInput(format!(
                "liquidity must be a finite non-negative number, got {} for {}->{}",
                self.liquidity, self.from_token, self.to_token
            )));
        }
        if !self.volatility.is_finite() || self.volatility < 0.0 {
            return Err(InvalidInput(format!(
                "volatility must be a finite non-negative number, got {}",
                self.volatility
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}->{} @{} (fee {}, liq {}, {})",
            self.from_token, self.to_token, self.rate, self.fee, self.liquidity, self.venue
        )
    }
}

/// Canonical order-insensitive identity of a cycle: the sorted multiset of
/// token symbols joined with a separator.
///
/// Two cycles with the same fingerprint within one scan are duplicates;
/// the persistence tracker keys cross-scan identity on the same form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CycleFingerprint(pub String);

impl CycleFingerprint {
    /// Builds the fingerprint from a closed token path (first == last);
    /// the duplicated closing token is not counted twice.
    pub fn from_path(path: &[Token]) -> Self {
        let body = if path.len() > 1 && path.first() == path.last() {
            &path[..path.len() - 1]
        } else {
            path
        };
        let mut symbols: Vec<&str> = body.iter().map(|t| t.as_str()).collect();
        symbols.sort_unstable();
        CycleFingerprint(symbols.join("|"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CycleFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A profitable closed cycle recovered from the rate graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cycle {
    /// Ordered token path; `path[0] == path[path.len() - 1]`.
    pub path: Vec<Token>,
    /// Edge indices into the owning graph's edge table, one per hop.
    pub edge_ids: Vec<usize>,
    /// Raw multiplicative profit `prod(rate * (1 - fee)) - 1`.
    pub raw_profit: f64,
    /// Log-space profit `sum(w)`; negative for a true arbitrage.
    pub log_profit: f64,
    /// Number of hops; equals `path.len() - 1`.
    pub path_length: usize,
    /// Share of detection wall time attributed to this cycle.
    pub detection_time_ms: f64,
}

impl Cycle {
    pub fn fingerprint(&self) -> CycleFingerprint {
        CycleFingerprint::from_path(&self.path)
    }

    /// Checks the structural invariants: closed path and hop count
    /// consistency.
    pub fn is_well_formed(&self) -> bool {
        self.path.len() >= 2
            && self.path.first() == self.path.last()
            && self.edge_ids.len() == self.path.len() - 1
            && self.path_length == self.edge_ids.len()
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self
            .path
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(" -> ");
        write!(f, "{} ({:+.4}%)", path, self.raw_profit * 100.0)
    }
}

/// Latency at which a cycle's expected return reaches zero.
///
/// `Unbounded` serializes as the JSON string `"unbounded"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HalfLife {
    Bounded(f64),
    Unbounded,
}

impl HalfLife {
    /// Milliseconds, `+inf` for the unbounded case.
    pub fn as_ms(&self) -> f64 {
        match self {
            HalfLife::Bounded(ms) => *ms,
            HalfLife::Unbounded => f64::INFINITY,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, HalfLife::Unbounded)
    }
}

impl fmt::Display for HalfLife {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HalfLife::Bounded(ms) => write!(f, "{ms:.1}ms"),
            HalfLife::Unbounded => write!(f, "unbounded"),
        }
    }
}

impl Serialize for HalfLife {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            HalfLife::Bounded(ms) => serializer.serialize_f64(*ms),
            HalfLife::Unbounded => serializer.serialize_str("unbounded"),
        }
    }
}

impl<'de> Deserialize<'de> for HalfLife {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Ms(f64),
            Tag(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Ms(ms) => Ok(HalfLife::Bounded(ms)),
            Raw::Tag(s) if s == "unbounded" => Ok(HalfLife::Unbounded),
            Raw::Tag(s) => Err(serde::de::Error::custom(format!(
                "expected a number of milliseconds or \"unbounded\", got {s:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_display_is_case_sensitive() {
        let token = Token::from("wEth");
        assert_eq!(format!("{}", token), "wEth");
        assert_ne!(token, Token::from("WETH"));
    }

    #[test]
    fn test_edge_log_weight_profitable_hop() {
        let edge = Edge::new("BTC", "ETH", 15.0, 0.0, 1e6, "binance");
        // rate > 1 gives a negative weight
        assert!(edge.log_weight() < 0.0);
        assert!((edge.log_weight() - (-(15.0f64).ln())).abs() < 1e-12);
    }

    #[test]
    fn test_edge_log_weight_degenerate() {
        let edge = Edge::new("BTC", "ETH", 0.0, 0.0, 1e6, "binance");
        assert_eq!(edge.log_weight(), f64::INFINITY);
    }

    #[test]
    fn test_self_loop_weight_never_negative() {
        let edge = Edge::new("BTC", "BTC", 2.0, 0.0, 1e6, "binance");
        assert!(edge.log_weight() >= 0.0);
    }

    #[test]
    fn test_edge_validate_rejects_bad_fee() {
        let edge = Edge::new("BTC", "ETH", 15.0, 1.0, 1e6, "binance");
        assert!(edge.validate().is_err());
        let edge = Edge::new("BTC", "ETH", 15.0, 0.999, 1e6, "binance");
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn test_fingerprint_is_order_insensitive() {
        let a = CycleFingerprint::from_path(&[
            Token::from("BTC"),
            Token::from("ETH"),
            Token::from("USDT"),
            Token::from("BTC"),
        ]);
        let b = CycleFingerprint::from_path(&[
            Token::from("ETH"),
            Token::from("USDT"),
            Token::from("BTC"),
            Token::from("ETH"),
        ]);
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "BTC|ETH|USDT");
    }

    #[test]
    fn test_cycle_well_formed() {
        let cycle = Cycle {
            path: vec![Token::from("A"), Token::from("B"), Token::from("A")],
            edge_ids: vec![0, 1],
            raw_profit: 0.01,
            log_profit: -(1.01f64).ln(),
            path_length: 2,
            detection_time_ms: 0.1,
        };
        assert!(cycle.is_well_formed());
    }

    #[test]
    fn test_half_life_serde_round_trip() {
        let bounded = serde_json::to_string(&HalfLife::Bounded(100.0)).unwrap();
        assert_eq!(bounded, "100.0");
        let unbounded = serde_json::to_string(&HalfLife::Unbounded).unwrap();
        assert_eq!(unbounded, "\"unbounded\"");

        let back: HalfLife = serde_json::from_str("\"unbounded\"").unwrap();
        assert!(back.is_unbounded());
        let back: HalfLife = serde_json::from_str("42.5").unwrap();
        assert_eq!(back, HalfLife::Bounded(42.5));
    }
}
