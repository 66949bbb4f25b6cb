//! Contract — what can be traded, and how loosely it may be specified.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exchange {
    Nyse,
    Nasdaq,
    Amex,
    Arca,
    Smart,
    Island,
    Forex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Jpy,
    Aud,
    Cad,
}

/// Option right: call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Right {
    Call,
    Put,
}

/// Which side of the quote a price request refers to.
///
/// `Market` resolves to the bid/ask midpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceType {
    Market,
    Ask,
    Bid,
}

/// Broad asset class of a contract. Names the top-level cache directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecurityClass {
    Stock,
    Option,
    Forex,
}

impl SecurityClass {
    /// Cache-directory token for this asset class.
    pub fn asset_token(&self) -> &'static str {
        match self {
            SecurityClass::Stock => "stocks",
            SecurityClass::Option => "options",
            SecurityClass::Forex => "forex",
        }
    }
}

/// Option-specific contract terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptionTerms {
    pub strike: f64,
    pub right: Right,
    pub multiplier: f64,
    pub last_trade_date: NaiveDate,
}

impl Eq for OptionTerms {}

impl Hash for OptionTerms {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.strike.to_bits().hash(state);
        self.right.hash(state);
        self.multiplier.to_bits().hash(state);
        self.last_trade_date.hash(state);
    }
}

/// Security-type payload. Options carry their full terms inline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SecurityType {
    Stock,
    Option(OptionTerms),
    Forex,
}

/// A tradable instrument, possibly under-specified.
///
/// `con_id` and `exchange` are optional so a contract can be written loosely
/// (symbol only) and later matched against a fully-resolved one via
/// [`Contract::loosely_matches`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Contract {
    pub symbol: String,
    pub con_id: Option<i64>,
    pub exchange: Option<Exchange>,
    pub currency: Currency,
    pub security: SecurityType,
}

impl Contract {
    pub fn stock(symbol: impl Into<String>) -> Self {
        Contract {
            symbol: symbol.into(),
            con_id: None,
            exchange: None,
            currency: Currency::Usd,
            security: SecurityType::Stock,
        }
    }

    pub fn forex(symbol: impl Into<String>) -> Self {
        Contract {
            symbol: symbol.into(),
            con_id: None,
            exchange: Some(Exchange::Forex),
            currency: Currency::Usd,
            security: SecurityType::Forex,
        }
    }

    pub fn option(symbol: impl Into<String>, terms: OptionTerms) -> Self {
        Contract {
            symbol: symbol.into(),
            con_id: None,
            exchange: None,
            currency: Currency::Usd,
            security: SecurityType::Option(terms),
        }
    }

    pub fn security_class(&self) -> SecurityClass {
        match self.security {
            SecurityType::Stock => SecurityClass::Stock,
            SecurityType::Option(_) => SecurityClass::Option,
            SecurityType::Forex => SecurityClass::Forex,
        }
    }

    /// Whether `self`, treated as a possibly under-specified pattern, matches
    /// a fully-resolved contract.
    ///
    /// Symbol, currency, and security type must agree exactly. A `con_id` or
    /// `exchange` of `None` on either side acts as a wildcard for that field.
    pub fn loosely_matches(&self, well_defined: &Contract) -> bool {
        if self.symbol != well_defined.symbol {
            return false;
        }
        if self.currency != well_defined.currency {
            return false;
        }
        if self.security != well_defined.security {
            return false;
        }
        if let (Some(a), Some(b)) = (self.con_id, well_defined.con_id) {
            if a != b {
                return false;
            }
        }
        if let (Some(a), Some(b)) = (self.exchange, well_defined.exchange) {
            if a != b {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn spy_option() -> Contract {
        Contract::option(
            "SPY",
            OptionTerms {
                strike: 420.0,
                right: Right::Call,
                multiplier: 100.0,
                last_trade_date: NaiveDate::from_ymd_opt(2020, 6, 19).unwrap(),
            },
        )
    }

    #[test]
    fn loose_match_treats_missing_fields_as_wildcards() {
        let loose = Contract::stock("SPY");
        let resolved = Contract {
            con_id: Some(756733),
            exchange: Some(Exchange::Arca),
            ..Contract::stock("SPY")
        };
        assert!(loose.loosely_matches(&resolved));
        assert!(resolved.loosely_matches(&loose));
    }

    #[test]
    fn loose_match_rejects_conflicting_fields() {
        let nyse = Contract {
            exchange: Some(Exchange::Nyse),
            ..Contract::stock("SPY")
        };
        let arca = Contract {
            exchange: Some(Exchange::Arca),
            ..Contract::stock("SPY")
        };
        assert!(!nyse.loosely_matches(&arca));

        assert!(!Contract::stock("SPY").loosely_matches(&Contract::stock("QQQ")));
        assert!(!Contract::stock("SPY").loosely_matches(&Contract::forex("SPY")));
    }

    #[test]
    fn option_terms_must_match_exactly() {
        let a = spy_option();
        let mut b = spy_option();
        assert!(a.loosely_matches(&b));

        if let SecurityType::Option(terms) = &mut b.security {
            terms.strike = 425.0;
        }
        assert!(!a.loosely_matches(&b));
    }

    #[test]
    fn contracts_work_as_map_keys() {
        let mut positions: HashMap<Contract, f64> = HashMap::new();
        positions.insert(Contract::stock("SPY"), 100.0);
        positions.insert(spy_option(), 2.0);
        assert_eq!(positions.get(&Contract::stock("SPY")), Some(&100.0));
        assert_eq!(positions.get(&spy_option()), Some(&2.0));
    }

    #[test]
    fn serialization_roundtrip() {
        let contract = spy_option();
        let json = serde_json::to_string(&contract).unwrap();
        let deser: Contract = serde_json::from_str(&json).unwrap();
        assert_eq!(contract, deser);
    }
}
