//! Strike-indexed chain view
//!
//! Pairs calls and puts by strike for one expiration, sorts the rows and
//! places a marker where the underlying's price falls. Pure: nothing here
//! does I/O or fails on missing optional fields.

use chrono::NaiveDate;
use ordered_float::OrderedFloat;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::types::{Contract, ContractType};

/// Absolute distance from the underlying price counted as at-the-money
pub const ATM_BAND: f64 = 5.0;

/// A contract with its display metrics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractView {
    pub contract: Contract,
    /// Percent move of the last trade from the day's open
    pub percent_change: Option<f64>,
    /// Absolute move of the last trade from the day's open
    pub net_change: Option<f64>,
    pub is_atm: bool,
}

impl ContractView {
    fn new(contract: Contract, strike: f64, current_price: f64) -> Self {
        let last = contract.last_price();
        let open = contract.day_open();

        let percent_change = match (last, open) {
            (Some(last), Some(open)) if open > 0.0 => Some((last - open) / open * 100.0),
            _ => None,
        };
        let net_change = match (last, open) {
            (Some(last), Some(open)) => Some(last - open),
            _ => None,
        };

        Self {
            contract,
            percent_change,
            net_change,
            is_atm: (strike - current_price).abs() < ATM_BAND,
        }
    }
}

/// Call and put sharing one strike
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrikeRow {
    pub strike: f64,
    pub call: Option<ContractView>,
    pub put: Option<ContractView>,
}

/// Where the underlying's price sits among the strikes
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CurrentPriceMarker {
    pub price: f64,
}

/// One entry of the ordered view
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainRow {
    Strike(StrikeRow),
    Marker(CurrentPriceMarker),
}

impl ChainRow {
    pub fn strike(&self) -> Option<f64> {
        match self {
            ChainRow::Strike(row) => Some(row.strike),
            ChainRow::Marker(_) => None,
        }
    }

    pub fn is_marker(&self) -> bool {
        matches!(self, ChainRow::Marker(_))
    }
}

/// Two contracts landed on the same strike and kind; the later one was kept
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrikeCollision {
    pub strike: f64,
    pub contract_type: ContractType,
    pub replaced: Option<String>,
    pub kept: Option<String>,
}

/// Aggregation output
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChainView {
    pub rows: Vec<ChainRow>,
    pub collisions: Vec<StrikeCollision>,
    /// Contracts without a usable strike or kind
    pub skipped: usize,
}

impl ChainView {
    /// Strikes of the strike rows, in output order
    pub fn strikes(&self) -> Vec<f64> {
        self.rows.iter().filter_map(ChainRow::strike).collect()
    }

    pub fn marker_index(&self) -> Option<usize> {
        self.rows.iter().position(ChainRow::is_marker)
    }
}

#[derive(Default)]
struct Bucket {
    call: Option<Contract>,
    put: Option<Contract>,
}

/// Build the strike-ordered view.
///
/// With `selected_expiration` set, only contracts expiring on that date are
/// kept. On a duplicate (strike, kind) the last contract wins and the clash
/// is reported in [`ChainView::collisions`]. A marker row precedes the first
/// strike above `current_price` when the price is positive and does not sit
/// exactly on a strike.
pub fn aggregate(
    contracts: &[Contract],
    selected_expiration: Option<NaiveDate>,
    current_price: f64,
) -> ChainView {
    let mut buckets: BTreeMap<OrderedFloat<f64>, Bucket> = BTreeMap::new();
    let mut collisions = Vec::new();
    let mut skipped = 0;

    let retained = contracts
        .iter()
        .filter(|c| selected_expiration.map_or(true, |exp| c.expiration() == Some(exp)));

    for contract in retained {
        let (strike, kind) = match (contract.strike(), contract.contract_type()) {
            (Some(strike), Some(kind)) if strike.is_finite() => (strike, kind),
            _ => {
                skipped += 1;
                continue;
            }
        };

        let bucket = buckets.entry(OrderedFloat(strike)).or_default();
        let slot = match kind {
            ContractType::Call => &mut bucket.call,
            ContractType::Put => &mut bucket.put,
        };
        if let Some(previous) = slot.replace(contract.clone()) {
            collisions.push(StrikeCollision {
                strike,
                contract_type: kind,
                replaced: previous.ticker().map(str::to_string),
                kept: contract.ticker().map(str::to_string),
            });
        }
    }

    if !collisions.is_empty() {
        warn!(count = collisions.len(), "Duplicate strike/kind contracts, keeping the last of each");
    }
    if skipped > 0 {
        debug!(skipped, "Contracts without strike or kind left out of the view");
    }

    let mut rows = Vec::with_capacity(buckets.len() + 1);
    let mut marker_placed = current_price.is_nan() || current_price <= 0.0;

    for (strike, bucket) in buckets {
        let strike = strike.into_inner();
        if !marker_placed && strike >= current_price {
            if strike > current_price {
                rows.push(ChainRow::Marker(CurrentPriceMarker {
                    price: current_price,
                }));
            }
            marker_placed = true;
        }
        rows.push(ChainRow::Strike(StrikeRow {
            strike,
            call: bucket.call.map(|c| ContractView::new(c, strike, current_price)),
            put: bucket.put.map(|c| ContractView::new(c, strike, current_price)),
        }));
    }

    ChainView {
        rows,
        collisions,
        skipped,
    }
}

/// Distinct expirations present in `contracts`, ascending
pub fn expirations(contracts: &[Contract]) -> Vec<NaiveDate> {
    contracts
        .iter()
        .filter_map(Contract::expiration)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DayBar, LastTrade};

    fn contract(kind: ContractType, strike: f64, expiration: &str) -> Contract {
        let ticker = format!("O:T{}{}{}", expiration, kind, strike);
        Contract::with_identity(ticker, kind, strike, expiration)
    }

    fn chain(strikes: &[f64]) -> Vec<Contract> {
        strikes
            .iter()
            .flat_map(|&s| {
                vec![
                    contract(ContractType::Call, s, "2025-01-17"),
                    contract(ContractType::Put, s, "2025-01-17"),
                ]
            })
            .collect()
    }

    #[test]
    fn test_marker_precedes_first_strike_above_price() {
        let view = aggregate(&chain(&[330.0, 95.0, 155.0, 150.0]), None, 153.0);

        assert_eq!(view.strikes(), vec![95.0, 150.0, 155.0, 330.0]);
        assert_eq!(view.marker_index(), Some(2));
        assert_eq!(view.rows[3].strike(), Some(155.0));
        assert_eq!(
            view.rows[2],
            ChainRow::Marker(CurrentPriceMarker { price: 153.0 })
        );
    }

    #[test]
    fn test_no_marker_when_price_equals_strike() {
        let view = aggregate(&chain(&[95.0, 150.0, 155.0, 330.0]), None, 150.0);
        assert_eq!(view.marker_index(), None);
        assert_eq!(view.rows.len(), 4);
    }

    #[test]
    fn test_no_marker_above_all_strikes_or_non_positive() {
        let strikes = [95.0, 150.0];
        assert_eq!(aggregate(&chain(&strikes), None, 500.0).marker_index(), None);
        assert_eq!(aggregate(&chain(&strikes), None, 0.0).marker_index(), None);
        assert_eq!(aggregate(&chain(&strikes), None, -3.0).marker_index(), None);
        assert_eq!(aggregate(&chain(&strikes), None, 10.0).marker_index(), Some(0));
    }

    #[test]
    fn test_rows_pair_call_and_put_on_the_same_strike() {
        let mut contracts = chain(&[100.0, 105.0]);
        contracts.push(contract(ContractType::Call, 110.0, "2025-01-17"));

        let view = aggregate(&contracts, None, 0.0);

        for row in &view.rows {
            if let ChainRow::Strike(row) = row {
                for side in [&row.call, &row.put].into_iter().flatten() {
                    assert_eq!(side.contract.strike(), Some(row.strike));
                }
            }
        }
        match &view.rows[2] {
            ChainRow::Strike(row) => {
                assert!(row.call.is_some());
                assert!(row.put.is_none());
            }
            other => panic!("unexpected row {:?}", other),
        }
    }

    #[test]
    fn test_expiration_filter() {
        let mut contracts = chain(&[100.0]);
        contracts.push(contract(ContractType::Call, 200.0, "2025-02-21"));
        contracts.push(contract(ContractType::Call, 300.0, "2025-02-21T16:00:00Z"));

        let view = aggregate(&contracts, NaiveDate::from_ymd_opt(2025, 2, 21), 0.0);
        assert_eq!(view.strikes(), vec![200.0, 300.0]);

        assert_eq!(
            expirations(&contracts),
            vec![
                NaiveDate::from_ymd_opt(2025, 1, 17).unwrap(),
                NaiveDate::from_ymd_opt(2025, 2, 21).unwrap(),
            ]
        );
    }

    #[test]
    fn test_collision_keeps_last_and_is_reported() {
        let first = contract(ContractType::Call, 100.0, "2025-01-17");
        let mut second = first.clone();
        second.details.as_mut().unwrap().ticker = Some("O:SECOND".into());

        let view = aggregate(&[first, second], None, 0.0);

        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.collisions.len(), 1);
        assert_eq!(view.collisions[0].kept.as_deref(), Some("O:SECOND"));
        match &view.rows[0] {
            ChainRow::Strike(row) => {
                assert_eq!(row.call.as_ref().unwrap().contract.ticker(), Some("O:SECOND"))
            }
            other => panic!("unexpected row {:?}", other),
        }
    }

    #[test]
    fn test_derived_metrics() {
        let mut traded = contract(ContractType::Call, 152.0, "2025-01-17");
        traded.last_trade = Some(LastTrade {
            price: Some(3.0),
            size: Some(5),
        });
        traded.day = Some(DayBar {
            open: Some(2.0),
            ..Default::default()
        });
        let mut zero_open = contract(ContractType::Put, 152.0, "2025-01-17");
        zero_open.last_trade = traded.last_trade;
        zero_open.day = Some(DayBar {
            open: Some(0.0),
            ..Default::default()
        });
        let far = contract(ContractType::Call, 158.0, "2025-01-17");

        let view = aggregate(&[traded, zero_open, far], None, 153.0);

        let rows: Vec<&StrikeRow> = view
            .rows
            .iter()
            .filter_map(|r| match r {
                ChainRow::Strike(row) => Some(row),
                ChainRow::Marker(_) => None,
            })
            .collect();

        let call = rows[0].call.as_ref().unwrap();
        assert_eq!(call.percent_change, Some(50.0));
        assert_eq!(call.net_change, Some(1.0));
        assert!(call.is_atm);

        let put = rows[0].put.as_ref().unwrap();
        assert_eq!(put.percent_change, None);
        assert_eq!(put.net_change, Some(3.0));

        let far = rows[1].call.as_ref().unwrap();
        assert!(!far.is_atm);
        assert_eq!(far.percent_change, None);
        assert_eq!(far.net_change, None);
    }

    #[test]
    fn test_malformed_contracts_are_skipped() {
        let mut no_strike = contract(ContractType::Call, 1.0, "2025-01-17");
        no_strike.details.as_mut().unwrap().strike_price = None;
        let mut nan_strike = contract(ContractType::Put, 1.0, "2025-01-17");
        nan_strike.details.as_mut().unwrap().strike_price = Some(f64::NAN);

        let view = aggregate(&[no_strike, nan_strike, Contract::default()], None, 100.0);

        assert!(view.rows.is_empty());
        assert_eq!(view.skipped, 3);
    }

    #[test]
    fn test_strictly_increasing_and_deterministic() {
        let mut contracts = chain(&[120.0, 80.0, 100.0, 100.0, 90.0, 110.0]);
        contracts.reverse();

        let first = aggregate(&contracts, None, 99.5);
        let strikes = first.strikes();
        assert!(strikes.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(first, aggregate(&contracts, None, 99.5));
    }

    #[test]
    fn test_atm_band_boundary() {
        let view = aggregate(&chain(&[95.0, 96.0]), None, 100.0);
        let atm: Vec<bool> = view
            .rows
            .iter()
            .filter_map(|r| match r {
                ChainRow::Strike(row) => row.call.as_ref().map(|c| c.is_atm),
                ChainRow::Marker(_) => None,
            })
            .collect();
        assert_eq!(atm, vec![false, true]);
    }
}
