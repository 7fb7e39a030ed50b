//! Plain-text strike ladder

use market_data::aggregate::{ChainRow, ChainView, ContractView};
use std::fmt::Write;

const SIDE_HEADER: &str = "     Bid      Ask     Last    Chg%        OI";

fn cell(value: Option<f64>, width: usize, precision: usize) -> String {
    match value {
        Some(v) => format!("{:>width$.precision$}", v, width = width, precision = precision),
        None => format!("{:>width$}", "-", width = width),
    }
}

fn side(view: Option<&ContractView>) -> String {
    let Some(view) = view else {
        return format!("{:>width$}", "", width = SIDE_HEADER.len());
    };
    let quote = view.contract.last_quote.as_ref();
    format!(
        "{} {} {} {} {}",
        cell(quote.and_then(|q| q.bid), 8, 2),
        cell(quote.and_then(|q| q.ask), 8, 2),
        cell(view.contract.last_price(), 8, 2),
        cell(view.percent_change, 7, 1),
        match view.contract.open_interest {
            Some(oi) => format!("{:>9}", oi),
            None => format!("{:>9}", "-"),
        },
    )
}

/// Render calls on the left, puts on the right, ATM strikes starred
pub fn ladder(symbol: &str, view: &ChainView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:^w$} | {:^10} | {:^w$}", "CALLS", "STRIKE", "PUTS", w = SIDE_HEADER.len());
    let _ = writeln!(out, "{} | {:^10} | {}", SIDE_HEADER, "", SIDE_HEADER);

    for row in &view.rows {
        match row {
            ChainRow::Strike(row) => {
                let atm = row.call.as_ref().or(row.put.as_ref()).is_some_and(|v| v.is_atm);
                let strike = format!("{:.2}{}", row.strike, if atm { "*" } else { "" });
                let _ = writeln!(
                    out,
                    "{} | {:^10} | {}",
                    side(row.call.as_ref()),
                    strike,
                    side(row.put.as_ref())
                );
            }
            ChainRow::Marker(marker) => {
                let label = format!(" {} {:.2} ", symbol, marker.price);
                let width = SIDE_HEADER.len() * 2 + 16;
                let _ = writeln!(out, "{:-^width$}", label, width = width);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_data::aggregate;
    use market_data::types::{Contract, ContractType, LastQuote};

    fn contract(strike: f64, kind: ContractType) -> Contract {
        let mut c = Contract::with_identity(
            &format!("O:SPY250117{}{:08}", if kind == ContractType::Call { "C" } else { "P" }, (strike * 1000.0) as u64),
            kind,
            strike,
            "2025-01-17",
        );
        c.last_quote = Some(LastQuote {
            bid: Some(1.0),
            ask: Some(1.2),
            ..Default::default()
        });
        c
    }

    #[test]
    fn test_ladder_places_marker_line() {
        let contracts = vec![
            contract(150.0, ContractType::Call),
            contract(150.0, ContractType::Put),
            contract(155.0, ContractType::Call),
        ];
        let view = aggregate(&contracts, None, 153.0);
        let text = ladder("SPY", &view);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 5);
        assert!(lines[2].contains("150.00*"));
        assert!(lines[3].contains(" SPY 153.00 "));
        assert!(lines[4].contains("155.00*"));
        assert!(lines[2].contains("1.20"));
    }
}
