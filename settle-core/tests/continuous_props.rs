use chrono::NaiveDate;
use proptest::prelude::*;
use settle_core::{Column, ColumnKey, ContinuousOptions, Panel, Product, build_continuous_prices};

const ROWS: usize = 64;
const CONTRACTS: usize = 5;

fn day(n: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(n as u64)
}

fn month(contract: usize) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(2024, contract as u32 + 2, 1)
}

fn key(offset: i32, t: &str) -> ColumnKey {
    ColumnKey::new("Omip", "Power", "BL", "ES", Product::Month, offset, t)
}

/// Offsets 1 and 2 of one family, built from a price path per contract.
#[derive(Debug, Clone)]
struct Family {
    panel: Panel,
    roll_offset: usize,
    /// Price of contract `c` on row `i`, at `c * ROWS + i`.
    prices: Vec<f64>,
    /// Contract held at the close of each row when rolling by hand.
    held: Vec<usize>,
    /// Rows the continuous series leaves null.
    nulls: Vec<bool>,
}

impl Family {
    fn price(&self, contract: usize, row: usize) -> f64 {
        self.prices[contract * ROWS + row]
    }
}

/// Each front contract is quoted for `roll_offset + 2 + extra` rows, then goes
/// silent for `gap` rows before offset 1 moves on; the last one never does.
/// The next contract is unquoted on the first `lead` rows.
fn arb_family() -> impl Strategy<Value = Family> {
    (
        0usize..3,
        proptest::collection::vec((0usize..5, 1usize..4), 1..5),
        0usize..3,
        proptest::collection::vec(-50i32..50, CONTRACTS * ROWS),
    )
        .prop_map(|(roll_offset, segments, lead, raw)| {
            let prices: Vec<f64> = raw.into_iter().map(f64::from).collect();
            let last = segments.len() - 1;
            let mut front = Vec::new();
            let mut next = Vec::new();
            let mut maturity = Vec::new();
            let mut contract_of = Vec::new();
            // first and last silent row of every contract but the last
            let mut silent = Vec::new();
            for (j, &(extra, gap)) in segments.iter().enumerate() {
                let quoted_rows = roll_offset + 2 + extra;
                let gap = if j == last { 0 } else { gap };
                let first = front.len();
                for k in 0..quoted_rows + gap {
                    let i = first + k;
                    let quoted = k < quoted_rows;
                    front.push(quoted.then(|| prices[j * ROWS + i]));
                    maturity.push(if quoted { month(j) } else { None });
                    next.push((i >= lead).then(|| prices[(j + 1) * ROWS + i]));
                    contract_of.push(j);
                }
                if gap > 0 {
                    silent.push((first + quoted_rows, first + quoted_rows + gap - 1));
                }
            }
            let n = front.len();

            // a roll enters the next contract roll_offset + 1 rows before the silence
            let starts: Vec<usize> = silent.iter().map(|&(s, _)| s - roll_offset - 1).collect();
            let truncated = starts.first().is_some_and(|&s| s < lead);
            let held = (0..n)
                .map(|i| {
                    let j = contract_of[i];
                    let rolled = starts.get(j).is_some_and(|&s| i >= s) && !(j == 0 && truncated);
                    j + usize::from(rolled)
                })
                .collect();
            let nulls = (0..n)
                .map(|i| truncated && (i < starts[0] || (silent[0].0..=silent[0].1).contains(&i)))
                .collect();

            let panel = Panel::from_columns(
                (0..n).map(day).collect(),
                [
                    (key(1, "close"), Column::Values(front)),
                    (key(1, "maturity"), Column::Dates(maturity)),
                    (key(2, "close"), Column::Values(next)),
                ],
            )
            .unwrap();
            Family {
                panel,
                roll_offset,
                prices,
                held,
                nulls,
            }
        })
}

proptest! {
    #[test]
    fn rebuilding_generated_families_is_idempotent(f in arb_family()) {
        let options = ContinuousOptions::default().roll_offset(f.roll_offset);
        let once = build_continuous_prices(&f.panel, &options).unwrap();
        let twice = build_continuous_prices(&once, &options).unwrap();
        prop_assert_eq!(twice, once);
    }

    #[test]
    fn continuous_moves_with_the_held_contract(f in arb_family()) {
        let options = ContinuousOptions::default().roll_offset(f.roll_offset);
        let out = build_continuous_prices(&f.panel, &options).unwrap();
        let adj = out.column(&key(1, "adj_close")).and_then(Column::values).unwrap();
        prop_assert_eq!(adj.len(), f.nulls.len());
        for (i, v) in adj.iter().enumerate() {
            prop_assert_eq!(v.is_none(), f.nulls[i], "row {}", i);
        }
        for i in 1..adj.len() {
            let (Some(prev), Some(now)) = (adj[i - 1], adj[i]) else {
                continue;
            };
            let c = f.held[i - 1];
            let pnl = f.price(c, i) - f.price(c, i - 1);
            prop_assert!((now - prev - pnl).abs() < 1e-9, "row {}: {} != {}", i, now - prev, pnl);
        }
        // offset 2 has no successor
        prop_assert!(!out.contains_key(&key(2, "adj_close")));
    }
}
