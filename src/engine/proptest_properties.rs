//! Property-based tests for the exchange's pool and share invariants.
//!
//! 1. **Invariant preservation**: `currency_reserve * asset_reserve` never
//!    decreases across a buy or sell.
//! 2. **Share conservation**: share balances sum to the pool's share supply
//!    after any sequence of operations, and custody matches reserves.
//! 3. **Liquidity round trip**: adding then removing the minted shares
//!    never returns more than was contributed, and loses at most rounding.

use proptest::prelude::*;

use hydra_amm::domain::{Amount, BasisPoints, FeeTier};

use super::pricing::PricingEngine;
use super::test_support::{acct, harness, Harness};
use crate::domain::{AssetId, Pool};

const ID: AssetId = AssetId::new(1);

fn engine(bps: u32) -> PricingEngine {
    let Ok(engine) = PricingEngine::new(FeeTier::new(BasisPoints::new(bps))) else {
        panic!("valid fee");
    };
    engine
}

fn k(pool: &Pool) -> u128 {
    let Ok(k) = pool.invariant() else {
        panic!("invariant overflow in generated pool");
    };
    k.get()
}

#[derive(Debug, Clone)]
enum Op {
    Add { who: usize, id: u64, amount: u128 },
    Sell { who: usize, id: u64, amount: u128 },
    Buy { who: usize, id: u64, amount: u128 },
    Remove { who: usize, id: u64, percent: u128 },
    Give { from: usize, to: usize, id: u64, percent: u128 },
}

const HOLDERS: [&str; 3] = ["ann", "ben", "cat"];

fn holder(i: usize) -> &'static str {
    HOLDERS.get(i % HOLDERS.len()).copied().unwrap_or("ann")
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let who = 0usize..3;
    let id = 1u64..=2;
    prop_oneof![
        (who.clone(), id.clone(), 1u128..5_000)
            .prop_map(|(who, id, amount)| Op::Add { who, id, amount }),
        (who.clone(), id.clone(), 1u128..5_000)
            .prop_map(|(who, id, amount)| Op::Sell { who, id, amount }),
        (who.clone(), id.clone(), 0u128..5_000)
            .prop_map(|(who, id, amount)| Op::Buy { who, id, amount }),
        (who.clone(), id.clone(), 1u128..=100)
            .prop_map(|(who, id, percent)| Op::Remove { who, id, percent }),
        (who.clone(), who, id, 1u128..=100)
            .prop_map(|(from, to, id, percent)| Op::Give { from, to, id, percent }),
    ]
}

fn apply(h: &Harness, op: &Op) {
    // failures are expected for many generated ops; only the books matter
    let _ = match *op {
        Op::Add { who, id, amount } => h
            .add(holder(who), &[(id, amount, amount.saturating_mul(4))])
            .map(|_| ()),
        Op::Sell { who, id, amount } => h
            .sell(holder(who), holder(who), &[(id, amount)], 0)
            .map(|_| ()),
        Op::Buy { who, id, amount } => h
            .buy(holder(who), holder(who), &[(id, amount)], u128::MAX)
            .map(|_| ()),
        Op::Remove { who, id, percent } => {
            let shares = h.shares_of(holder(who), id) * percent / 100;
            h.remove(holder(who), &[(id, shares, 0, 0)]).map(|_| ())
        }
        Op::Give { from, to, id, percent } => {
            let shares = h.shares_of(holder(from), id) * percent / 100;
            h.exchange.transfer_shares(
                &acct(holder(from)),
                &acct(holder(to)),
                AssetId::new(id),
                Amount::new(shares),
            )
        }
    };
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn buy_never_decreases_k(
        c in 1u128..1_000_000_000_000,
        a in 2u128..1_000_000_000_000,
        frac in 1u128..1_000,
        bps in 0u32..=300,
    ) {
        let pool = Pool::new(Amount::new(c), Amount::new(a), Amount::new(c));
        let out = Amount::new((a - 1) * frac / 1_000);
        let Ok(cost) = engine(bps).buy(ID, &pool, out) else {
            panic!("buy below reserve must price");
        };
        let Ok(next) = pool.after_buy(out, cost) else {
            panic!("transition failed");
        };
        prop_assert!(k(&next) >= k(&pool));
    }

    #[test]
    fn sell_never_decreases_k(
        c in 1u128..1_000_000_000_000,
        a in 1u128..1_000_000_000_000,
        amount in 0u128..1_000_000_000_000,
        bps in 0u32..=300,
    ) {
        let pool = Pool::new(Amount::new(c), Amount::new(a), Amount::new(c));
        let input = Amount::new(amount);
        let Ok(payout) = engine(bps).sell(ID, &pool, input) else {
            panic!("sell into live pool must price");
        };
        prop_assert!(payout < pool.currency_reserve());
        let Ok(next) = pool.after_sell(input, payout) else {
            panic!("transition failed");
        };
        prop_assert!(k(&next) >= k(&pool));
    }

    #[test]
    fn share_books_stay_balanced(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let h = harness();
        for name in HOLDERS {
            h.fund(name, 1_000_000, &[(1, 100_000), (2, 100_000)]);
        }
        for op in &ops {
            apply(&h, op);
            h.assert_books_balanced(1);
            h.assert_books_balanced(2);
            let reserves =
                h.pool(1).currency_reserve().get() + h.pool(2).currency_reserve().get();
            prop_assert_eq!(h.currency_of("exchange"), reserves);
        }
    }

    #[test]
    fn add_then_remove_loses_at_most_rounding(
        c in 1u128..1_000_000,
        a in 1u128..1_000_000,
        x in 1u128..1_000_000,
    ) {
        let h = harness();
        h.seed_pool("lp", 1, c, a);
        h.fund("lp2", u128::from(u64::MAX), &[(1, x)]);

        let Ok(added) = h.add("lp2", &[(1, x, u128::from(u64::MAX))]) else {
            // deposit too small to mint a share
            return Ok(());
        };
        let Some(deposit) = added.legs.first().copied() else {
            panic!("missing leg");
        };
        let Ok(removed) = h.remove("lp2", &[(1, deposit.shares.get(), 0, 0)]) else {
            panic!("removing freshly minted shares failed");
        };
        let Some(withdrawal) = removed.legs.first().copied() else {
            panic!("missing leg");
        };

        prop_assert!(withdrawal.currency_amount <= deposit.currency_amount);
        prop_assert!(withdrawal.asset_amount <= deposit.asset_amount);
        prop_assert!(deposit.currency_amount.get() - withdrawal.currency_amount.get() <= 1);
        prop_assert!(deposit.asset_amount.get() - withdrawal.asset_amount.get() <= a / c + 2);
        h.assert_books_balanced(1);
    }
}
