use coinbal_core::{Amount, Ledger, LedgerError, MemoryStore, Token, TokenType, Transfer};
use proptest::prelude::*;

const WALLETS: [&str; 4] = ["w0", "w1", "w2", "w3"];

#[derive(Clone, Debug)]
enum Op {
    Transfer { from: usize, to: usize, units: u64 },
    Batch(Vec<(usize, usize, u64)>),
    Mint { to: usize, units: u64 },
    Burn { from: usize, units: u64 },
}

fn op() -> impl Strategy<Value = Op> {
    let idx = 0..WALLETS.len();
    let units = 0u64..5_000_000_000;
    prop_oneof![
        (idx.clone(), idx.clone(), units.clone())
            .prop_map(|(from, to, units)| Op::Transfer { from, to, units }),
        prop::collection::vec((idx.clone(), idx.clone(), units.clone()), 1..5).prop_map(Op::Batch),
        (idx.clone(), units.clone()).prop_map(|(to, units)| Op::Mint { to, units }),
        (idx, units).prop_map(|(from, units)| Op::Burn { from, units }),
    ]
}

fn request(from: usize, to: usize, units: u64) -> Transfer {
    Transfer {
        kind: String::new(),
        token: "TOK".into(),
        from: WALLETS[from].into(),
        to: WALLETS[to].into(),
        avoid_check_to: false,
        avoid_check_from: false,
        amount: Amount::from_units(units),
        id: format!("{from}-{to}-{units}"),
        date: 0,
    }
}

fn apply(store: &MemoryStore, op: &Op) -> Result<(), LedgerError> {
    let mut tx = store.begin();
    {
        let mut ledger = Ledger::new(&mut tx);
        match op {
            Op::Transfer { from, to, units } => {
                ledger.transfer(request(*from, *to, *units))?;
            }
            Op::Batch(entries) => {
                let batch = entries.iter().map(|(f, t, u)| request(*f, *t, *u)).collect();
                ledger.multitransfer(batch)?;
            }
            Op::Mint { to, units } => {
                ledger.mint(request(0, *to, *units))?;
            }
            Op::Burn { from, units } => {
                ledger.burn(request(*from, 0, *units))?;
            }
        }
    }
    tx.commit()?;
    Ok(())
}

proptest! {
    #[test]
    fn supply_always_equals_circulating(ops in prop::collection::vec(op(), 1..30)) {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin();
            let mut ledger = Ledger::new(&mut tx);
            for wallet in WALLETS {
                ledger.register_address(wallet).unwrap();
            }
            let token = Token {
                name: "Prop".into(),
                token_type: TokenType::Crypto,
                symbol: "TOK".into(),
                supply: Amount::whole(100),
                lock_up_date: 0,
            };
            ledger.register_token(token, WALLETS[0]).unwrap();
            drop(ledger);
            tx.commit().unwrap();
        }

        for op in &ops {
            // Rejections are expected (overdrafts, self-transfers); they must not leak writes.
            let _ = apply(&store, op);

            let mut tx = store.begin();
            let ledger = Ledger::new(&mut tx);
            let supply = ledger.get_token("TOK").unwrap().supply;
            let total = ledger
                .balances_of_token("TOK")
                .unwrap()
                .iter()
                .map(|b| b.amount.units())
                .sum::<u64>();
            prop_assert_eq!(supply.units(), total);
        }
    }
}
