use tiered_crowdsale::{
    parse_units, Action, Address, Balance, Crowdsale, Payment, Phase, SaleConfig, SaleError, SaleEvent, UNIT,
};

const START: u64 = 1_600_000_000;

fn addr(x: u8) -> Address {
    Address([x; 20])
}

fn units(s: &str) -> Balance {
    parse_units(s).unwrap()
}

struct Actors {
    admin: Address,
    treasury: Address,
    agent: Address,
}

fn actors() -> Actors {
    Actors { admin: addr(0xA1), treasury: addr(0x7E), agent: addr(0xB0) }
}

fn held(sale: &Crowdsale, holders: &[Address]) -> Balance {
    holders.iter().map(|h| sale.balance_of(h)).sum()
}

#[test]
fn full_sale_from_pending_to_unlocked_transfers() {
    let a = actors();
    let mut sale = Crowdsale::new(SaleConfig::reference(a.admin, a.treasury, a.agent, START)).unwrap();
    let buyers: Vec<Address> = (1..=4).map(addr).collect();

    // Pending: postpone by one day.
    assert_eq!(sale.phase(START - 100), Phase::Pending);
    sale.set_start_time(a.admin, START + 86_400, START - 100).unwrap();
    let open = sale.window().start;
    assert_eq!(
        sale.contribute(buyers[0], buyers[0], units("1"), open - 1),
        Err(SaleError::Phase { action: Action::Contribute, phase: Phase::Pending })
    );

    // Running: walk every tier.
    let mut forwarded: Balance = 0;
    for (i, amount) in ["400", "900", "1600", "1000"].iter().enumerate() {
        let r = sale.contribute(buyers[i], buyers[i], units(amount), open + i as u64).unwrap();
        assert_eq!(r.refund, 0);
        forwarded += r.accepted;
    }
    assert!(sale.is_running(open + 10));

    let manual = sale.manual_mint(a.admin, buyers[0], units("50000"), open + 10).unwrap();
    assert!(manual.booked > 0);

    // The last buyer overshoots the cap and gets the odd amount back.
    let last = sale.contribute(buyers[3], buyers[3], units("1000"), open + 20).unwrap();
    forwarded += last.accepted;
    assert!(last.refund > 0);
    assert_eq!(last.effects.last(), Some(&Payment::Refund { to: buyers[3], amount: last.refund }));
    assert_eq!(sale.total_raised(), sale.cap_in_currency());
    assert_eq!(sale.phase(open + 21), Phase::Ended);
    assert_eq!(sale.forwarded(), forwarded);
    assert_eq!(forwarded + manual.booked, sale.cap_in_currency());

    // Bonus agent pays out part of the budget and moves tokens while locked.
    let sold = sale.state().sale_tokens;
    assert_eq!(sale.bonus_total_supply(), sold / 5);
    sale.bonus_mint(a.agent, a.agent, units("1000")).unwrap();
    sale.transfer(a.agent, buyers[1], units("400")).unwrap();
    assert_eq!(sale.transfer(buyers[1], buyers[2], 1), Err(SaleError::TransferLocked));

    // Cap reached, so the admin can finalize before the end time.
    let events = sale.finish_crowdsale(a.admin, open + 30).unwrap();
    let swept = sale.bonus_total_supply() - units("1000");
    assert_eq!(sale.balance_of(&a.treasury), swept);
    assert!(matches!(events.last(), Some(SaleEvent::Finalized { swept_bonus, .. }) if *swept_bonus == swept));
    assert_eq!(sale.total_supply(), sold + sold / 5);
    assert!(sale.total_supply() <= sale.hard_cap_in_tokens());

    let mut everyone = buyers.clone();
    everyone.extend([a.treasury, a.agent]);
    assert_eq!(held(&sale, &everyone), sale.total_supply());

    // Finalized is terminal: transfers open, minting closed.
    assert_eq!(sale.phase(open), Phase::Finalized);
    sale.transfer(buyers[1], buyers[2], units("1")).unwrap();
    assert!(matches!(sale.bonus_mint(a.agent, a.agent, 1), Err(SaleError::InsufficientBonusBudget { .. })));
    assert_eq!(sale.finish_crowdsale(a.admin, open + 40), Err(SaleError::AlreadyFinished));
    assert!(matches!(
        sale.contribute(buyers[0], buyers[0], units("1"), open + 40),
        Err(SaleError::Phase { phase: Phase::Finalized, .. })
    ));
}

#[test]
fn unsold_sale_finishes_after_end_time() {
    let a = actors();
    let mut sale = Crowdsale::new(SaleConfig::reference(a.admin, a.treasury, a.agent, START)).unwrap();
    let buyer = addr(9);

    let r = sale.contribute(buyer, buyer, 10 * UNIT, START).unwrap();
    let end = sale.window().end;
    assert_eq!(sale.finish_crowdsale(a.admin, end - 1), Err(SaleError::NotReady));
    sale.finish_crowdsale(a.admin, end).unwrap();

    // The whole bonus ends up with the treasury.
    assert_eq!(sale.balance_of(&a.treasury), r.tokens / 5);
    assert_eq!(sale.bonus_available(), 0);
}

#[test]
fn event_log_mirrors_receipts() {
    let a = actors();
    let mut sale = Crowdsale::new(SaleConfig::reference(a.admin, a.treasury, a.agent, START)).unwrap();
    let buyer = addr(9);

    let r = sale.contribute(buyer, addr(10), units("5000"), START).unwrap();
    let logged: Vec<SaleEvent> = sale.events().iter().map(|rec| rec.event.clone()).collect();
    assert_eq!(logged, r.events);
    assert_eq!(
        logged,
        vec![
            SaleEvent::Transfer { from: None, to: addr(10), amount: r.tokens },
            SaleEvent::Purchase { payer: buyer, beneficiary: addr(10), accepted: r.accepted, tokens: r.tokens },
            SaleEvent::OddAmountRefunded { to: buyer, amount: units("588.24") },
        ]
    );
    assert!(sale.events().iter().enumerate().all(|(i, rec)| rec.seq == i as u64));
}
