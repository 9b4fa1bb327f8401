use std::io::Write;

use crowdsale_node::{config, Runner};
use tiered_crowdsale::{parse_units, Address, Phase};

const ADMIN: &str = "0x0101010101010101010101010101010101010101";
const TREASURY: &str = "0x0202020202020202020202020202020202020202";
const AGENT: &str = "0x0303030303030303030303030303030303030303";
const ALICE: &str = "0x0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a";
const BOB: &str = "0x0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b";

const START: u64 = 1_700_000_000;
const END: u64 = START + 10 * 86_400;

fn runner() -> Runner {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
[sale]
administrator = "{ADMIN}"
treasury = "{TREASURY}"
bonus_agent = "{AGENT}"
start_time = {START}
duration = "10days"
"#
    )
    .unwrap();
    let cfg = config::load(Some(file.path())).unwrap();
    Runner::new(cfg.sale.into_sale_config().unwrap()).unwrap()
}

fn script() -> String {
    let lines = [
        format!(r#"{{"op":"fund","account":"{ALICE}","amount":"5000"}}"#),
        format!(r#"{{"op":"contribute","now":{},"caller":"{ALICE}","amount":"10"}}"#, START - 1),
        format!(r#"{{"op":"contribute","now":{START},"caller":"{ALICE}","amount":"10"}}"#),
        format!(r#"{{"op":"contribute","caller":"{ALICE}","beneficiary":"{BOB}","amount":"4500"}}"#),
        format!(r#"{{"op":"bonus_mint","caller":"{AGENT}","beneficiary":"{AGENT}","tokens":"100"}}"#),
        format!(r#"{{"op":"transfer","caller":"{ALICE}","to":"{BOB}","amount":"1"}}"#),
        format!(r#"{{"op":"finish","now":{END},"caller":"{ADMIN}"}}"#),
        format!(r#"{{"op":"transfer","caller":"{ALICE}","to":"{BOB}","amount":"1"}}"#),
    ];
    lines.join("\n")
}

#[test]
fn replays_a_whole_sale() {
    let runner = runner();
    let outcomes = runner.run(&script()).unwrap();
    let ok: Vec<bool> = outcomes.iter().map(|o| o.ok).collect();
    assert_eq!(ok, vec![true, false, true, true, true, false, true, true]);

    assert!(outcomes[1].error.as_deref().unwrap_or_default().contains("not permitted"));
    assert!(outcomes[5].error.as_deref().unwrap_or_default().contains("locked"));

    // 10 + 4401.76 accepted; the rest of the 4500 came back.
    let refund = outcomes[3].receipt.as_ref().unwrap().refund;
    assert_eq!(refund, parse_units("98.24").unwrap());

    let summary = runner.summary();
    assert_eq!(summary.phase, Phase::Finalized);
    assert!(summary.minting_finished);
    assert_eq!(summary.total_raised, "4411.76");
    assert_eq!(summary.forwarded, "4411.76");
    assert_eq!(summary.treasury_currency, "4411.76");
    assert_eq!(summary.bonus_available, "0");

    let alice: Address = ALICE.parse().unwrap();
    assert_eq!(runner.bank().balance(&alice), parse_units("588.24").unwrap());
}

#[test]
fn bad_amount_aborts_with_line_number() {
    let runner = runner();
    let text = format!(r#"{{"op":"fund","account":"{ALICE}","amount":"1.2.3"}}"#);
    let err = runner.run(&text).unwrap_err();
    assert!(err.to_string().starts_with("line 1:"));
}
