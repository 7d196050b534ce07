//! Id minting and quantity rounding helpers

use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique uuid7 then encode using bech32 with a readable prefix
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Round a length quantity to two decimal places. Every adjustment on a
/// length-denominated ledger passes through this so repeated fractional
/// debits don't accumulate float noise.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Short display reference for an id, used in notification messages.
pub fn short_ref(id: &str) -> &str {
    let n = id.len();
    if n <= 4 { id } else { &id[n - 4..] }
}
