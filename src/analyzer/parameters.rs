//! Parameter extraction: a pure mapping from a snapshot to derived metrics.

use chrono::{DateTime, Utc};

use crate::analyzer::types::ParameterSet;
use crate::sources::SecurityAttributes;
use crate::types::Snapshot;

/// Derive the parameter set for `snapshot` as observed at `now`.
///
/// Zero denominators yield 0 rather than failing. Tokenomics fields are stubs
/// until [`enrich`] is applied.
pub fn extract(snapshot: &Snapshot, now: DateTime<Utc>) -> ParameterSet {
    ParameterSet {
        token_age_minutes: age_minutes(snapshot, now),
        initial_liquidity: snapshot.liquidity_usd,
        liquidity_mcap_ratio: ratio(snapshot.liquidity_usd, snapshot.fdv),
        chain: snapshot.chain_id.clone(),
        volume_h1: snapshot.volume_h1,
        buy_sell_ratio: buy_sell_ratio(snapshot.txns_h1_buys, snapshot.txns_h1_sells),
        vol_liq_ratio: ratio(snapshot.volume_h1, snapshot.liquidity_usd),
        price_change_h1: snapshot.price_change_h1,
        tx_count: snapshot.txns_h1_buys + snapshot.txns_h1_sells,

        mint_disabled: true,
        lp_locked: false,
        is_proxy: false,
        renounced: false,
        buy_tax_pct: 0.0,
        sell_tax_pct: 0.0,
        top10_share_pct: 50.0,
        owner_balance: 0.0,
        holder_count: 0,
        whale_data_available: false,
    }
}

/// Replace tokenomics stubs with security-oracle data where it is present.
pub fn enrich(params: &mut ParameterSet, security: &SecurityAttributes, lp_locked: bool, whale_data: bool) {
    if let Some(mintable) = security.mintable {
        params.mint_disabled = !mintable;
    }
    if let Some(proxy) = security.proxy {
        params.is_proxy = proxy;
    }
    if let Some(renounced) = security.is_renounced() {
        params.renounced = renounced;
    }
    if let Some(tax) = security.buy_tax {
        params.buy_tax_pct = tax * 100.0;
    }
    if let Some(tax) = security.sell_tax {
        params.sell_tax_pct = tax * 100.0;
    }
    if !security.holders.is_empty() {
        params.top10_share_pct = security.top10_share() * 100.0;
    }
    if let Some(owner) = security.owner_percent {
        params.owner_balance = owner;
    }
    if let Some(count) = security.holder_count {
        params.holder_count = count;
    }
    params.lp_locked = lp_locked;
    params.whale_data_available = whale_data;
}

fn age_minutes(snapshot: &Snapshot, now: DateTime<Utc>) -> f64 {
    let elapsed_ms = (now - snapshot.pair_created_at).num_milliseconds();
    (elapsed_ms as f64 / 60_000.0).max(0.0)
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Buys per sell; with no sells the raw buy count stands in for the ratio.
fn buy_sell_ratio(buys: u64, sells: u64) -> f64 {
    if sells == 0 {
        buys as f64
    } else {
        buys as f64 / sells as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::HolderEntry;
    use crate::types::fixtures::snapshot;
    use chrono::Duration;

    #[test]
    fn test_extract_basic_ratios() {
        let snap = snapshot("0xpair", 1.0);
        let params = extract(&snap, Utc::now());

        assert!((params.liquidity_mcap_ratio - 0.1).abs() < 1e-9);
        assert!((params.vol_liq_ratio - 1.5).abs() < 1e-9);
        assert!((params.buy_sell_ratio - 2.5).abs() < 1e-9);
        assert_eq!(params.tx_count, 420);
        assert!((params.token_age_minutes - 60.0).abs() < 0.1);
        assert!(params.mint_disabled);
        assert_eq!(params.top10_share_pct, 50.0);
    }

    #[test]
    fn test_zero_denominators_yield_zero() {
        let mut snap = snapshot("0xpair", 1.0);
        snap.fdv = 0.0;
        snap.liquidity_usd = 0.0;
        snap.txns_h1_buys = 0;
        snap.txns_h1_sells = 0;

        let params = extract(&snap, Utc::now());
        assert_eq!(params.liquidity_mcap_ratio, 0.0);
        assert_eq!(params.vol_liq_ratio, 0.0);
        assert_eq!(params.buy_sell_ratio, 0.0);
    }

    #[test]
    fn test_no_sells_uses_buy_count() {
        let mut snap = snapshot("0xpair", 1.0);
        snap.txns_h1_buys = 7;
        snap.txns_h1_sells = 0;
        assert_eq!(extract(&snap, Utc::now()).buy_sell_ratio, 7.0);
    }

    #[test]
    fn test_future_creation_clamps_age() {
        let mut snap = snapshot("0xpair", 1.0);
        snap.pair_created_at = Utc::now() + Duration::minutes(10);
        assert_eq!(extract(&snap, Utc::now()).token_age_minutes, 0.0);
    }

    #[test]
    fn test_enrich_overrides_stubs() {
        let snap = snapshot("0xpair", 1.0);
        let mut params = extract(&snap, Utc::now());
        let security = SecurityAttributes {
            mintable: Some(true),
            buy_tax: Some(0.05),
            holder_count: Some(250),
            holders: vec![HolderEntry { address: "0xa".into(), percent: 0.2, is_locked: false }],
            ..Default::default()
        };

        enrich(&mut params, &security, true, true);

        assert!(!params.mint_disabled);
        assert!((params.buy_tax_pct - 5.0).abs() < 1e-9);
        assert!((params.top10_share_pct - 20.0).abs() < 1e-9);
        assert_eq!(params.holder_count, 250);
        assert!(params.lp_locked);
        assert!(params.whale_data_available);
        // Untouched fields keep their stub values
        assert_eq!(params.sell_tax_pct, 0.0);
        assert!(!params.renounced);
    }
}
