pub mod mfapi_provider;
pub mod util;

use crate::core::{PriceProvider, PriceResult};
use anyhow::Result;
use futures::future::join_all;
use std::collections::HashMap;

/// Fetches the price of every scheme concurrently.
///
/// `on_done` runs once per completed fetch, whatever its outcome.
pub async fn fetch_prices(
    provider: &dyn PriceProvider,
    scheme_codes: &[u32],
    on_done: &(dyn Fn() + Sync),
) -> HashMap<u32, Result<PriceResult>> {
    let futures = scheme_codes.iter().map(|&code| async move {
        let result = provider.fetch_price(code).await;
        on_done();
        (code, result)
    });
    join_all(futures).await.into_iter().collect()
}
