//! Typed reads of contract state through read-only calls.

use crate::{
    events::{event_type, MarketEvent, MARKET_EVENTS},
    ledger::Ledger,
    tx::{PureArg, TxBuilder},
    Result,
};
use futures::future::try_join_all;
use suu_types::{
    decode_asset, decode_balances, decode_listing, decode_optional_encounter,
    decode_u64, Address, AssetRecord, ContractBalances, DecodeError, EncounterRecord,
    ListingRecord,
};
use tracing::{debug, warn};

/// Largest page [Queries::market_listed_ids_paged] will fetch.
pub const MAX_PAGE_LIMIT: u64 = 200;

pub struct Queries<L> {
    ledger: L,
    builder: TxBuilder,
}

impl<L: Ledger> Queries<L> {
    pub fn new(ledger: L, builder: TxBuilder) -> Self {
        Self { ledger, builder }
    }

    async fn call(&self, function: &str, args: Vec<PureArg>) -> Result<Vec<Vec<u8>>> {
        let call = self.builder.inspect(function, args);
        let returns = self.ledger.query(&call).await?;
        debug!(function, returns = returns.len(), "read call");
        Ok(returns)
    }

    async fn single(&self, function: &str, args: Vec<PureArg>) -> Result<Vec<u8>> {
        let mut returns = self.call(function, args).await?;
        if returns.len() != 1 {
            return Err(DecodeError::ReturnCount {
                expected: 1,
                got: returns.len(),
            }
            .into());
        }
        Ok(returns.remove(0))
    }

    async fn u64(&self, function: &str, args: Vec<PureArg>) -> Result<u64> {
        Ok(decode_u64(&self.single(function, args).await?)?)
    }

    pub async fn asset(&self, id: u64) -> Result<AssetRecord> {
        let bytes = self.single("get_nft", vec![PureArg::U64(id)]).await?;
        Ok(decode_asset(id, &bytes)?)
    }

    pub async fn current_encounter(&self, id: u64) -> Result<Option<EncounterRecord>> {
        let bytes = self
            .single("get_nft_current_enemy", vec![PureArg::U64(id)])
            .await?;
        Ok(decode_optional_encounter(&bytes)?)
    }

    /// Earliest time (ms) at which a new encounter may be drawn for `id`.
    pub async fn next_encounter_time(&self, id: u64) -> Result<u64> {
        self.u64("get_next_enemy_random_time", vec![PureArg::U64(id)])
            .await
    }

    pub async fn owner_asset_count(&self, owner: Address) -> Result<u64> {
        self.u64("get_owner_nft_count", vec![PureArg::Address(owner)])
            .await
    }

    pub async fn owner_asset_ids(&self, owner: Address) -> Result<Vec<u64>> {
        let count = self.owner_asset_count(owner).await?;
        try_join_all((0..count).map(|index| {
            self.u64(
                "get_owner_nft_id_at",
                vec![PureArg::Address(owner), PureArg::U64(index)],
            )
        }))
        .await
    }

    /// The asset `owner` plays with, if one is set.
    pub async fn active_asset(&self, owner: Address) -> Result<Option<u64>> {
        let id = self
            .u64("get_active_nft", vec![PureArg::Address(owner)])
            .await?;
        Ok((id != 0).then_some(id))
    }

    pub async fn market_listed_count(&self) -> Result<u64> {
        self.u64("get_market_list_len", vec![]).await
    }

    async fn market_listed_id_at(&self, index: u64) -> Result<u64> {
        self.u64("get_market_list_id_at", vec![PureArg::U64(index)])
            .await
    }

    /// Listed asset ids in listing order.
    pub async fn market_listed_ids(&self) -> Result<Vec<u64>> {
        let count = self.market_listed_count().await?;
        try_join_all((0..count).map(|index| self.market_listed_id_at(index))).await
    }

    /// One page of listed asset ids, newest first. `page` is zero-based and `limit` is clamped to
    /// `1..=MAX_PAGE_LIMIT`.
    pub async fn market_listed_ids_paged(&self, limit: u64, page: u64) -> Result<Vec<u64>> {
        let count = self.market_listed_count().await?;
        let indices = page_indices(count, limit, page);
        try_join_all(indices.map(|index| self.market_listed_id_at(index))).await
    }

    pub async fn listing(&self, id: u64) -> Result<ListingRecord> {
        let returns = self
            .call("get_listing_info", vec![PureArg::U64(id)])
            .await?;
        Ok(decode_listing(&returns)?)
    }

    pub async fn contract_balances(&self) -> Result<ContractBalances> {
        let returns = self.call("get_contract_balances", vec![]).await?;
        Ok(decode_balances(&returns)?)
    }

    /// Latest mint and listing events, newest first. Reads at most `limit` events of each kind.
    pub async fn market_activity(&self, limit: usize) -> Result<Vec<MarketEvent>> {
        let package = self.builder.deployment().package;
        let mut activity = Vec::new();
        for name in MARKET_EVENTS {
            let page = self
                .ledger
                .query_events(&event_type(&package, name), None, limit, true)
                .await?;
            for event in &page.data {
                match MarketEvent::parse(event) {
                    Ok(Some(parsed)) => activity.push(parsed),
                    Ok(None) => {}
                    Err(err) => warn!(event = name, error = %err, "skipping malformed market event"),
                }
            }
        }
        activity.sort_by_key(|event| std::cmp::Reverse(event.timestamp()));
        activity.truncate(limit);
        Ok(activity)
    }
}

/// Indices of `page` over a list of `count` entries, highest index first.
fn page_indices(count: u64, limit: u64, page: u64) -> impl Iterator<Item = u64> {
    let limit = limit.clamp(1, MAX_PAGE_LIMIT);
    let end = count.saturating_sub(page.saturating_mul(limit));
    let start = end.saturating_sub(limit);
    (start..end).rev()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ledger::{Clock, Signer},
        mocks::{test_deployment, MockNetwork},
    };
    use std::sync::Arc;

    #[test]
    fn test_page_indices() {
        assert_eq!(page_indices(5, 2, 0).collect::<Vec<_>>(), vec![4, 3]);
        assert_eq!(page_indices(5, 2, 1).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(page_indices(5, 2, 2).collect::<Vec<_>>(), vec![0]);
        assert_eq!(page_indices(5, 2, 3).count(), 0);
        assert_eq!(page_indices(0, 20, 0).count(), 0);
        // zero limit behaves as one
        assert_eq!(page_indices(3, 0, 0).collect::<Vec<_>>(), vec![2]);
        assert_eq!(page_indices(1_000, 10_000, 0).count(), 200);
    }

    fn queries(network: &Arc<MockNetwork>) -> Queries<Arc<MockNetwork>> {
        Queries::new(network.clone(), TxBuilder::new(test_deployment()))
    }

    #[tokio::test]
    async fn test_asset_and_encounter() {
        let network = Arc::new(MockNetwork::new());
        let owner = Address::from_low_u64(0x1234);
        let id = network.mint(owner, 3, 1);
        network.set_encounter(id, 2, 4, false);

        let queries = queries(&network);
        let asset = queries.asset(id).await.unwrap();
        assert_eq!(asset.owner, owner);
        assert_eq!(asset.level, 3);
        assert!(!asset.has_active_commitment);
        let encounter = queries.current_encounter(id).await.unwrap().unwrap();
        assert_eq!((encounter.level, encounter.element), (2, 4));
        assert_eq!(asset.current_encounter, Some(encounter));
    }

    #[tokio::test]
    async fn test_owner_and_active_asset() {
        let network = Arc::new(MockNetwork::new());
        let owner = Address::from_low_u64(0x1234);
        let first = network.mint(owner, 1, 0);
        let second = network.mint(owner, 1, 2);
        network.mint(Address::from_low_u64(0x5678), 1, 3);

        let queries = queries(&network);
        assert_eq!(queries.owner_asset_ids(owner).await.unwrap(), vec![first, second]);
        assert_eq!(queries.active_asset(owner).await.unwrap(), None);
        network.set_active(owner, second);
        assert_eq!(queries.active_asset(owner).await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_market_reads() {
        let network = Arc::new(MockNetwork::new());
        let seller = Address::from_low_u64(0x77);
        let ids: Vec<u64> = (0..3).map(|_| network.mint(seller, 1, 0)).collect();
        for (offset, id) in ids.iter().enumerate() {
            network.list(*id, 1_000 + offset as u64, 10 + offset as u64);
        }

        let queries = queries(&network);
        assert_eq!(queries.market_listed_ids().await.unwrap(), ids);
        assert_eq!(
            queries.market_listed_ids_paged(2, 0).await.unwrap(),
            vec![ids[2], ids[1]]
        );
        let listing = queries.listing(ids[1]).await.unwrap();
        assert_eq!(listing.seller, seller);
        assert_eq!(listing.price, 1_001);
        assert_eq!(listing.listed_at, 11);
    }

    #[tokio::test]
    async fn test_market_activity() {
        let network = Arc::new(MockNetwork::new());
        let buyer = Address::from_low_u64(0x1234);
        let builder = TxBuilder::new(test_deployment());
        network.signer(buyer).submit(builder.purchase()).await.unwrap();
        let minted_at = network.clock().now_ms();
        let id = network.asset_ids_of(buyer)[0];
        network.list(id, 2_000, minted_at + 5);

        let activity = queries(&network).market_activity(10).await.unwrap();
        assert_eq!(
            activity,
            vec![
                MarketEvent::Listed {
                    subject: id,
                    seller: buyer,
                    price: 2_000,
                    timestamp: minted_at + 5,
                },
                MarketEvent::Minted {
                    subject: id,
                    owner: buyer,
                    timestamp: minted_at,
                },
            ]
        );
        assert_eq!(queries(&network).market_activity(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_balances() {
        let network = Arc::new(MockNetwork::new());
        network.set_balances(5, 9);
        let balances = queries(&network).contract_balances().await.unwrap();
        assert_eq!((balances.locked, balances.withdrawable), (5, 9));
    }

    #[tokio::test]
    async fn test_unknown_asset_is_query_error() {
        let network = Arc::new(MockNetwork::new());
        assert!(queries(&network).asset(404).await.is_err());
    }
}
