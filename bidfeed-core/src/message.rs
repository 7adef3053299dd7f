use serde::{Deserialize, Serialize};

/// Logical timestamp marking all data up to and including it as final.
/// Values observed within one stream session are non-decreasing.
pub type Watermark = u64;

/// A confirmed auction outcome, pushed downstream once a progress marker
/// covers it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinningBid {
    pub auction_id: i64,
    pub bid_id: i64,
    pub item: String,
    pub amount: i64,
}

/// One record of a subscribe feed.
///
/// Data rows belong to the interval closed by the next progress marker and
/// must not be considered final until that marker arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawRecord {
    Data(WinningBid),
    Progress { watermark: Watermark },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn winning_bid_json_shape() {
        let bid = WinningBid {
            auction_id: 7,
            bid_id: 42,
            item: "Gift Basket".to_string(),
            amount: 325,
        };

        let json = serde_json::to_value(&bid).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "auction_id": 7,
                "bid_id": 42,
                "item": "Gift Basket",
                "amount": 325,
            })
        );
    }
}
