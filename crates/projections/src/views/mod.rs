//! Projections over the merchant and transaction event streams.

pub mod merchant_aggregator;
pub mod merchant_balance;
pub mod subscription_streams;

pub use merchant_aggregator::MerchantAggregator;
pub use merchant_balance::{MerchantBalanceProjection, history_stream};
pub use subscription_streams::{EstateRoute, SubscriptionStreamBuilder};
