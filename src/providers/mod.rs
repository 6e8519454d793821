pub mod mock_aggregator;
pub mod rpc_feed;
pub mod util;

pub use mock_aggregator::MockV3Aggregator;
pub use rpc_feed::RpcPriceFeed;
