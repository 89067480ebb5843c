//! Chain source trait definitions

use async_trait::async_trait;
use crate::model::*;

/// Read-only view of a chain daemon.
///
/// Every call may block on the transport and none of them retry. Connection
/// or authentication failures surface as [`RpcError::SourceUnavailable`];
/// a transaction the daemon cannot produce surfaces as
/// [`RpcError::TransactionNotFound`].
#[async_trait]
pub trait ChainSource: Send + Sync {
    /// Height of the daemon's best block.
    async fn tip_height(&self) -> Result<u64, RpcError>;

    /// Hash of the block at `height` on the daemon's best chain.
    async fn hash_at(&self, height: u64) -> Result<Hash, RpcError>;

    /// Decoded block, transactions listed by id only.
    async fn block(&self, hash: &Hash) -> Result<RawBlock, RpcError>;

    /// Fully decoded transaction.
    async fn raw_tx(&self, txid: &Hash) -> Result<RawTx, RpcError>;
}
