// All service modules
pub mod inventory;
pub mod onchain;
pub mod pinning;
pub mod realtime;
pub mod transaction;

// Re-export for convenience
pub use inventory::Inventory;
pub use onchain::{ChainClient, ContractCall, EvmChain};
pub use pinning::{HttpPinning, PinningService};
pub use realtime::{SessionHub, SharedKeyValueChannel, SyncMessage, SyncOp};
pub use transaction::{FeeSource, TransactionEnvelope};
