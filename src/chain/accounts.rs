use crate::core::Address;
use sha2::{Digest, Sha256};

/// Derives a 20-byte hex address from `seed`.
pub fn derive_address(seed: &[u8]) -> Address {
    let digest = Sha256::digest(seed);
    format!("0x{}", hex::encode(&digest[12..]))
}

/// Address of the `index`-th local signer.
pub fn account_address(index: usize) -> Address {
    derive_address(format!("fundme/account/{index}").as_bytes())
}

/// Address of the contract `deployer` creates with its `nonce`-th deployment.
pub fn contract_address(deployer: &Address, nonce: u64) -> Address {
    derive_address(format!("fundme/contract/{}/{nonce}", deployer.to_lowercase()).as_bytes())
}
