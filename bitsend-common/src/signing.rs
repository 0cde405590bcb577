//! Identity derivation and input signing
//!
//! [`Identity`] turns a WIF secret into the P2WPKH address and public key that fund
//! a transfer. [`TransactionSigner`] is the seam the assembler signs through;
//! [`WifSigner`] implements it with secp256k1 ECDSA over the BIP143 sighash.
//!
//! # Security Considerations
//!
//! - Private keys live only inside [`Identity`] and are never logged or serialized
//! - The `Debug` output of [`Identity`] omits the key
//! - Every input is signed with `SIGHASH_ALL`

use crate::error::{TransferError, TransferResult};
use crate::types::{NewWallet, SensitiveString};
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{All, Message, Secp256k1};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::{Address, Network, PrivateKey, PublicKey, ScriptBuf, Transaction, Witness};

/// Spending identity derived from a WIF secret
pub struct Identity {
    private_key: PrivateKey,
    public_key: PublicKey,
    address: Address,
    network: Network,
}

impl Identity {
    /// Derive the identity for `network` from a WIF secret
    ///
    /// # Returns
    /// `InvalidInput` if the secret is malformed, uncompressed, or encoded for a
    /// different network
    pub fn from_wif(wif: &SensitiveString, network: Network) -> TransferResult<Self> {
        let private_key = PrivateKey::from_wif(wif.expose_secret().trim())?;
        if is_mainnet(private_key.network) != is_mainnet(network) {
            return Err(TransferError::invalid_input(format!(
                "Private key is not valid for {}",
                network
            )));
        }
        Self::from_private_key(PrivateKey {
            network,
            ..private_key
        })
    }

    /// Generate a fresh random identity
    pub fn generate(network: Network) -> TransferResult<Self> {
        let secp = Secp256k1::new();
        let (secret_key, _) = secp.generate_keypair(&mut bitcoin::secp256k1::rand::thread_rng());
        Self::from_private_key(PrivateKey::new(secret_key, network))
    }

    fn from_private_key(private_key: PrivateKey) -> TransferResult<Self> {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_private_key(&secp, &private_key);
        let address = Address::p2wpkh(&public_key, private_key.network)?;
        Ok(Self {
            private_key,
            public_key,
            address,
            network: private_key.network,
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Output script paying this identity, used for change
    pub fn script_pubkey(&self) -> ScriptBuf {
        self.address.script_pubkey()
    }

    /// Signer bound to this identity's key
    pub fn signer(&self) -> WifSigner<'_> {
        WifSigner::new(self)
    }

    /// Export as a [`NewWallet`]; the WIF is wrapped so it is wiped on drop
    pub fn to_new_wallet(&self) -> NewWallet {
        NewWallet {
            address: self.address.to_string(),
            wif: SensitiveString::new(self.private_key.to_wif()),
            public_key: self.public_key.to_string(),
            network: self.network,
        }
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("address", &self.address.to_string())
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

// WIF only distinguishes mainnet from the test networks
fn is_mainnet(network: Network) -> bool {
    network == Network::Bitcoin
}

/// Produces the witness for one input of a transaction
pub trait TransactionSigner {
    /// Sign input `index` of `tx`, which spends an output worth `prevout_value` sats
    fn sign_input(
        &self,
        tx: &Transaction,
        index: usize,
        prevout_value: u64,
    ) -> TransferResult<Witness>;
}

/// ECDSA signer for P2WPKH inputs owned by an [`Identity`]
pub struct WifSigner<'a> {
    identity: &'a Identity,
    secp: Secp256k1<All>,
}

impl<'a> WifSigner<'a> {
    pub fn new(identity: &'a Identity) -> Self {
        Self {
            identity,
            secp: Secp256k1::new(),
        }
    }
}

impl TransactionSigner for WifSigner<'_> {
    fn sign_input(
        &self,
        tx: &Transaction,
        index: usize,
        prevout_value: u64,
    ) -> TransferResult<Witness> {
        let script_code = ScriptBuf::new_p2pkh(&self.identity.public_key.pubkey_hash());
        let sighash = SighashCache::new(tx).segwit_signature_hash(
            index,
            &script_code,
            prevout_value,
            EcdsaSighashType::All,
        )?;
        let message = Message::from_slice(&sighash.to_byte_array())?;
        let signature = self
            .secp
            .sign_ecdsa(&message, &self.identity.private_key.inner);

        let mut sig_bytes = signature.serialize_der().to_vec();
        sig_bytes.push(EcdsaSighashType::All.to_u32() as u8);

        let mut witness = Witness::new();
        witness.push(sig_bytes);
        witness.push(self.identity.public_key.to_bytes());
        Ok(witness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TESTNET_WIF: &str = "cVt4o7BGAig1UXywgGSmARhxMdzP5qvQsxKkSsc1XEkw3tDTQFpy";

    #[test]
    fn derives_testnet_p2wpkh_address() {
        let identity = Identity::from_wif(&TESTNET_WIF.into(), Network::Testnet).unwrap();
        assert!(identity.address().to_string().starts_with("tb1q"));
        assert_eq!(identity.public_key().to_bytes().len(), 33);
    }

    #[test]
    fn rejects_key_for_wrong_network() {
        let err = Identity::from_wif(&TESTNET_WIF.into(), Network::Bitcoin).unwrap_err();
        assert!(matches!(err, TransferError::InvalidInput(_)));
    }

    #[test]
    fn rejects_malformed_wif() {
        let err = Identity::from_wif(&"not-a-key".into(), Network::Testnet).unwrap_err();
        assert!(matches!(err, TransferError::InvalidInput(_)));
    }

    #[test]
    fn debug_output_hides_key() {
        let identity = Identity::from_wif(&TESTNET_WIF.into(), Network::Testnet).unwrap();
        assert!(!format!("{:?}", identity).contains(TESTNET_WIF));
    }

    #[test]
    fn generated_wallet_round_trips_through_wif() {
        let identity = Identity::generate(Network::Signet).unwrap();
        let wallet = identity.to_new_wallet();
        let restored = Identity::from_wif(&wallet.wif, Network::Signet).unwrap();
        assert_eq!(restored.address(), identity.address());
    }
}
