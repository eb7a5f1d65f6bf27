use anyhow::{anyhow, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use sha2::{Digest, Sha256};
use std::io::{Cursor, Read};

use crate::models::market_model::MarketState;
use crate::utils::tick_math::U256;

// Market account blobs start with an 8 byte tag derived from the account
// name, so a response for the wrong account type fails loudly instead of
// decoding into garbage.
pub fn compute_account_tag(name: &str) -> [u8; 8] {
    let mut hasher = Sha256::new();
    hasher.update("account:".as_bytes());
    hasher.update(name.as_bytes());
    let result = hasher.finalize();
    let mut tag = [0u8; 8];
    tag.copy_from_slice(&result[..8]);
    tag
}

pub fn read_address(rdr: &mut Cursor<&[u8]>) -> Result<String> {
    let mut buf = [0u8; 20];
    rdr.read_exact(&mut buf)?;
    Ok(format!("0x{}", hex::encode(buf)))
}

pub fn decode_market_state(data: &[u8]) -> Result<MarketState> {
    let mut rdr = Cursor::new(data);

    let expected_tag = compute_account_tag("MarketState");
    let mut actual_tag = [0u8; 8];
    rdr.read_exact(&mut actual_tag)?;
    if actual_tag != expected_tag {
        return Err(anyhow!("Invalid market account tag"));
    }

    Ok(MarketState {
        debt_token: read_address(&mut rdr)?,
        collateral_token: read_address(&mut rdr)?,
        tick_spacing: rdr.read_i32::<LittleEndian>()?,
        paused: rdr.read_u8()? != 0,
    })
}

// RPC quantities arrive as 0x-prefixed big-endian hex of arbitrary width.
pub fn parse_hex_u256(text: &str) -> Result<U256> {
    let stripped = text.strip_prefix("0x").unwrap_or(text);
    if stripped.is_empty() {
        return Err(anyhow!("Empty hex quantity"));
    }
    let padded = if stripped.len() % 2 == 1 {
        format!("0{}", stripped)
    } else {
        stripped.to_string()
    };
    let bytes = hex::decode(&padded)?;
    if bytes.len() > 32 {
        return Err(anyhow!("Hex quantity wider than 256 bits: {}", text));
    }
    Ok(U256::from_big_endian(&bytes))
}
