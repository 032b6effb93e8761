//! Binary layouts of Raydium pool accounts and the price formulas for each.
//!
//! Pools are selected by the account's owning program:
//! - concentrated liquidity (CLMM): price from `sqrt_price_x64`
//! - constant product (CPMM) and standard AMM v4: price from vault reserves
//!   net of amounts the pool owes elsewhere

use crate::domain::{Address, Decimal};
use rust_decimal::Decimal as RustDecimal;
use thiserror::Error;

pub const RAYDIUM_CLMM_PROGRAM: &str = "CAMMCzo5YL8w4VFF8KVHrK22GGUsp5VTaW7grrKgrWqK";
pub const RAYDIUM_CPMM_PROGRAM: &str = "CPMMoo8L3F4NbTegBCKVNunggL7H1ZpdTHKxQB5qKP1C";
pub const RAYDIUM_AMM_V4_PROGRAM: &str = "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8";

// CLMM PoolState offsets (after the 8-byte discriminator and bump).
const CLMM_MINT_0: usize = 73;
const CLMM_MINT_1: usize = 105;
const CLMM_DECIMALS_0: usize = 233;
const CLMM_DECIMALS_1: usize = 234;
const CLMM_SQRT_PRICE: usize = 253;
const CLMM_MIN_LEN: usize = CLMM_SQRT_PRICE + 16;

// CPMM PoolState offsets.
const CPMM_VAULT_0: usize = 72;
const CPMM_VAULT_1: usize = 104;
const CPMM_MINT_0: usize = 168;
const CPMM_MINT_1: usize = 200;
const CPMM_DECIMALS_0: usize = 331;
const CPMM_DECIMALS_1: usize = 332;
const CPMM_PROTOCOL_FEES_0: usize = 341;
const CPMM_PROTOCOL_FEES_1: usize = 349;
const CPMM_FUND_FEES_0: usize = 357;
const CPMM_FUND_FEES_1: usize = 365;
const CPMM_MIN_LEN: usize = CPMM_FUND_FEES_1 + 8;

// AMM v4 LiquidityStateV4 offsets (u64 fields, no discriminator).
const AMM_BASE_DECIMALS: usize = 32;
const AMM_QUOTE_DECIMALS: usize = 40;
const AMM_BASE_NEED_TAKE_PNL: usize = 192;
const AMM_QUOTE_NEED_TAKE_PNL: usize = 200;
const AMM_BASE_VAULT: usize = 336;
const AMM_QUOTE_VAULT: usize = 368;
const AMM_BASE_MINT: usize = 400;
const AMM_QUOTE_MINT: usize = 432;
const AMM_LEN: usize = 752;

// SPL token account: mint(32) owner(32) amount(u64).
const TOKEN_ACCOUNT_AMOUNT: usize = 64;

/// Fixed-point denominator of `sqrt_price_x64`.
const Q64: i128 = 1 << 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolDecodeError {
    #[error("invalid data length: expected at least {expected}, got {actual}")]
    InvalidDataLength { expected: usize, actual: usize },
    #[error("unsupported pool owner program: {0}")]
    UnsupportedProgram(String),
    #[error("pool does not contain mint {0}")]
    MintNotInPool(String),
    #[error("price math overflow")]
    Overflow,
    #[error("pool has no liquidity")]
    EmptyPool,
}

/// Pool shape, selected by owning program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    ConcentratedLiquidity,
    ConstantProduct,
    StandardAmm,
}

impl PoolKind {
    pub fn from_owner(owner: &str) -> Result<Self, PoolDecodeError> {
        match owner {
            RAYDIUM_CLMM_PROGRAM => Ok(PoolKind::ConcentratedLiquidity),
            RAYDIUM_CPMM_PROGRAM => Ok(PoolKind::ConstantProduct),
            RAYDIUM_AMM_V4_PROGRAM => Ok(PoolKind::StandardAmm),
            other => Err(PoolDecodeError::UnsupportedProgram(other.to_string())),
        }
    }
}

/// Decoded concentrated-liquidity pool state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClmmPool {
    pub mint_0: Address,
    pub mint_1: Address,
    pub decimals_0: u8,
    pub decimals_1: u8,
    pub sqrt_price_x64: u128,
}

impl ClmmPool {
    pub fn decode(data: &[u8]) -> Result<Self, PoolDecodeError> {
        check_len(data, CLMM_MIN_LEN)?;
        Ok(Self {
            mint_0: read_key(data, CLMM_MINT_0)?,
            mint_1: read_key(data, CLMM_MINT_1)?,
            decimals_0: data[CLMM_DECIMALS_0],
            decimals_1: data[CLMM_DECIMALS_1],
            sqrt_price_x64: read_u128(data, CLMM_SQRT_PRICE)?,
        })
    }

    /// Price of mint_1 per mint_0 in display units:
    /// `(sqrt_price_x64 / 2^64)^2 * 10^(decimals_0 - decimals_1)`.
    pub fn price_1_per_0(&self) -> Result<Decimal, PoolDecodeError> {
        if self.sqrt_price_x64 == 0 {
            return Err(PoolDecodeError::EmptyPool);
        }
        let raw = RustDecimal::try_from_i128_with_scale(self.sqrt_price_x64 as i128, 0)
            .map_err(|_| PoolDecodeError::Overflow)?;
        let q64 = RustDecimal::try_from_i128_with_scale(Q64, 0)
            .map_err(|_| PoolDecodeError::Overflow)?;
        let sqrt = raw.checked_div(q64).ok_or(PoolDecodeError::Overflow)?;
        let price = sqrt.checked_mul(sqrt).ok_or(PoolDecodeError::Overflow)?;
        scale_by_decimals(price, self.decimals_0, self.decimals_1)
    }

    pub fn price_of(&self, mint: &Address) -> Result<Decimal, PoolDecodeError> {
        orient(self.price_1_per_0()?, mint, &self.mint_0, &self.mint_1)
    }
}

/// Decoded reserve-based pool state (CPMM or AMM v4). Reserves live in
/// separate vault accounts and are supplied through [`VaultPool::price_of`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultPool {
    pub vault_0: Address,
    pub vault_1: Address,
    pub mint_0: Address,
    pub mint_1: Address,
    pub decimals_0: u8,
    pub decimals_1: u8,
    /// Held in vault_0 but owed elsewhere (fees, pending PnL); not reserve.
    pub pending_0: u64,
    pub pending_1: u64,
}

impl VaultPool {
    pub fn decode(kind: PoolKind, data: &[u8]) -> Result<Self, PoolDecodeError> {
        match kind {
            PoolKind::ConstantProduct => Self::decode_cpmm(data),
            PoolKind::StandardAmm => Self::decode_amm_v4(data),
            PoolKind::ConcentratedLiquidity => Err(PoolDecodeError::UnsupportedProgram(
                RAYDIUM_CLMM_PROGRAM.to_string(),
            )),
        }
    }

    pub fn decode_cpmm(data: &[u8]) -> Result<Self, PoolDecodeError> {
        check_len(data, CPMM_MIN_LEN)?;
        let pending_0 = read_u64(data, CPMM_PROTOCOL_FEES_0)?
            .saturating_add(read_u64(data, CPMM_FUND_FEES_0)?);
        let pending_1 = read_u64(data, CPMM_PROTOCOL_FEES_1)?
            .saturating_add(read_u64(data, CPMM_FUND_FEES_1)?);
        Ok(Self {
            vault_0: read_key(data, CPMM_VAULT_0)?,
            vault_1: read_key(data, CPMM_VAULT_1)?,
            mint_0: read_key(data, CPMM_MINT_0)?,
            mint_1: read_key(data, CPMM_MINT_1)?,
            decimals_0: data[CPMM_DECIMALS_0],
            decimals_1: data[CPMM_DECIMALS_1],
            pending_0,
            pending_1,
        })
    }

    pub fn decode_amm_v4(data: &[u8]) -> Result<Self, PoolDecodeError> {
        check_len(data, AMM_LEN)?;
        Ok(Self {
            vault_0: read_key(data, AMM_BASE_VAULT)?,
            vault_1: read_key(data, AMM_QUOTE_VAULT)?,
            mint_0: read_key(data, AMM_BASE_MINT)?,
            mint_1: read_key(data, AMM_QUOTE_MINT)?,
            decimals_0: read_decimals(data, AMM_BASE_DECIMALS)?,
            decimals_1: read_decimals(data, AMM_QUOTE_DECIMALS)?,
            pending_0: read_u64(data, AMM_BASE_NEED_TAKE_PNL)?,
            pending_1: read_u64(data, AMM_QUOTE_NEED_TAKE_PNL)?,
        })
    }

    /// Price of mint_1 per mint_0 from raw vault balances.
    pub fn price_1_per_0(
        &self,
        vault_0_amount: u64,
        vault_1_amount: u64,
    ) -> Result<Decimal, PoolDecodeError> {
        let reserve_0 = vault_0_amount.saturating_sub(self.pending_0);
        let reserve_1 = vault_1_amount.saturating_sub(self.pending_1);
        if reserve_0 == 0 || reserve_1 == 0 {
            return Err(PoolDecodeError::EmptyPool);
        }
        let r0 = Decimal::from_raw_units(reserve_0, self.decimals_0 as u32)
            .ok_or(PoolDecodeError::Overflow)?;
        let r1 = Decimal::from_raw_units(reserve_1, self.decimals_1 as u32)
            .ok_or(PoolDecodeError::Overflow)?;
        r1.checked_div(r0).ok_or(PoolDecodeError::Overflow)
    }

    pub fn price_of(
        &self,
        mint: &Address,
        vault_0_amount: u64,
        vault_1_amount: u64,
    ) -> Result<Decimal, PoolDecodeError> {
        let price = self.price_1_per_0(vault_0_amount, vault_1_amount)?;
        orient(price, mint, &self.mint_0, &self.mint_1)
    }
}

/// Read the raw `amount` of an SPL token account.
pub fn token_account_amount(data: &[u8]) -> Result<u64, PoolDecodeError> {
    check_len(data, TOKEN_ACCOUNT_AMOUNT + 8)?;
    read_u64(data, TOKEN_ACCOUNT_AMOUNT)
}

/// Express a mint_1-per-mint_0 price as a price of `mint`.
fn orient(
    price_1_per_0: Decimal,
    mint: &Address,
    mint_0: &Address,
    mint_1: &Address,
) -> Result<Decimal, PoolDecodeError> {
    if mint == mint_0 {
        Ok(price_1_per_0)
    } else if mint == mint_1 {
        Decimal::one()
            .checked_div(price_1_per_0)
            .ok_or(PoolDecodeError::Overflow)
    } else {
        Err(PoolDecodeError::MintNotInPool(mint.to_string()))
    }
}

fn scale_by_decimals(
    price: RustDecimal,
    decimals_0: u8,
    decimals_1: u8,
) -> Result<Decimal, PoolDecodeError> {
    let shift = decimals_0 as i32 - decimals_1 as i32;
    let factor = (0..shift.unsigned_abs())
        .try_fold(RustDecimal::ONE, |acc, _| acc.checked_mul(RustDecimal::TEN))
        .ok_or(PoolDecodeError::Overflow)?;
    let scaled = if shift >= 0 {
        price.checked_mul(factor)
    } else {
        price.checked_div(factor)
    };
    scaled.map(Decimal::new).ok_or(PoolDecodeError::Overflow)
}

fn check_len(data: &[u8], expected: usize) -> Result<(), PoolDecodeError> {
    if data.len() < expected {
        return Err(PoolDecodeError::InvalidDataLength {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

fn slice<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N], PoolDecodeError> {
    data.get(offset..offset + N)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(PoolDecodeError::InvalidDataLength {
            expected: offset + N,
            actual: data.len(),
        })
}

fn read_key(data: &[u8], offset: usize) -> Result<Address, PoolDecodeError> {
    Ok(Address::from_bytes(&slice::<32>(data, offset)?))
}

fn read_u64(data: &[u8], offset: usize) -> Result<u64, PoolDecodeError> {
    Ok(u64::from_le_bytes(slice::<8>(data, offset)?))
}

fn read_decimals(data: &[u8], offset: usize) -> Result<u8, PoolDecodeError> {
    u8::try_from(read_u64(data, offset)?).map_err(|_| PoolDecodeError::Overflow)
}

fn read_u128(data: &[u8], offset: usize) -> Result<u128, PoolDecodeError> {
    Ok(u128::from_le_bytes(slice::<16>(data, offset)?))
}
