//! Pure pricing functions for the per-asset constant-product pools.
//!
//! Every function takes a [`Pool`] snapshot and returns amounts without
//! touching any state. Amounts owed by the trader round up and amounts owed
//! to the trader round down, so the pool keeps every remainder and
//! `currency_reserve * asset_reserve` never decreases across a trade.
//!
//! The trading fee is charged on the currency side of a buy and the asset
//! side of a sell and stays in the pool. With a zero fee the formulas reduce
//! to:
//!
//! - buy: `currency_in = ceil(currency_reserve * asset_out / (asset_reserve - asset_out))`
//! - sell: `currency_out = floor(currency_reserve * asset_in / (asset_reserve + asset_in))`

use hydra_amm::domain::{Amount, FeeTier, Rounding};
use hydra_amm::math::CheckedArithmetic;

use crate::domain::{AssetId, Pool};
use crate::error::ExchangeError;

/// Basis-point denominator for fee arithmetic.
pub const FEE_DENOMINATOR: u128 = 10_000;

/// Result of pricing a liquidity deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddQuote {
    /// Currency the provider must pair with the deposited assets.
    pub currency_in: Amount,
    /// LP shares minted for the deposit.
    pub shares_minted: Amount,
}

/// Result of pricing a liquidity withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveQuote {
    /// Currency paid out to the share holder.
    pub currency_out: Amount,
    /// Asset units paid out to the share holder.
    pub asset_out: Amount,
}

/// Stateless pricing engine parameterised by the trading fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingEngine {
    fee: FeeTier,
}

impl PricingEngine {
    /// Creates an engine charging `fee` on every buy and sell.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::InvalidRequest`] if the fee is 100% or more.
    pub fn new(fee: FeeTier) -> Result<Self, ExchangeError> {
        if u128::from(fee.basis_points().get()) >= FEE_DENOMINATOR {
            return Err(ExchangeError::InvalidRequest(format!(
                "fee of {} must be below {FEE_DENOMINATOR} basis points",
                fee.basis_points()
            )));
        }
        Ok(Self { fee })
    }

    /// The configured trading fee.
    #[must_use]
    pub const fn fee(&self) -> FeeTier {
        self.fee
    }

    /// Currency required to buy exactly `asset_out` units from `pool`.
    ///
    /// Buying zero costs zero.
    ///
    /// # Errors
    ///
    /// - [`ExchangeError::InsufficientLiquidity`] if `asset_out` is not
    ///   strictly below the asset reserve.
    /// - [`ExchangeError::Arithmetic`] on overflow.
    pub fn buy(
        &self,
        asset_id: AssetId,
        pool: &Pool,
        asset_out: Amount,
    ) -> Result<Amount, ExchangeError> {
        if asset_out.is_zero() {
            return Ok(Amount::ZERO);
        }
        if asset_out >= pool.asset_reserve() {
            return Err(ExchangeError::InsufficientLiquidity(asset_id));
        }

        let remaining = pool.asset_reserve().safe_sub(&asset_out)?;
        let net = pool
            .currency_reserve()
            .safe_mul(&asset_out)?
            .safe_div(&remaining, Rounding::Up)?;

        // gross up so that the fee share of the payment stays in the pool
        let complement = self.fee_complement()?;
        Ok(net
            .safe_mul(&Amount::new(FEE_DENOMINATOR))?
            .safe_div(&complement, Rounding::Up)?)
    }

    /// Currency paid out for selling `asset_in` units into `pool`.
    ///
    /// # Errors
    ///
    /// - [`ExchangeError::InsufficientLiquidity`] if the pool holds no
    ///   liquidity.
    /// - [`ExchangeError::Arithmetic`] on overflow.
    pub fn sell(
        &self,
        asset_id: AssetId,
        pool: &Pool,
        asset_in: Amount,
    ) -> Result<Amount, ExchangeError> {
        if pool.is_empty() || pool.asset_reserve().is_zero() {
            return Err(ExchangeError::InsufficientLiquidity(asset_id));
        }
        if asset_in.is_zero() {
            return Ok(Amount::ZERO);
        }

        let fee = self.fee.apply_to_amount(asset_in, Rounding::Up)?;
        let net = asset_in.safe_sub(&fee)?;
        let denominator = pool.asset_reserve().safe_add(&net)?;
        Ok(pool
            .currency_reserve()
            .safe_mul(&net)?
            .safe_div(&denominator, Rounding::Down)?)
    }

    /// Prices a deposit of `asset_in` units bounded by `max_currency`.
    ///
    /// Into an empty pool the provider sets the price: the whole of
    /// `max_currency` is deposited and the same number of shares is minted.
    /// Otherwise the deposit follows the current reserve ratio.
    ///
    /// # Errors
    ///
    /// - [`ExchangeError::InvalidRequest`] for a zero deposit, a zero
    ///   initial currency amount, or a deposit too small to mint a share.
    /// - [`ExchangeError::SlippageExceeded`] if the required currency
    ///   exceeds `max_currency`.
    /// - [`ExchangeError::Arithmetic`] on overflow.
    pub fn add(
        &self,
        asset_id: AssetId,
        pool: &Pool,
        asset_in: Amount,
        max_currency: Amount,
    ) -> Result<AddQuote, ExchangeError> {
        if asset_in.is_zero() {
            return Err(ExchangeError::InvalidRequest(format!(
                "zero asset deposit for asset {asset_id}"
            )));
        }

        if pool.is_empty() {
            if max_currency.is_zero() {
                return Err(ExchangeError::InvalidRequest(format!(
                    "initial deposit for asset {asset_id} needs a non-zero currency amount"
                )));
            }
            return Ok(AddQuote {
                currency_in: max_currency,
                shares_minted: max_currency,
            });
        }

        let currency_in = pool
            .currency_reserve()
            .safe_mul(&asset_in)?
            .safe_div(&pool.asset_reserve(), Rounding::Up)?;
        if currency_in > max_currency {
            return Err(ExchangeError::SlippageExceeded {
                asset_id: Some(asset_id),
                required: currency_in.get(),
                limit: max_currency.get(),
            });
        }

        let shares_minted = pool
            .total_shares()
            .safe_mul(&asset_in)?
            .safe_div(&pool.asset_reserve(), Rounding::Down)?;
        if shares_minted.is_zero() {
            return Err(ExchangeError::InvalidRequest(format!(
                "deposit of {asset_in} units into pool {asset_id} mints no shares"
            )));
        }

        Ok(AddQuote {
            currency_in,
            shares_minted,
        })
    }

    /// Prices burning `shares` of `pool` with per-side minimum outputs.
    ///
    /// # Errors
    ///
    /// - [`ExchangeError::InsufficientLiquidity`] if the pool is empty or
    ///   `shares` exceeds its supply.
    /// - [`ExchangeError::InvalidRequest`] if `shares` is zero.
    /// - [`ExchangeError::SlippageExceeded`] if either output falls below
    ///   its minimum.
    /// - [`ExchangeError::Arithmetic`] on overflow.
    pub fn remove(
        &self,
        asset_id: AssetId,
        pool: &Pool,
        shares: Amount,
        min_currency: Amount,
        min_asset: Amount,
    ) -> Result<RemoveQuote, ExchangeError> {
        if pool.is_empty() || shares > pool.total_shares() {
            return Err(ExchangeError::InsufficientLiquidity(asset_id));
        }
        if shares.is_zero() {
            return Err(ExchangeError::InvalidRequest(format!(
                "zero share burn for pool {asset_id}"
            )));
        }

        let supply = pool.total_shares();
        let currency_out = pool
            .currency_reserve()
            .safe_mul(&shares)?
            .safe_div(&supply, Rounding::Down)?;
        let asset_out = pool
            .asset_reserve()
            .safe_mul(&shares)?
            .safe_div(&supply, Rounding::Down)?;

        if currency_out < min_currency {
            return Err(ExchangeError::SlippageExceeded {
                asset_id: Some(asset_id),
                required: currency_out.get(),
                limit: min_currency.get(),
            });
        }
        if asset_out < min_asset {
            return Err(ExchangeError::SlippageExceeded {
                asset_id: Some(asset_id),
                required: asset_out.get(),
                limit: min_asset.get(),
            });
        }

        Ok(RemoveQuote {
            currency_out,
            asset_out,
        })
    }

    fn fee_complement(&self) -> Result<Amount, ExchangeError> {
        let fee_bps = u128::from(self.fee.basis_points().get());
        Ok(Amount::new(FEE_DENOMINATOR).safe_sub(&Amount::new(fee_bps))?)
    }
}
