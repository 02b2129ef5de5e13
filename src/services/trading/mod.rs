// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod batch_trade;
pub mod routers;
pub mod venue;
pub mod volume_bot;

pub use batch_trade::{BatchTrader, TradeSide};
pub use venue::{BuySizing, RouterVenue, RouterVenueConfig, SellSizing, TradeFill, TradeVenue};
pub use volume_bot::{
    BuyPlan, CycleScheduler, LoopState, TradingLoopConfig, TradingLoopHandle, TradingStats,
    VolumeBot,
};
