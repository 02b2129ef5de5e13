// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod derivation;
pub mod session;

pub use derivation::{SeedMaterial, derive_account, derive_range};
pub use session::WalletSession;
