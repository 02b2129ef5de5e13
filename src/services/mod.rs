// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod accounts;
pub mod balances;
pub mod batch;
pub mod policy;
pub mod trading;
