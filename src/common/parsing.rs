// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use alloy::primitives::{Address, B256};
use std::str::FromStr;

pub fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

pub fn parse_hex_bytes(s: &str) -> Option<Vec<u8>> {
    hex::decode(strip_0x(s)).ok()
}

pub fn parse_b256_hex(s: &str) -> Option<B256> {
    let bytes = parse_hex_bytes(s)?;
    if bytes.len() != 32 {
        return None;
    }
    Some(B256::from_slice(&bytes))
}

pub fn parse_address_hex(s: &str) -> Option<Address> {
    Address::from_str(strip_0x(s)).ok()
}

/// One `address,amount` row of a recipients list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientLine {
    pub line_no: usize,
    pub address: String,
    pub amount: Option<String>,
}

/// Splits a recipients list into rows. Fields may be separated by commas, tabs or spaces;
/// blank lines and `#` comments are ignored. Line numbers are 1-based.
pub fn parse_recipient_lines(body: &str) -> Vec<RecipientLine> {
    body.lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            let content = line.split('#').next().unwrap_or("").trim();
            if content.is_empty() {
                return None;
            }
            let mut fields = content
                .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                .map(str::trim)
                .filter(|f| !f.is_empty());
            let address = fields.next()?.to_string();
            let amount = fields.next().map(ToString::to_string);
            Some(RecipientLine {
                line_no: idx + 1,
                address,
                amount,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_parsers_accept_lower_and_upper_prefixes() {
        assert_eq!(parse_hex_bytes("0Xabcd"), Some(vec![0xab, 0xcd]));
        assert!(parse_b256_hex(&format!("0x{}", "11".repeat(32))).is_some());
        assert!(parse_b256_hex("0x1234").is_none());
        assert!(parse_address_hex("0X000000000000000000000000000000000000dEaD").is_some());
    }

    #[test]
    fn recipient_lines_accept_mixed_separators() {
        let body = "\
# airdrop list
0x000000000000000000000000000000000000dEaD, 0.5
0x000000000000000000000000000000000000bEEF\t1

So11111111111111111111111111111111111111112 2.25 # trailing note
lonely-address
";
        let rows = parse_recipient_lines(body);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].line_no, 2);
        assert_eq!(rows[0].amount.as_deref(), Some("0.5"));
        assert_eq!(rows[1].amount.as_deref(), Some("1"));
        assert_eq!(rows[2].address, "So11111111111111111111111111111111111111112");
        assert_eq!(rows[2].amount.as_deref(), Some("2.25"));
        assert_eq!(rows[3].amount, None);
        assert_eq!(rows[3].line_no, 6);
    }
}
