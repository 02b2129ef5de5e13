// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use regex::Regex;
use std::fs;
use std::path::Path;

const CANDIDATES: &[&str] = &[
    "config.toml",
    "config.example.toml",
    "config.prod.toml",
    "config.dev.toml",
    ".env.example",
];

fn committed_configs() -> Vec<(&'static str, String)> {
    CANDIDATES
        .iter()
        .filter(|f| Path::new(f).exists())
        .map(|f| (*f, fs::read_to_string(f).expect("read config")))
        .collect()
}

/// Fail CI if config files contain 64-hex private keys.
#[test]
fn no_committed_hex_keys_in_configs() {
    let re = Regex::new(r"0x?[a-fA-F0-9]{64}").unwrap();
    for (file, body) in committed_configs() {
        for (idx, line) in body.lines().enumerate() {
            if re.is_match(line) {
                panic!("Secret-looking hex in {} at line {}", file, idx + 1);
            }
        }
    }
}

/// Seed phrases belong in the environment or stdin, never in a file.
#[test]
fn no_committed_seed_phrases_in_configs() {
    let phrase = Regex::new(r"\b(?:[a-z]{3,8}\s+){11,23}[a-z]{3,8}\b").unwrap();
    for (file, body) in committed_configs() {
        for (idx, line) in body.lines().enumerate() {
            if line.trim_start().starts_with('#') {
                continue;
            }
            if phrase.is_match(line) {
                panic!("Mnemonic-looking phrase in {} at line {}", file, idx + 1);
            }
        }
    }
}

#[test]
fn seed_phrase_pattern_catches_twelve_words() {
    let phrase = Regex::new(r"\b(?:[a-z]{3,8}\s+){11,23}[a-z]{3,8}\b").unwrap();
    assert!(phrase.is_match(
        "mnemonic = \"test test test test test test test test test test test junk\""
    ));
    assert!(!phrase.is_match("bot_router_kind = \"v2\""));
}
