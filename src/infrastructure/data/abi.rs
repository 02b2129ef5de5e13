// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use alloy::sol;

sol! {
    #[derive(Debug, PartialEq, Eq)]
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function transfer(address to, uint256 amount) external returns (bool);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
    }

    #[derive(Debug, PartialEq, Eq)]
    #[sol(rpc)]
    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Call3Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls) external payable returns (Call3Result[] memory returnData);
    }

    /// Disperse.app style batch payer.
    #[derive(Debug, PartialEq, Eq)]
    #[sol(rpc)]
    interface IDisperse {
        function disperseEther(address[] recipients, uint256[] values) external payable;
        function disperseToken(address token, address[] recipients, uint256[] values) external;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, U256};
    use alloy::sol_types::SolCall;

    #[test]
    fn erc20_selectors_match_standard() {
        let transfer = IERC20::transferCall {
            to: Address::from([1u8; 20]),
            amount: U256::from(5u64),
        }
        .abi_encode();
        let balance = IERC20::balanceOfCall {
            owner: Address::from([2u8; 20]),
        }
        .abi_encode();
        let approve = IERC20::approveCall {
            spender: Address::from([3u8; 20]),
            amount: U256::MAX,
        }
        .abi_encode();

        assert_eq!(hex::encode(&transfer[..4]), "a9059cbb");
        assert_eq!(hex::encode(&balance[..4]), "70a08231");
        assert_eq!(hex::encode(&approve[..4]), "095ea7b3");
    }

    #[test]
    fn aggregate3_selector_and_result_decoding() {
        let calls = vec![IMulticall3::Call3 {
            target: Address::from([4u8; 20]),
            allowFailure: true,
            callData: IERC20::balanceOfCall {
                owner: Address::from([5u8; 20]),
            }
            .abi_encode()
            .into(),
        }];
        let encoded = IMulticall3::aggregate3Call { calls }.abi_encode();
        assert_eq!(hex::encode(&encoded[..4]), "82ad56cb");

        let word = U256::from(77u64).to_be_bytes::<32>();
        let decoded = IERC20::balanceOfCall::abi_decode_returns(&word).expect("decode balance");
        assert_eq!(decoded, U256::from(77u64));
    }

    #[test]
    fn disperse_ether_carries_parallel_arrays() {
        let call = IDisperse::disperseEtherCall {
            recipients: vec![Address::from([6u8; 20]), Address::from([7u8; 20])],
            values: vec![U256::from(1u64), U256::from(2u64)],
        };
        let decoded =
            IDisperse::disperseEtherCall::abi_decode(&call.abi_encode()).expect("decode disperse");
        assert_eq!(decoded.recipients.len(), 2);
        assert_eq!(decoded.values[1], U256::from(2u64));
    }
}
