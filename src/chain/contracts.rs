//! Solidity interfaces of the payment sender and receipt receiver contracts.
//!
//! Only the methods the clients call are declared; admin setters are left out.

use alloy_sol_types::sol;

sol! {
    #[allow(missing_docs)]
    #[derive(Debug)]
    #[sol(rpc)]
    interface IPaymentSender {
        event PaymentSent(bytes32 indexed paymentId, address indexed payer, uint256 amount, bytes32 destinationChainId, address destinationReceiver);

        function sendPayment(bytes32 paymentId) external payable;
        function getBalance() external view returns (uint256);

        function remoteBlockchainId() external view returns (bytes32);
        function remoteReceiver() external view returns (address);
        function MESSENGER() external view returns (address);
        function owner() external view returns (address);
        function paused() external view returns (bool);
        function defaultGasLimit() external view returns (uint256);
        function messageGasLimit() external view returns (uint256);
    }
}

sol! {
    #[allow(missing_docs)]
    #[derive(Debug)]
    #[sol(rpc)]
    interface IPaymentReceiver {
        struct Receipt {
            bytes32 paymentId;
            uint256 amount;
            address payer;
            uint256 timestamp;
            bool consumed;
        }

        event PaymentReceived(bytes32 indexed paymentId, address indexed payer, uint256 amount, uint256 timestamp);
        event PaymentConsumed(bytes32 indexed paymentId, address indexed consumer);

        function hasPaid(bytes32 paymentId) external view returns (bool);
        function getReceipt(bytes32 paymentId) external view returns (Receipt memory);
        function isConsumed(bytes32 paymentId) external view returns (bool);
        function isExpired(bytes32 paymentId) external view returns (bool);
        function isValidPayment(bytes32 paymentId) external view returns (bool);
        function consumePayment(bytes32 paymentId) external;

        function approvedSender() external view returns (address);
        function approvedSourceBlockchainId() external view returns (bytes32);
        function MESSENGER() external view returns (address);
        function owner() external view returns (address);
        function paused() external view returns (bool);
        function requiredPaymentAmount() external view returns (uint256);
        function paymentExpiryTime() external view returns (uint256);
    }
}
