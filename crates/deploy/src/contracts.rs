//! Solidity bindings for the calls the deployment and its tests make.

use alloy_sol_types::sol;

/// Artifact and deployment names.
pub mod names {
    pub const WETH: &str = "WETH";
    pub const DAI: &str = "ERC20Mock";
    pub const LIMIT_ORDER_PROTOCOL: &str = "LimitOrderProtocol";
    pub const VAULT: &str = "Vault";
    pub const NOTIF_RECEIVER: &str = "MarginTradingNotifReceiver";
    pub const FACTORY: &str = "FactoryClone";
    /// The receiver clone deployed through the factory.
    pub const RECEIVER_CLONE: &str = "MarginTradingNotifReceiverClone";
    pub const POOL_CORE: &str = "AaveLendingPoolCoreMock";
    pub const PROVIDER: &str = "AaveLendingPoolProviderMock";
    pub const VARIABLE_DEBT: &str = "AaveVariableDebtTokenMock";
    pub const ADAI: &str = "ADAIMock";
    pub const AWETH: &str = "AWETHMock";
    pub const POOL: &str = "AaveLendingPoolMockV2";
    pub const AAVE_PROTOCOL: &str = "AaveLendingProtocol";
}

sol! {
    interface IERC20Mock {
        function mint(address account, uint256 amount) external;
        function approve(address spender, uint256 amount) external returns (bool);
        function transfer(address to, uint256 amount) external returns (bool);
        function balanceOf(address account) external view returns (uint256);
    }

    interface IWETH {
        function deposit() external payable;
        function approve(address spender, uint256 amount) external returns (bool);
        function transfer(address to, uint256 amount) external returns (bool);
        function balanceOf(address account) external view returns (uint256);
    }

    interface ILendingPoolProviderMock {
        function _setLendingPool(address pool) external;
        function _setLendingPoolCore(address core) external;
        function getLendingPool() external view returns (address);
        function getLendingPoolCore() external view returns (address);
    }

    interface IATokenMock {
        function setLendingPool(address pool) external;
        function balanceOf(address account) external view returns (uint256);
    }

    interface ILendingPool {
        function deposit(address asset, uint256 amount, address onBehalfOf, uint16 referralCode) external;
    }

    interface IVault {
        function addReceiver(address receiver) external;
        function approveReceiver(address receiver) external;
        function approvedReceiver(address receiver) external view returns (bool);
        function addLendingProtocol(address receiver, address protocol) external;
        function wethToken() external view returns (address);
        function owner() external view returns (address);
    }

    interface IMarginTradingNotifReceiver {
        function vault() external view returns (address);
        function lendingProtocols(address protocol) external view returns (bool);
        function limitOrderProtocol() external view returns (address);
        function factory() external view returns (address);
        function owner() external view returns (address);
    }

    interface IFactoryClone {
        function deploy() external returns (address);
        function deployedContracts(uint256 index) external view returns (address);
        function implementation() external view returns (address);
        function wethToken() external view returns (address);
        function owner() external view returns (address);
        function lendingProtocols(address protocol) external view returns (bool);
        function addLendingProtocol(address protocol) external;
    }

    interface IAaveLendingProtocol {
        function lend(address token, address recipient, bytes data) external;
        function borrow(address token, uint256 amount, address recipient, bytes data) external;
        function vault() external view returns (address);
    }

    interface IDebtToken {
        function approveDelegation(address delegatee, uint256 amount) external;
        function borrowAllowance(address fromUser, address toUser) external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
    }

    interface ILimitOrderProtocol {
        struct Order {
            uint256 salt;
            address makerAsset;
            address takerAsset;
            address maker;
            address receiver;
            address allowedSender;
            uint256 makingAmount;
            uint256 takingAmount;
            bytes makerAssetData;
            bytes takerAssetData;
            bytes getMakerAmount;
            bytes getTakerAmount;
            bytes predicate;
            bytes permit;
            bytes interaction;
        }

        function DOMAIN_SEPARATOR() external view returns (bytes32);
        function timestampBelow(uint256 time) external view returns (bool);
        function fillOrder(
            Order order,
            bytes signature,
            uint256 makingAmount,
            uint256 takingAmount,
            uint256 thresholdAmount
        ) external returns (uint256, uint256);
    }
}
