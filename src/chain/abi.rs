// =============================================================================
// ABI fragments for the contracts the Chain Reader and Order Builder call.
// Grounded in `original_source/api/onchain/{gmx,vault_reader,wallet}.py`.
// =============================================================================

/// `getMarkets(address dataStore, uint256 start, uint256 end) -> Market.Props[]`
pub const GMX_READER_ABI: &str = r#"[
    {
        "name": "getMarkets",
        "type": "function",
        "stateMutability": "view",
        "inputs": [
            { "name": "dataStore", "type": "address" },
            { "name": "start", "type": "uint256" },
            { "name": "end", "type": "uint256" }
        ],
        "outputs": [
            {
                "name": "",
                "type": "tuple[]",
                "components": [
                    { "name": "marketToken", "type": "address" },
                    { "name": "indexToken", "type": "address" },
                    { "name": "longToken", "type": "address" },
                    { "name": "shortToken", "type": "address" }
                ]
            }
        ]
    },
    {
        "name": "getAccountPositions",
        "type": "function",
        "stateMutability": "view",
        "inputs": [
            { "name": "dataStore", "type": "address" },
            { "name": "account", "type": "address" },
            { "name": "start", "type": "uint256" },
            { "name": "end", "type": "uint256" }
        ],
        "outputs": [
            {
                "name": "",
                "type": "tuple[]",
                "components": [
                    {
                        "name": "addresses",
                        "type": "tuple",
                        "components": [
                            { "name": "account", "type": "address" },
                            { "name": "market", "type": "address" },
                            { "name": "collateralToken", "type": "address" }
                        ]
                    },
                    {
                        "name": "numbers",
                        "type": "tuple",
                        "components": [
                            { "name": "sizeInUsd", "type": "uint256" },
                            { "name": "sizeInTokens", "type": "uint256" },
                            { "name": "collateralAmount", "type": "uint256" },
                            { "name": "borrowingFactor", "type": "uint256" },
                            { "name": "fundingFeeAmountPerSize", "type": "uint256" },
                            { "name": "longTokenClaimableFundingAmountPerSize", "type": "uint256" },
                            { "name": "shortTokenClaimableFundingAmountPerSize", "type": "uint256" },
                            { "name": "increasedAtBlock", "type": "uint256" },
                            { "name": "decreasedAtBlock", "type": "uint256" },
                            { "name": "increasedAtTime", "type": "uint256" },
                            { "name": "decreasedAtTime", "type": "uint256" }
                        ]
                    },
                    {
                        "name": "flags",
                        "type": "tuple",
                        "components": [
                            { "name": "isLong", "type": "bool" }
                        ]
                    }
                ]
            }
        ]
    }
]"#;

/// `symbol() -> string`
pub const ERC20_SYMBOL_ABI: &str = r#"[
    {
        "name": "symbol",
        "type": "function",
        "stateMutability": "view",
        "inputs": [],
        "outputs": [{ "name": "", "type": "string" }]
    }
]"#;

/// dHEDGE `PoolLogic` surface: TVL, share price, supply, and the proxy call
/// the Trade Executor ultimately invokes.
pub const POOL_LOGIC_ABI: &str = r#"[
    { "name": "totalFundValue", "type": "function", "stateMutability": "view", "inputs": [], "outputs": [{ "type": "uint256" }] },
    { "name": "tokenPriceWithoutManagerFee", "type": "function", "stateMutability": "view", "inputs": [], "outputs": [{ "type": "uint256" }] },
    { "name": "tokenPrice", "type": "function", "stateMutability": "view", "inputs": [], "outputs": [{ "type": "uint256" }] },
    { "name": "totalSupply", "type": "function", "stateMutability": "view", "inputs": [], "outputs": [{ "type": "uint256" }] },
    { "name": "poolManagerLogic", "type": "function", "stateMutability": "view", "inputs": [], "outputs": [{ "type": "address" }] },
    {
        "name": "execTransaction",
        "type": "function",
        "stateMutability": "nonpayable",
        "inputs": [
            { "name": "target", "type": "address" },
            { "name": "data", "type": "bytes" }
        ],
        "outputs": [{ "name": "success", "type": "bool" }]
    },
    {
        "name": "execTransactionWithValue",
        "type": "function",
        "stateMutability": "nonpayable",
        "inputs": [
            { "name": "target", "type": "address" },
            { "name": "data", "type": "bytes" },
            { "name": "value", "type": "uint256" }
        ],
        "outputs": [{ "name": "success", "type": "bool" }]
    }
]"#;

/// `PoolManagerLogic` surface: `manager()`, `trader()`, `getSupportedAssets()`.
pub const POOL_MANAGER_LOGIC_ABI: &str = r#"[
    { "name": "manager", "type": "function", "stateMutability": "view", "inputs": [], "outputs": [{ "type": "address" }] },
    { "name": "trader", "type": "function", "stateMutability": "view", "inputs": [], "outputs": [{ "type": "address" }] },
    {
        "name": "getSupportedAssets",
        "type": "function",
        "stateMutability": "view",
        "inputs": [],
        "outputs": [
            {
                "name": "",
                "type": "tuple[]",
                "components": [
                    { "name": "asset", "type": "address" },
                    { "name": "isDeposit", "type": "bool" }
                ]
            }
        ]
    }
]"#;

/// ERC-20 balance/decimals surface, used for the collateral and execution
/// fee token balance pre-flight in the Trade Executor.
pub const ERC20_ABI: &str = r#"[
    { "name": "balanceOf", "type": "function", "stateMutability": "view", "inputs": [{ "name": "account", "type": "address" }], "outputs": [{ "type": "uint256" }] },
    { "name": "decimals", "type": "function", "stateMutability": "view", "inputs": [], "outputs": [{ "type": "uint8" }] }
]"#;

/// GMX V2 `ExchangeRouter` surface: `multicall`, `sendTokens`, and
/// `createOrder`, matching the calldata the Order Builder assembles.
pub const GMX_EXCHANGE_ROUTER_ABI: &str = r#"[
    {
        "name": "multicall",
        "type": "function",
        "stateMutability": "payable",
        "inputs": [{ "name": "data", "type": "bytes[]" }],
        "outputs": [{ "name": "results", "type": "bytes[]" }]
    },
    {
        "name": "sendTokens",
        "type": "function",
        "stateMutability": "nonpayable",
        "inputs": [
            { "name": "token", "type": "address" },
            { "name": "receiver", "type": "address" },
            { "name": "amount", "type": "uint256" }
        ],
        "outputs": []
    },
    {
        "name": "createOrder",
        "type": "function",
        "stateMutability": "payable",
        "inputs": [
            {
                "name": "params",
                "type": "tuple",
                "components": [
                    {
                        "name": "addresses",
                        "type": "tuple",
                        "components": [
                            { "name": "receiver", "type": "address" },
                            { "name": "cancellationReceiver", "type": "address" },
                            { "name": "callbackContract", "type": "address" },
                            { "name": "uiFeeReceiver", "type": "address" },
                            { "name": "market", "type": "address" },
                            { "name": "initialCollateralToken", "type": "address" },
                            { "name": "swapPath", "type": "address[]" }
                        ]
                    },
                    {
                        "name": "numbers",
                        "type": "tuple",
                        "components": [
                            { "name": "sizeDeltaUsd", "type": "uint256" },
                            { "name": "initialCollateralDeltaAmount", "type": "uint256" },
                            { "name": "triggerPrice", "type": "uint256" },
                            { "name": "acceptablePrice", "type": "uint256" },
                            { "name": "executionFee", "type": "uint256" },
                            { "name": "callbackGasLimit", "type": "uint256" },
                            { "name": "minOutputAmount", "type": "uint256" },
                            { "name": "validFromTime", "type": "uint256" }
                        ]
                    },
                    { "name": "orderType", "type": "uint8" },
                    { "name": "decreasePositionSwapType", "type": "uint8" },
                    { "name": "isLong", "type": "bool" },
                    { "name": "shouldUnwrapNativeToken", "type": "bool" },
                    { "name": "autoCancel", "type": "bool" },
                    { "name": "referralCode", "type": "bytes32" },
                    { "name": "dataList", "type": "bytes32[]" }
                ]
            }
        ],
        "outputs": [{ "name": "orderKey", "type": "bytes32" }]
    }
]"#;
