//! Embedded handlebars templates.
//!
//! Variable names match the camelCase serialization of `IterationState`.

/// Exploit fragment used before anything has been generated
pub const INITIAL_EXPLOIT_CODE: &str = "function executeExploit(uint256 amount) internal {}";

pub const TEST_CONTRACT: &str = r#"// SPDX-License-Identifier: UNLICENSED
pragma solidity ^0.8.17;

import "forge-std/Test.sol";

{{interface}}

{{extraInterfaces}}

interface IWETH {
    function deposit() external payable;
    function transfer(address to, uint256 value) external returns (bool);
    function approve(address guy, uint256 wad) external returns (bool);
    function withdraw(uint256 wad) external;
    function balanceOf(address) external view returns (uint256);
}

interface IERC20 {
    function approve(address guy, uint256 wad) external returns (bool);
    function balanceOf(address) external view returns (uint256);
    function transfer(address to, uint256 value) external returns (bool);
}

interface IUniswapV2Factory {
    function getPair(address tokenA, address tokenB) external view returns (address pair);
}

interface IUniswapV2Pair {
    function balanceOf(address) external view returns (uint256);
    function skim(address to) external;
    function sync() external;
    function swap(uint256 amount0Out, uint256 amount1Out, address to, bytes memory data) external;
    function token0() external view returns (address);
    function token1() external view returns (address);
    function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);
}

interface IUniswapV2Router {
    function factory() external view returns (address);
    function swapExactTokensForTokensSupportingFeeOnTransferTokens(
        uint256 amountIn,
        uint256 amountOutMin,
        address[] calldata path,
        address to,
        uint256 deadline
    ) external;
    function swapExactETHForTokensSupportingFeeOnTransferTokens(
        uint256 amountOutMin,
        address[] calldata path,
        address to,
        uint256 deadline
    ) external payable;
    function swapExactTokensForETHSupportingFeeOnTransferTokens(
        uint256 amountIn,
        uint256 amountOutMin,
        address[] calldata path,
        address to,
        uint256 deadline
    ) external;
}

interface IBalancerVault {
    function flashLoan(
        address recipient,
        address[] memory tokens,
        uint256[] memory amounts,
        bytes memory userData
    ) external;
}

interface IDODO {
    function flashLoan(uint256 baseAmount, uint256 quoteAmount, address assetTo, bytes calldata data) external;
}

{{extraContracts}}

contract TestFlaw is Test {
    address internal target = {{targetAddress}};
    address internal token;
    IERC20 internal valuableToken = IERC20({{valuableTokenAddress}});
    IUniswapV2Router internal uniswapRouter = IUniswapV2Router({{uniswapRouterAddress}});
    IUniswapV2Pair internal uniswapPair;
    address internal flashloanProvider = {{flashloanProviderAddress}};

    function setUp() public {
        // Start from an empty balance so any surplus comes from the exploit
        valuableToken.transfer(address(0xdEaD), valuableToken.balanceOf(address(this)));

        {{assignTokenAddress}}
        if (token != address(0)) {
            IUniswapV2Factory uniswapFactory = IUniswapV2Factory(uniswapRouter.factory());
            uniswapPair = IUniswapV2Pair(uniswapFactory.getPair(address(valuableToken), token));
            IERC20(token).approve(address(uniswapRouter), type(uint256).max);
            IERC20(token).approve(target, type(uint256).max);
        }

        valuableToken.approve(address(uniswapRouter), type(uint256).max);
        valuableToken.approve(target, type(uint256).max);
    }

    function testFlaw() external {
        address[] memory tokens = new address[](1);
        tokens[0] = address(valuableToken);

        uint256[] memory amounts = new uint256[](1);
        amounts[0] = valuableToken.balanceOf(flashloanProvider);

        console.log("%s {{valuableTokenName}} available for the flashloan", amounts[0]);
        console.log("Initial balance %s", valuableToken.balanceOf(address(this)));
        {{flashloanCall}}
        console.log("Final balance %s", valuableToken.balanceOf(address(this)));
    }

    {{flashloanReceiver}}
        executeExploit(amount);

        console.log("Current {{valuableTokenName}} balance: %s", valuableToken.balanceOf(address(this)));
        valuableToken.transfer(flashloanProvider, amount);
        uint256 surplus = valuableToken.balanceOf(address(this));
        console.log("Surplus: %s {{valuableTokenName}}", surplus);
        assert(surplus > 0);
    }

    {{executeExploitCode}}
}
"#;

pub const CONSTRAINTS: &str = r#"# Constraints

* Do NOT guess the internal behavior of the contract, instead use the information provided by the trace, which is always accurate.
* Do NOT predict the trace output, you need to run the test and check the output.
* Do NOT use SafeMath.
* Do NOT use third-parties during the exploit (e.g. the owner doing something for you).
* Do NOT use any cheat code (e.g. prank).
* Do NOT try to exploit underflows or overflows unless the contract uses Solidity < 0.8.0 or an unchecked block.
* Do NOT explain the reasoning, only answer with the tagged sections described below.
* Do NOT repeat or modify the rest of the test contract.

# Recommendations

* Carefully review how tokens flow from this contract to the Uniswap pair (and maybe through others), and back to this contract to repay the flash loan.
* You initially have a large amount of {{valuableTokenName}} available, but you do not have to use all of it.
* You start with no tokens except {{valuableTokenName}}, so you must find a way to obtain the right tokens in order to trigger the flaw.
* Near the end, swap all your tokens back to {{valuableTokenName}}. Be careful with transfer fees and other constraints: the exploit should be capital efficient to be detectable when repaying the flash loan.
* Use `console.log` to query the state of the contracts, if needed.
* Keep the control flow of the exploit simple: no if conditions, only sequences of calls.
* Try different functions of the target contract and evaluate their effects.

# Response format

Answer with the following tagged sections:

* `<executeExploitCode>` (required): the complete `function executeExploit(uint256 amount) internal` definition, plus a `receive` function or any external callback it needs.
* `<extraInterfaces>` (optional): additional interface declarations used by the exploit.
* `<extraContracts>` (optional): additional helper contracts used by the exploit.
"#;

pub const INITIAL_PROMPT: &str = r#"# Instructions

We are going to reproduce a Solidity smart contract issue step by step, incrementally modifying a Foundry test according to the information produced during its execution (e.g. a trace). This issue allows a user to start with a certain amount of {{valuableTokenName}}, perform some operations using the contract, and then obtain more {{valuableTokenName}} than the initial one.

{{constraints}}

# Code to review

```
{{targetCode}}
```

The contract has a number of private variables that are not accessible, these are their current values:
{{privateVariablesValues}}

The current Foundry test is this one:

```
{{testCode}}
```

And its first trace is this one:

```
{{trace}}
```
"#;

pub const NEXT_PROMPT: &str = r#"The result of the last execution is:

```
{{trace}}
```

The failure reason was: {{failureReason}}

Please improve the `executeExploit` function to fix the issue and make it work.

{{constraints}}
"#;

/// Names under which templates are registered and overridden
pub const TEMPLATE_NAMES: [&str; 4] = ["test_contract", "constraints", "initial_prompt", "next_prompt"];

/// Embedded source for a template name
pub fn embedded(name: &str) -> Option<&'static str> {
    match name {
        "test_contract" => Some(TEST_CONTRACT),
        "constraints" => Some(CONSTRAINTS),
        "initial_prompt" => Some(INITIAL_PROMPT),
        "next_prompt" => Some(NEXT_PROMPT),
        _ => None,
    }
}
