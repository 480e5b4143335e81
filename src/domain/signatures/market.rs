//! Quote access and account metrics.

use super::Row;

pub(super) const ROWS: &[Row] = &[
    ("MarketInfo", "string symbol, int mode", "double", "Quote property by mode code"),
    ("SymbolSelect", "string symbol, bool select", "bool", "Add or remove a symbol from the selection"),
    ("SymbolsTotal", "bool selected_only", "int", "Number of known or selected symbols"),
    ("SymbolName", "int index, bool selected_only", "string", "Symbol name by index"),
    ("RefreshRates", "", "bool", "Refresh predefined quote variables"),
    ("AccountBalance", "", "double", "Closed-trade balance"),
    ("AccountEquity", "", "double", "Balance plus floating profit"),
    ("AccountProfit", "", "double", "Floating profit of open trades"),
    ("AccountMargin", "", "double", "Margin held for open trades"),
    ("AccountFreeMargin", "", "double", "Equity minus held margin"),
    ("AccountCurrency", "", "string", "Deposit currency"),
    ("AccountName", "", "string", "Account holder name"),
    ("AccountNumber", "", "int", "Account number"),
    ("AccountLeverage", "", "int", "Account leverage"),
];
