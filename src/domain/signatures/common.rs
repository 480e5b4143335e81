//! Terminal chatter, session checks and error-slot access.

use super::Row;

pub(super) const ROWS: &[Row] = &[
    ("Print", "any value, ...", "void", "Write the arguments to the journal"),
    ("Alert", "any value, ...", "bool", "Write the arguments to the journal as an alert"),
    ("Comment", "any value, ...", "void", "Set the chart comment text"),
    ("Sleep", "int milliseconds", "void", "Advance the simulated clock"),
    ("GetLastError", "", "int", "Last error code set by a failed operation"),
    ("ResetLastError", "", "void", "Clear the last error code"),
    ("IsStopped", "", "bool", "True once the host has requested a stop"),
    ("TerminalName", "", "string", "Terminal program name"),
    ("TerminalCompany", "", "string", "Terminal vendor name"),
    ("Digits", "", "int", "Price digits of the current symbol"),
    ("Period", "", "int", "Timeframe of the current chart in minutes"),
    ("Point", "", "double", "Point size of the current symbol"),
    ("Symbol", "", "string", "Name of the current symbol"),
    ("IsConnected", "", "bool", "True when a trade server connection exists"),
    ("IsDemo", "", "bool", "True on a demo account"),
    ("IsTesting", "", "bool", "True inside the tester"),
    ("IsTradeAllowed", "", "bool", "True when trading is permitted"),
    ("IsOptimization", "", "bool", "True during parameter optimization"),
    ("IsVisualMode", "", "bool", "True in visual test mode"),
    ("UninitializeReason", "", "int", "Reason code of the last deinitialization"),
];
