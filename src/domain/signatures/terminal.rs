//! Terminal services: virtual files, global variables and chart events.

use super::Row;

pub(super) const ROWS: &[Row] = &[
    ("FileOpen", "string name, int mode", "int", "Open a virtual file, returns a handle or -1"),
    ("FileReadString", "int handle", "string", "Read the remaining content"),
    ("FileWriteString", "int handle, string text", "int", "Append text, returns the byte count"),
    ("FileClose", "int handle", "void", "Close a handle"),
    ("FileIsExist", "string name", "bool", "True when a virtual file exists"),
    ("FileDelete", "string name", "bool", "Delete a virtual file"),
    ("GlobalVariableSet", "string name, double value", "datetime", "Set a global variable, returns the set time"),
    ("GlobalVariableGet", "string name", "double", "Value of a global variable, 0 when absent"),
    ("GlobalVariableCheck", "string name", "bool", "True when a global variable exists"),
    ("GlobalVariableDel", "string name", "bool", "Delete a global variable"),
    ("GlobalVariableTime", "string name", "datetime", "Last set time of a global variable"),
    ("GlobalVariablesTotal", "", "int", "Number of global variables"),
    ("GlobalVariableSetOnCondition", "string name, double value, double check", "bool", "Set only when the stored value matches"),
    ("GlobalVariablesFlush", "", "void", "Persist global variables to the backing store"),
    ("EventSetTimer", "int seconds", "bool", "Start the periodic timer"),
    ("EventKillTimer", "", "void", "Stop the periodic timer"),
    ("EventChartCustom", "int chart_id, int event_id, int lparam, double dparam, string sparam", "bool", "Queue a custom chart event"),
];
