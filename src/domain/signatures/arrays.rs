//! Array manipulation plus the bar-series accessors.

use super::Row;

pub(super) const ROWS: &[Row] = &[
    ("ArrayResize", "array target, int size, [int reserve]", "int", "Resize, padding with the default value"),
    ("ArraySize", "array target", "int", "Element count"),
    ("ArraySetAsSeries", "array target, bool as_series", "bool", "Set reversed logical indexing"),
    ("ArrayGetAsSeries", "array target", "bool", "True when indexed as a series"),
    ("ArrayInitialize", "array target, double value", "int", "Fill every element"),
    ("ArrayFill", "array target, int start, int count, double value", "void", "Fill a range"),
    ("ArrayCopy", "array target, array source, [int to_start], [int from_start], [int count]", "int", "Copy elements, returns count"),
    ("ArrayMaximum", "array source, [int count], [int start]", "int", "Index of the largest element"),
    ("ArrayMinimum", "array source, [int count], [int start]", "int", "Index of the smallest element"),
    ("ArrayBsearch", "array source, double value, [int count], [int start], [int direction]", "int", "Binary search in a sorted array"),
    ("ArrayFree", "array target", "void", "Release the backing storage"),
    ("Bars", "", "int", "Bar count of the current chart"),
    ("iBars", "string symbol, int timeframe", "int", "Bar count of a series"),
    ("iBarShift", "string symbol, int timeframe, datetime time, [bool exact]", "int", "Shift of the bar covering a time"),
    ("iOpen", "string symbol, int timeframe, int shift", "double", "Open price at a shift"),
    ("iHigh", "string symbol, int timeframe, int shift", "double", "High price at a shift"),
    ("iLow", "string symbol, int timeframe, int shift", "double", "Low price at a shift"),
    ("iClose", "string symbol, int timeframe, int shift", "double", "Close price at a shift"),
    ("iTime", "string symbol, int timeframe, int shift", "datetime", "Open time at a shift"),
    ("iVolume", "string symbol, int timeframe, int shift", "int", "Tick volume at a shift"),
    ("iHighest", "string symbol, int timeframe, int type, [int count], [int start]", "int", "Shift of the highest value in a range"),
    ("iLowest", "string symbol, int timeframe, int type, [int count], [int start]", "int", "Shift of the lowest value in a range"),
    ("CopyOpen", "string symbol, int timeframe, int start, int count, array target", "int", "Copy opens, returns count"),
    ("CopyHigh", "string symbol, int timeframe, int start, int count, array target", "int", "Copy highs, returns count"),
    ("CopyLow", "string symbol, int timeframe, int start, int count, array target", "int", "Copy lows, returns count"),
    ("CopyClose", "string symbol, int timeframe, int start, int count, array target", "int", "Copy closes, returns count"),
    ("CopyTime", "string symbol, int timeframe, int start, int count, array target", "int", "Copy open times, returns count"),
];
