//! Technical indicator calls and the custom-indicator surface.

use super::Row;

pub(super) const ROWS: &[Row] = &[
    ("iMA", "string symbol, int timeframe, int period, int ma_shift, int method, int applied, int shift", "double", "Moving average value at a shift"),
    (
        "iMACD",
        "string symbol, int timeframe, int fast, int slow, int signal, int applied, int mode, int shift",
        "double",
        "MACD main, signal or histogram value",
    ),
    ("iATR", "string symbol, int timeframe, int period, int shift", "double", "Average true range at a shift"),
    ("iRSI", "string symbol, int timeframe, int period, int applied, int shift", "double", "Relative strength index at a shift"),
    (
        "iCustom",
        "string symbol, int timeframe, string name, int mode, int shift, ...",
        "double",
        "Buffer value of a named custom indicator",
    ),
    ("IndicatorBuffers", "int count", "bool", "Declare the number of indicator buffers"),
    ("IndicatorShortName", "string name", "void", "Set the indicator display name"),
    ("IndicatorDigits", "int digits", "void", "Set the indicator display precision"),
    ("IndicatorCounted", "", "int", "Bars already calculated in the previous call"),
    ("SetIndexBuffer", "int index, array buffer", "bool", "Bind an array as an indicator buffer"),
    ("SetIndexLabel", "int index, string label", "void", "Set a buffer display label"),
    ("SetIndexStyle", "int index, int style, [int width], [int clr]", "void", "Set buffer drawing style"),
    ("SetLevelValue", "int level, double value", "void", "Set a horizontal level"),
    ("HideTestIndicators", "bool hide", "void", "Hide indicators in the tester chart"),
];
